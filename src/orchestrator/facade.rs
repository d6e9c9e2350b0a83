//! Transfer facade
//!
//! Turns "delete this path" and "copy this path from here to there" into
//! Transfer API submissions, then blocks until the service reports the
//! task terminal. Every submission carries a deadline so the service
//! cancels anything that overruns. Error events of finished tasks go to
//! the local error log; nothing is retried here. Deletes get the same
//! event check as transfers, so a cleanup that hits a permission or
//! endpoint error shows up in the uploaded log too.

use crate::config::TimingConfig;
use crate::error::MuleError;
use crate::orchestrator::error_log::ErrorLog;
use crate::transfer::{DeleteData, SyncLevel, TaskStatus, TransferClient, TransferData};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Deadline sent with a task submitted at `now`
pub fn compute_deadline(now: DateTime<Utc>, offset: chrono::Duration) -> DateTime<Utc> {
    now + offset
}

/// What became of a submitted task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    /// Task handle
    pub task_id: String,
    /// Label given at submission
    pub label: String,
    /// Terminal status reported by the service
    pub status: TaskStatus,
    /// Number of events written to the error log
    pub reported_errors: usize,
}

/// Blocking wrapper over the transfer client
#[derive(Clone)]
pub struct TransferFacade {
    client: TransferClient,
    error_log: ErrorLog,
    timing: TimingConfig,
    cancel: CancellationToken,
}

impl TransferFacade {
    /// Create a facade that logs error events to `error_log`
    pub fn new(
        client: TransferClient,
        error_log: ErrorLog,
        timing: TimingConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            error_log,
            timing,
            cancel,
        }
    }

    /// Underlying API client
    pub fn client(&self) -> &TransferClient {
        &self.client
    }

    /// Error log events are written to
    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    fn deadline(&self) -> DateTime<Utc> {
        compute_deadline(Utc::now(), self.timing.task_deadline())
    }

    /// Delete `path` on `endpoint` and wait for the task to finish
    pub async fn delete(
        &self,
        endpoint: &str,
        label: &str,
        path: &str,
        recursive: bool,
    ) -> Result<TaskOutcome, MuleError> {
        let mut data = DeleteData::new(endpoint, label, recursive, self.deadline());
        data.add_item(path);

        let result = self.client.submit_delete(data).await?;
        info!(task_id = %result.task_id, label, path, "Delete submitted");

        self.finish(&result.task_id, label).await
    }

    /// Copy `source_path` to `destination_path` and wait for the task to finish
    pub async fn transfer(
        &self,
        source_endpoint: &str,
        destination_endpoint: &str,
        label: &str,
        source_path: &str,
        destination_path: &str,
        recursive: bool,
    ) -> Result<TaskOutcome, MuleError> {
        let mut data = TransferData::new(
            source_endpoint,
            destination_endpoint,
            label,
            self.deadline(),
            SyncLevel::Checksum,
        );
        data.add_item(source_path, destination_path, recursive);

        let result = self.client.submit_transfer(data).await?;
        info!(
            task_id = %result.task_id,
            label,
            source_path,
            destination_path,
            "Transfer submitted"
        );

        self.finish(&result.task_id, label).await
    }

    async fn finish(&self, task_id: &str, label: &str) -> Result<TaskOutcome, MuleError> {
        let status = self.wait_for_task(task_id).await?;
        if status != TaskStatus::Succeeded {
            warn!(task_id, label, status = ?status, "Task did not succeed");
        }

        let reported_errors = self.log_events(task_id).await?;
        Ok(TaskOutcome {
            task_id: task_id.to_string(),
            label: label.to_string(),
            status,
            reported_errors,
        })
    }

    /// Wait in rounds of `poll_timeout` until the task is terminal
    ///
    /// Fails with `Cancelled` when shutdown is requested and with
    /// `TaskWaitTimeout` once the total wait passes the deadline bound.
    pub async fn wait_for_task(&self, task_id: &str) -> Result<TaskStatus, MuleError> {
        let started = Instant::now();
        let max_wait = self.timing.max_task_wait();

        loop {
            let done = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(MuleError::Cancelled),
                done = self.client.task_wait(
                    task_id,
                    self.timing.poll_timeout(),
                    self.timing.poll_interval(),
                ) => done?,
            };
            if done {
                return Ok(self.client.get_task(task_id).await?.status);
            }

            let waited = started.elapsed();
            if waited >= max_wait {
                return Err(MuleError::TaskWaitTimeout {
                    task_id: task_id.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }
            info!(task_id, "Waiting on {} to complete", task_id);
        }
    }

    /// Echo a finished task's events and record the reportable ones
    pub async fn log_events(&self, task_id: &str) -> Result<usize, MuleError> {
        let events = self.client.task_event_list(task_id).await?;
        for event in &events {
            info!(
                task_id,
                code = %event.code,
                is_error = event.is_error,
                "Event on Task({}) at {}: {}",
                task_id,
                event.time,
                event.description
            );
        }

        let written = self.error_log.record(&events).await?;
        if written > 0 {
            warn!(task_id, count = written, "Error events recorded");
        }
        Ok(written)
    }
}
