//! Trigger poll loop
//!
//! The CI server requests a run by dropping a trigger file into the
//! monitoring directory on cluster B. Each iteration pulls that file down
//! to the local endpoint; if it arrived, the workflow runs and the
//! trigger is consumed on both sides. One check and one run at a time.

use crate::config::{Config, EndpointConfig, PathConfig, TimingConfig};
use crate::error::MuleError;
use crate::orchestrator::constants::{LABEL_TRIGGER_CHECK, LABEL_TRIGGER_REMOVE};
use crate::orchestrator::facade::TransferFacade;
use crate::orchestrator::workflow::{WorkflowDriver, WorkflowReport};
use chrono::Utc;
use std::io::ErrorKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Where the loop is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No trigger file seen yet
    Waiting,
    /// Trigger file found, workflow in progress
    Running,
}

/// Result of one poll iteration
#[derive(Debug)]
pub enum PollOutcome {
    /// No trigger file; the loop slept for the idle interval
    Idle,
    /// Trigger file found; the workflow ran and the trigger was consumed
    Ran(WorkflowReport),
}

/// Trigger-driven runner of the workflow
pub struct PollLoop {
    driver: WorkflowDriver,
    endpoints: EndpointConfig,
    paths: PathConfig,
    timing: TimingConfig,
    cancel: CancellationToken,
    state: PollState,
}

impl PollLoop {
    /// Loop for `config`, stopped by `cancel`
    pub fn new(facade: TransferFacade, config: &Config, cancel: CancellationToken) -> Self {
        let driver = WorkflowDriver::new(
            facade,
            &config.endpoints,
            &config.paths,
            config.status_task_count,
        );
        Self {
            driver,
            endpoints: config.endpoints.clone(),
            paths: config.paths.clone(),
            timing: config.timing.clone(),
            cancel,
            state: PollState::Waiting,
        }
    }

    /// Current state
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Poll until cancelled
    ///
    /// Returns `Ok(())` on cancellation; any other error ends the loop.
    pub async fn run(&mut self) -> Result<(), MuleError> {
        info!("Poll loop started");
        loop {
            match self.poll_once().await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => {
                    info!("Poll loop cancelled");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One trigger check, followed by a run or an idle sleep
    pub async fn poll_once(&mut self) -> Result<PollOutcome, MuleError> {
        self.state = PollState::Waiting;
        let facade = self.driver.facade();

        info!("WORKFLOW: {}", LABEL_TRIGGER_CHECK);
        facade
            .transfer(
                &self.endpoints.cluster_b,
                &self.endpoints.local,
                LABEL_TRIGGER_CHECK,
                &self.paths.remote_trigger(),
                &self.paths.local_endpoint_trigger(),
                false,
            )
            .await?;

        let local_trigger = self.paths.local_trigger();
        if !tokio::fs::try_exists(&local_trigger).await? {
            info!("Workflow waiting for {}", self.paths.trigger_name);
            self.sleep(self.timing.idle_sleep()).await?;
            return Ok(PollOutcome::Idle);
        }

        self.state = PollState::Running;
        info!(
            trigger = %self.paths.remote_trigger(),
            "Trigger file found, proceeding with test workflow"
        );

        self.driver.status_file().begin_run(Utc::now()).await?;
        let report = self.driver.run().await?;

        match tokio::fs::remove_file(&local_trigger).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!("WORKFLOW: {}", LABEL_TRIGGER_REMOVE);
        self.driver
            .facade()
            .delete(
                &self.endpoints.cluster_b,
                LABEL_TRIGGER_REMOVE,
                &self.paths.remote_trigger(),
                false,
            )
            .await?;

        self.sleep(self.timing.cooldown()).await?;
        info!("Workflow finished.");
        self.state = PollState::Waiting;
        Ok(PollOutcome::Ran(report))
    }

    async fn sleep(&self, duration: Duration) -> Result<(), MuleError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MuleError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
