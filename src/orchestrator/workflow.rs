//! Workflow driver
//!
//! The replication pipeline the mule exercises:
//! cluster A -> cluster B -> archive, with cleanups between hops.
//! Stages run strictly one after another. A task that fails on the
//! service side is logged and the run moves on; a local or API fault
//! aborts the run.

use crate::config::{EndpointConfig, PathConfig};
use crate::error::MuleError;
use crate::orchestrator::constants::*;
use crate::orchestrator::facade::{TaskOutcome, TransferFacade};
use crate::orchestrator::status::{format_block, StatusFile};
use chrono::Utc;
use tracing::info;

/// One step of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Delete a path on one endpoint
    Delete {
        /// Task label
        label: &'static str,
        /// Endpoint id
        endpoint: String,
        /// Path to delete
        path: String,
        /// Delete directory contents
        recursive: bool,
    },
    /// Copy a path between endpoints
    Transfer {
        /// Task label
        label: &'static str,
        /// Source endpoint id
        source: String,
        /// Destination endpoint id
        destination: String,
        /// Source path
        source_path: String,
        /// Destination path
        destination_path: String,
        /// Copy a directory tree
        recursive: bool,
    },
}

impl Stage {
    /// Task label of the stage
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Delete { label, .. } | Stage::Transfer { label, .. } => *label,
        }
    }

    /// Submit the stage and wait for it
    pub async fn run(&self, facade: &TransferFacade) -> Result<TaskOutcome, MuleError> {
        match self {
            Stage::Delete {
                label,
                endpoint,
                path,
                recursive,
            } => facade.delete(endpoint, label, path, *recursive).await,
            Stage::Transfer {
                label,
                source,
                destination,
                source_path,
                destination_path,
                recursive,
            } => {
                facade
                    .transfer(
                        source,
                        destination,
                        label,
                        source_path,
                        destination_path,
                        *recursive,
                    )
                    .await
            }
        }
    }
}

fn delete(label: &'static str, endpoint: &str, path: &str) -> Stage {
    Stage::Delete {
        label,
        endpoint: endpoint.to_string(),
        path: path.to_string(),
        recursive: true,
    }
}

fn transfer(
    label: &'static str,
    source: &str,
    destination: &str,
    source_path: &str,
    destination_path: &str,
    recursive: bool,
) -> Stage {
    Stage::Transfer {
        label,
        source: source.to_string(),
        destination: destination.to_string(),
        source_path: source_path.to_string(),
        destination_path: destination_path.to_string(),
        recursive,
    }
}

/// The replication stages, in order
pub fn replication_stages(endpoints: &EndpointConfig, paths: &PathConfig) -> Vec<Stage> {
    let scratch = paths.scratch.as_str();
    vec![
        delete(LABEL_CLEANUP_B, &endpoints.cluster_b, scratch),
        transfer(
            LABEL_A_TO_B,
            &endpoints.cluster_a,
            &endpoints.cluster_b,
            scratch,
            scratch,
            true,
        ),
        transfer(
            LABEL_A_TO_ARCHIVE,
            &endpoints.cluster_a,
            &endpoints.archive,
            scratch,
            scratch,
            true,
        ),
        delete(LABEL_CLEANUP_ARCHIVE, &endpoints.archive, scratch),
        transfer(
            LABEL_B_TO_ARCHIVE,
            &endpoints.cluster_b,
            &endpoints.archive,
            scratch,
            scratch,
            true,
        ),
        delete(LABEL_CLEANUP_ARCHIVE, &endpoints.archive, scratch),
    ]
}

/// Uploads of the status file and error log to the monitoring directory
pub fn upload_stages(endpoints: &EndpointConfig, paths: &PathConfig) -> Vec<Stage> {
    vec![
        transfer(
            LABEL_STATUS_UPLOAD,
            &endpoints.local,
            &endpoints.cluster_b,
            &paths.local_endpoint_status(),
            &paths.monitor_status(),
            false,
        ),
        transfer(
            LABEL_STATUS_UPLOAD,
            &endpoints.local,
            &endpoints.cluster_b,
            &paths.local_endpoint_error(),
            &paths.monitor_error(),
            false,
        ),
    ]
}

/// Result of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// Outcome of every replication and upload stage, in order
    pub outcomes: Vec<TaskOutcome>,
    /// Number of tasks written to the status file
    pub summarized: usize,
}

impl WorkflowReport {
    /// Total error events recorded during the run
    pub fn reported_errors(&self) -> usize {
        self.outcomes.iter().map(|o| o.reported_errors).sum()
    }
}

/// Runs the replication pipeline and publishes its status
pub struct WorkflowDriver {
    facade: TransferFacade,
    status: StatusFile,
    stages: Vec<Stage>,
    uploads: Vec<Stage>,
    status_task_count: usize,
}

impl WorkflowDriver {
    /// Driver for the configured endpoints and paths
    pub fn new(
        facade: TransferFacade,
        endpoints: &EndpointConfig,
        paths: &PathConfig,
        status_task_count: usize,
    ) -> Self {
        Self {
            facade,
            status: StatusFile::new(paths.status_file()),
            stages: replication_stages(endpoints, paths),
            uploads: upload_stages(endpoints, paths),
            status_task_count,
        }
    }

    /// Transfer facade used by the driver
    pub fn facade(&self) -> &TransferFacade {
        &self.facade
    }

    /// Status file the driver appends to
    pub fn status_file(&self) -> &StatusFile {
        &self.status
    }

    /// Run every stage, summarize, upload and reset the error log
    pub async fn run(&self) -> Result<WorkflowReport, MuleError> {
        let mut outcomes = Vec::with_capacity(self.stages.len() + self.uploads.len());
        self.facade.error_log().ensure().await?;

        for stage in &self.stages {
            info!("WORKFLOW: {}", stage.label());
            outcomes.push(stage.run(&self.facade).await?);
        }

        let summarized = self.summarize().await?;

        for stage in &self.uploads {
            info!("WORKFLOW: {}", stage.label());
            outcomes.push(stage.run(&self.facade).await?);
        }
        self.facade.error_log().truncate().await?;

        let report = WorkflowReport {
            outcomes,
            summarized,
        };
        info!(
            stages = report.outcomes.len(),
            summarized = report.summarized,
            reported_errors = report.reported_errors(),
            "Workflow run complete"
        );
        Ok(report)
    }

    /// Append the most recent tasks to the status file
    async fn summarize(&self) -> Result<usize, MuleError> {
        let tasks = self.facade.client().task_list(self.status_task_count).await?;
        for task in &tasks {
            info!("{}", format_block(task).trim_end());
        }
        self.status.append_summary(&tasks, Utc::now()).await?;
        Ok(tasks.len())
    }
}
