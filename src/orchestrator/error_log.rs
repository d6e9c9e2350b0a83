//! Local error log
//!
//! Append-only `<time>: <details>` lines for task events the service
//! flags as errors. The file is uploaded with the status file after each
//! workflow run and then truncated.

use crate::error::MuleError;
use crate::orchestrator::constants::BENIGN_EVENT_DESCRIPTION;
use crate::transfer::TaskEvent;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Whether an event belongs in the error log
pub fn is_reportable(event: &TaskEvent) -> bool {
    event.is_error && event.description != BENIGN_EVENT_DESCRIPTION
}

/// Line written for a reportable event
pub fn format_entry(event: &TaskEvent) -> String {
    format!("{}: {}\n", event.time, event.details)
}

/// Handle to the error log file
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Error log at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File, MuleError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }

    /// Create the log if it is missing, leaving existing entries alone
    ///
    /// The log is uploaded after every run, so it has to exist even when
    /// nothing was reported.
    pub async fn ensure(&self) -> Result<(), MuleError> {
        self.open().await?;
        Ok(())
    }

    /// Append every reportable event, returning how many were written
    pub async fn record(&self, events: &[TaskEvent]) -> Result<usize, MuleError> {
        let entries: Vec<String> = events
            .iter()
            .filter(|e| is_reportable(e))
            .map(format_entry)
            .collect();

        let mut file = self.open().await?;
        if !entries.is_empty() {
            file.write_all(entries.concat().as_bytes()).await?;
            file.flush().await?;
        }
        Ok(entries.len())
    }

    /// Empty the log after it has been uploaded
    pub async fn truncate(&self) -> Result<(), MuleError> {
        fs::write(&self.path, b"").await?;
        Ok(())
    }
}
