//! Transfer API document types
//!
//! Structs that mirror the Transfer API JSON documents the mule sends and
//! reads. Only the fields the mule uses are modeled; everything else the
//! service returns is ignored on deserialization.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// How the service decides whether a destination file is already in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLevel {
    /// Skip files that exist at the destination
    Exists = 0,
    /// Skip files whose size matches
    Size = 1,
    /// Skip files whose modification time is not older than the source
    Mtime = 2,
    /// Skip files whose checksum matches
    Checksum = 3,
}

impl Serialize for SyncLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Format a deadline the way the service expects it
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One path pair inside a transfer submission
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    /// Path on the source endpoint
    pub source_path: String,
    /// Path on the destination endpoint
    pub destination_path: String,
    /// Copy a directory tree
    pub recursive: bool,
}

/// Transfer submission document
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TransferData {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    /// Idempotency key obtained from `/submission_id`
    pub submission_id: Option<String>,
    /// Source endpoint id
    pub source_endpoint: String,
    /// Destination endpoint id
    pub destination_endpoint: String,
    /// Human readable label shown in the task list
    pub label: String,
    /// Time after which the service cancels the task
    pub deadline: String,
    /// Sync behaviour for existing destination files
    pub sync_level: SyncLevel,
    /// Paths to transfer
    #[serde(rename = "DATA")]
    pub items: Vec<TransferItem>,
}

impl TransferData {
    /// Start a transfer document between two endpoints
    pub fn new(
        source_endpoint: &str,
        destination_endpoint: &str,
        label: &str,
        deadline: DateTime<Utc>,
        sync_level: SyncLevel,
    ) -> Self {
        Self {
            data_type: "transfer",
            submission_id: None,
            source_endpoint: source_endpoint.to_string(),
            destination_endpoint: destination_endpoint.to_string(),
            label: label.to_string(),
            deadline: format_deadline(deadline),
            sync_level,
            items: Vec::new(),
        }
    }

    /// Add a path pair
    pub fn add_item(&mut self, source_path: &str, destination_path: &str, recursive: bool) {
        self.items.push(TransferItem {
            data_type: "transfer_item",
            source_path: source_path.to_string(),
            destination_path: destination_path.to_string(),
            recursive,
        });
    }
}

/// One path inside a delete submission
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeleteItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    /// Path to delete
    pub path: String,
}

/// Delete submission document
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeleteData {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    /// Idempotency key obtained from `/submission_id`
    pub submission_id: Option<String>,
    /// Endpoint id
    pub endpoint: String,
    /// Human readable label shown in the task list
    pub label: String,
    /// Delete directories and their contents
    pub recursive: bool,
    /// Time after which the service cancels the task
    pub deadline: String,
    /// Paths to delete
    #[serde(rename = "DATA")]
    pub items: Vec<DeleteItem>,
}

impl DeleteData {
    /// Start a delete document on one endpoint
    pub fn new(endpoint: &str, label: &str, recursive: bool, deadline: DateTime<Utc>) -> Self {
        Self {
            data_type: "delete",
            submission_id: None,
            endpoint: endpoint.to_string(),
            label: label.to_string(),
            recursive,
            deadline: format_deadline(deadline),
            items: Vec::new(),
        }
    }

    /// Add a path
    pub fn add_item(&mut self, path: &str) {
        self.items.push(DeleteItem {
            data_type: "delete_item",
            path: path.to_string(),
        });
    }
}

/// Response to `/submission_id`
#[derive(Deserialize, Debug)]
pub struct SubmissionId {
    /// The id
    pub value: String,
}

/// Response to a transfer or delete submission
#[derive(Deserialize, Debug, Clone)]
pub struct SubmissionResult {
    /// Handle for polling the new task
    pub task_id: String,
    /// Submission id the task was accepted under
    #[serde(default)]
    pub submission_id: Option<String>,
    /// `Accepted` or `Duplicate`
    #[serde(default)]
    pub code: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

/// Lifecycle state of a task
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Running or queued
    Active,
    /// Paused, e.g. waiting on expired credentials
    Inactive,
    /// Finished successfully
    Succeeded,
    /// Failed or cancelled, including deadline expiry
    Failed,
    /// Status this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Whether the task will not change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// Task document
#[derive(Deserialize, Debug, Clone)]
pub struct Task {
    /// Task handle
    pub task_id: String,
    /// `TRANSFER` or `DELETE`
    #[serde(rename = "type")]
    pub task_type: String,
    /// Lifecycle state
    pub status: TaskStatus,
    /// Label given at submission
    #[serde(default)]
    pub label: Option<String>,
    /// Source endpoint display name (absent for deletes)
    #[serde(default)]
    pub source_endpoint_display_name: Option<String>,
    /// Destination endpoint display name (absent for deletes)
    #[serde(default)]
    pub destination_endpoint_display_name: Option<String>,
    /// When the task was submitted
    pub request_time: String,
    /// When the task finished, if it has
    #[serde(default)]
    pub completion_time: Option<String>,
    /// Bytes moved so far
    #[serde(default)]
    pub bytes_transferred: u64,
    /// Average throughput
    #[serde(default)]
    pub effective_bytes_per_second: u64,
    /// Files moved so far
    #[serde(default)]
    pub files_transferred: u64,
}

/// Entry in a task's event log
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TaskEvent {
    /// Event code, e.g. `STARTED` or `FILE_NOT_FOUND`
    #[serde(default)]
    pub code: String,
    /// Whether the service flags the event as an error
    #[serde(default)]
    pub is_error: bool,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Long form details
    #[serde(default)]
    pub details: String,
    /// When the event happened
    #[serde(default)]
    pub time: String,
}

/// Offset/limit paged list document
#[derive(Deserialize, Debug)]
pub struct Page<T> {
    /// Items in this page
    #[serde(rename = "DATA")]
    pub data: Vec<T>,
    /// Offset of the first item
    #[serde(default)]
    pub offset: usize,
    /// Page size the server applied
    #[serde(default)]
    pub limit: usize,
    /// Total number of items
    #[serde(default)]
    pub total: usize,
}

impl<T> Page<T> {
    /// Offset of the following page, if there is one
    pub fn next_offset(&self) -> Option<usize> {
        let next = self.offset + self.data.len();
        if self.data.is_empty() || next >= self.total {
            None
        } else {
            Some(next)
        }
    }
}
