//! Status record
//!
//! The CI server watches the status file's timestamp and throughput
//! numbers. Every workflow run appends a header, one block per recent
//! task and a closing timestamp; nothing is ever overwritten.

use crate::error::MuleError;
use crate::orchestrator::constants::MB;
use crate::transfer::Task;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("None")
}

/// Timestamp line in `date(1)` style
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    format!("{}\n", now.format("%a %b %e %H:%M:%S UTC %Y"))
}

/// Four-line summary of one task
pub fn format_block(task: &Task) -> String {
    format!(
        "task_id= ( {} ) {} -> {}\n\
         request_time {}\n\
         completed    {}\n\
         type={} Mbytes={:.1} Mbytes/s={:.1} files={}\n",
        task.task_id,
        or_none(task.source_endpoint_display_name.as_deref()),
        or_none(task.destination_endpoint_display_name.as_deref()),
        task.request_time,
        or_none(task.completion_time.as_deref()),
        task.task_type,
        task.bytes_transferred as f64 / MB,
        task.effective_bytes_per_second as f64 / MB,
        task.files_transferred,
    )
}

/// Handle to the status file
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    /// Status file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the status file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, text: &str) -> Result<(), MuleError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Mark the start of a run
    pub async fn begin_run(&self, now: DateTime<Utc>) -> Result<(), MuleError> {
        self.append(&format_timestamp(now)).await
    }

    /// Append one block per task followed by a timestamp
    pub async fn append_summary(&self, tasks: &[Task], now: DateTime<Utc>) -> Result<(), MuleError> {
        let mut text: String = tasks.iter().map(format_block).collect();
        text.push_str(&format_timestamp(now));
        self.append(&text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TaskStatus;
    use chrono::TimeZone;

    fn task(id: &str) -> Task {
        Task {
            task_id: id.to_string(),
            task_type: "TRANSFER".to_string(),
            status: TaskStatus::Succeeded,
            label: Some("jenkins_jyc2bw".to_string()),
            source_endpoint_display_name: Some("ncsa#jyc".to_string()),
            destination_endpoint_display_name: Some("ncsa#BlueWaters".to_string()),
            request_time: "2024-03-01 12:00:00+00:00".to_string(),
            completion_time: Some("2024-03-01 12:01:00+00:00".to_string()),
            bytes_transferred: 3 * 1_048_576 + 524_288,
            effective_bytes_per_second: 1_048_576,
            files_transferred: 12,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 2, 3).unwrap()
    }

    #[test]
    fn test_format_block() {
        assert_eq!(
            format_block(&task("abc")),
            "task_id= ( abc ) ncsa#jyc -> ncsa#BlueWaters\n\
             request_time 2024-03-01 12:00:00+00:00\n\
             completed    2024-03-01 12:01:00+00:00\n\
             type=TRANSFER Mbytes=3.5 Mbytes/s=1.0 files=12\n"
        );
    }

    #[test]
    fn test_format_block_delete_task() {
        let mut delete = task("del");
        delete.task_type = "DELETE".to_string();
        delete.source_endpoint_display_name = None;
        delete.destination_endpoint_display_name = None;
        delete.completion_time = None;
        delete.bytes_transferred = 0;
        delete.effective_bytes_per_second = 0;
        delete.files_transferred = 0;

        let block = format_block(&delete);
        assert!(block.starts_with("task_id= ( del ) None -> None\n"));
        assert!(block.contains("completed    None\n"));
        assert!(block.ends_with("type=DELETE Mbytes=0.0 Mbytes/s=0.0 files=0\n"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(now()), "Fri Mar  1 12:02:03 UTC 2024\n");
    }

    #[tokio::test]
    async fn test_summaries_accumulate_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let status = StatusFile::new(dir.path().join("status_file"));

        status.begin_run(now()).await.unwrap();
        status
            .append_summary(&[task("run1-a"), task("run1-b")], now())
            .await
            .unwrap();
        status.begin_run(now()).await.unwrap();
        status.append_summary(&[task("run2-a")], now()).await.unwrap();

        let contents = std::fs::read_to_string(status.path()).unwrap();
        assert_eq!(contents.matches("task_id= (").count(), 3);
        let first = contents.find("run1-a").unwrap();
        let second = contents.find("run1-b").unwrap();
        let third = contents.find("run2-a").unwrap();
        assert!(first < second && second < third);
        assert_eq!(contents.matches("Fri Mar  1 12:02:03 UTC 2024\n").count(), 4);
    }
}
