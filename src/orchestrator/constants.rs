//! Orchestrator constants
//!
//! Labels and fixed strings shared by the workflow and the poll loop.

/// Event description the service uses when a path to delete is absent.
/// Cleanups routinely hit it, so it is not reported.
pub const BENIGN_EVENT_DESCRIPTION: &str = "file not found";

/// Bytes per MiB as printed in the status file
pub const MB: f64 = 1_048_576.0;

/// Label of the recursive cleanup on cluster B
pub const LABEL_CLEANUP_B: &str = "jenkins_cleanup_bw";

/// Label of the cluster A -> cluster B transfer
pub const LABEL_A_TO_B: &str = "jenkins_jyc2bw";

/// Label of the cluster A -> archive transfer
pub const LABEL_A_TO_ARCHIVE: &str = "jenkins_jyc2nearline";

/// Label of the recursive cleanup on the archive
pub const LABEL_CLEANUP_ARCHIVE: &str = "jenkins_cleanup_nearline";

/// Label of the cluster B -> archive transfer
pub const LABEL_B_TO_ARCHIVE: &str = "jenkins_bw2nearline";

/// Label of the status and error log uploads
pub const LABEL_STATUS_UPLOAD: &str = "jenkins_status2bw";

/// Label of the trigger check transfer
pub const LABEL_TRIGGER_CHECK: &str = "jenkins_test_request_check";

/// Label of the remote trigger removal
pub const LABEL_TRIGGER_REMOVE: &str = "jenkins_test_request_rm";
