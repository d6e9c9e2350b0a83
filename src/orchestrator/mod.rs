//! Orchestrator module
//!
//! The mule's own logic on top of the transfer client: the blocking
//! transfer facade, the local error and status files, the fixed
//! replication workflow and the trigger poll loop.

pub mod constants;
pub mod error_log;
pub mod facade;
pub mod poll_loop;
pub mod status;
pub mod workflow;

pub use error_log::ErrorLog;
pub use facade::{compute_deadline, TaskOutcome, TransferFacade};
pub use poll_loop::{PollLoop, PollOutcome, PollState};
pub use status::StatusFile;
pub use workflow::{Stage, WorkflowDriver, WorkflowReport};
