//! Transfer API module
//!
//! Typed documents and a thin client for the Globus Transfer service.

pub mod client;
pub mod types;

pub use client::TransferClient;
pub use types::{
    DeleteData, SubmissionResult, SyncLevel, Task, TaskEvent, TaskStatus, TransferData,
};
