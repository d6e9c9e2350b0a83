//! Transfer Mule Library
//!
//! CI mule that exercises a Globus Online replication pipeline on request
//! and publishes throughput figures for the CI server to watch.
//! The binary is in `src/main.rs`.

pub mod auth;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod transfer;
