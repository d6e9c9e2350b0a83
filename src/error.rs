//! Error types for the mule
//!
//! Local faults (I/O, JSON, configuration) and remote faults (HTTP, API
//! error documents) share one enum so every layer can propagate with `?`.
//! Task-level failures reported by the transfer service are not errors
//! here; they are logged and the workflow carries on.

use crate::auth::TokenStoreError;
use serde::Deserialize;
use thiserror::Error;

/// Mule-level error types
#[derive(Error, Debug)]
pub enum MuleError {
    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The HTTP request itself failed (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("API error (HTTP {status}) {code}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Service error code, e.g. `ClientError.NotFound`
        code: String,
        /// Human readable message from the service
        message: String,
    },

    /// Authentication or token refresh failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Credential file could not be read or written
    #[error("Token store error: {0}")]
    TokenStore(#[from] TokenStoreError),

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A task did not reach a terminal state in time
    #[error("Task {task_id} still not complete after {waited_secs} seconds")]
    TaskWaitTimeout {
        /// Task being waited on
        task_id: String,
        /// Total seconds spent waiting
        waited_secs: u64,
    },

    /// Shutdown was requested while an operation was in progress
    #[error("Operation cancelled")]
    Cancelled,

    /// Catch-all for unexpected errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error document returned by the Transfer and Auth APIs
///
/// Transfer uses `code`/`message`, Auth uses the OAuth2
/// `error`/`error_description` pair.
#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl MuleError {
    /// True for the cancellation signal rather than a real fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MuleError::Cancelled)
    }

    /// Build an `Api` error from a non-success response
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        Self::from_status_and_body(status, &body)
    }

    fn from_status_and_body(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed
            .code
            .or(parsed.error)
            .unwrap_or_else(|| "Unknown".to_string());
        let message = parsed
            .message
            .or(parsed.error_description)
            .unwrap_or_else(|| body.trim().to_string());
        MuleError::Api {
            status,
            code,
            message,
        }
    }
}
