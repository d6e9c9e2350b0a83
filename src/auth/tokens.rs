// Credential persistence
// Saves and loads the per-resource-server token mapping to/from a JSON file

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Resource server whose tokens authorize Transfer API calls
pub const TRANSFER_RESOURCE_SERVER: &str = "transfer.api.globus.org";

/// Error types for credential file operations
#[derive(Error, Debug)]
pub enum TokenStoreError {
    /// File I/O error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not a valid token mapping
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// Mapping has no entry for a required resource server
    #[error("No tokens for resource server {0}")]
    MissingResourceServer(String),
}

/// Tokens issued for a single resource server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token sent with API calls
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix time at which the access token stops being accepted
    pub expires_at_seconds: i64,
    /// Scopes granted to the access token
    #[serde(default)]
    pub scope: String,
    /// Token type, normally `Bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Resource server the tokens are for
    #[serde(default)]
    pub resource_server: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenRecord {
    /// Whether the access token is expired or will be within `margin_secs`
    pub fn expires_within(&self, now_secs: i64, margin_secs: i64) -> bool {
        self.expires_at_seconds - margin_secs <= now_secs
    }
}

/// Tokens keyed by resource server name
pub type TokenSet = HashMap<String, TokenRecord>;

/// Credential file handle
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token mapping
    ///
    /// Returns `Ok(None)` when the file does not exist, which callers
    /// treat as "log in again". Any other failure is an error.
    pub fn load(&self) -> Result<Option<TokenSet>, TokenStoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let tokens: TokenSet = serde_json::from_str(&json)?;
        Ok(Some(tokens))
    }

    /// Overwrite the credential file with `tokens`
    pub fn save(&self, tokens: &TokenSet) -> Result<(), TokenStoreError> {
        let json = serde_json::to_string_pretty(tokens)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Merge freshly issued tokens into the saved mapping
    ///
    /// Entries for resource servers not present in `fresh` are kept.
    pub fn update(&self, fresh: &TokenSet) -> Result<TokenSet, TokenStoreError> {
        let mut tokens = self.load()?.unwrap_or_default();
        for (server, record) in fresh {
            tokens.insert(server.clone(), record.clone());
        }
        self.save(&tokens)?;
        Ok(tokens)
    }
}

/// Pick the transfer tokens out of a mapping
pub fn transfer_tokens(tokens: &TokenSet) -> Result<&TokenRecord, TokenStoreError> {
    tokens
        .get(TRANSFER_RESOURCE_SERVER)
        .ok_or_else(|| TokenStoreError::MissingResourceServer(TRANSFER_RESOURCE_SERVER.to_string()))
}
