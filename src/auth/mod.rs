//! Authentication module
//!
//! Credential persistence, the native-app login flow and the authorizers
//! the transfer client uses to sign requests.

pub mod authorizer;
pub mod native_app;
pub mod session;
pub mod tokens;

pub use authorizer::{AccessTokenAuthorizer, Authorizer, OnRefresh, RefreshTokenAuthorizer};
pub use native_app::{login_interactive, NativeAppAuthClient, TokenResponse};
pub use session::{load_or_login, transfer_authorizer};
pub use tokens::{transfer_tokens, TokenRecord, TokenSet, TokenStore, TokenStoreError};
