//! Startup authentication
//!
//! Reuse the saved credentials when the credential file exists, run the
//! interactive login when it does not, and wire the transfer authorizer
//! so every refresh is written back to the file.

use crate::auth::authorizer::RefreshTokenAuthorizer;
use crate::auth::native_app::{login_interactive, NativeAppAuthClient};
use crate::auth::tokens::{transfer_tokens, TokenSet, TokenStore};
use crate::config::ServiceConfig;
use crate::error::MuleError;
use tracing::{info, warn};

/// Saved tokens, or fresh ones from an interactive login
pub async fn load_or_login(
    store: &TokenStore,
    auth_client: &NativeAppAuthClient,
    service: &ServiceConfig,
) -> Result<TokenSet, MuleError> {
    if let Some(tokens) = store.load()? {
        if !tokens.is_empty() {
            info!(path = %store.path().display(), "Loaded saved tokens");
            return Ok(tokens);
        }
    }

    info!(
        client_id = auth_client.client_id(),
        "No saved tokens, starting native app login"
    );
    let tokens = login_interactive(auth_client, &service.redirect_uri, &service.scopes).await?;
    if let Err(e) = store.save(&tokens) {
        warn!(path = %store.path().display(), error = %e, "Could not save tokens");
    }
    Ok(tokens)
}

/// Authorizer for Transfer API calls that persists refreshed tokens
pub fn transfer_authorizer(
    tokens: &TokenSet,
    auth_client: NativeAppAuthClient,
    store: TokenStore,
) -> Result<RefreshTokenAuthorizer, MuleError> {
    let record = transfer_tokens(tokens)?.clone();
    let authorizer = RefreshTokenAuthorizer::new(auth_client, record)?.on_refresh(Box::new(
        move |fresh: &TokenSet| {
            store.update(fresh)?;
            Ok(())
        },
    ));
    Ok(authorizer)
}
