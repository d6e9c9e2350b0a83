//! Request authorizers
//!
//! The transfer client asks an [`Authorizer`] for an `Authorization`
//! header before every call. [`RefreshTokenAuthorizer`] keeps the access
//! token fresh and reports every refresh through a callback so the
//! credential file can be rewritten.

use crate::auth::native_app::NativeAppAuthClient;
use crate::auth::tokens::{TokenRecord, TokenSet};
use crate::error::MuleError;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

/// Refresh this many seconds before the recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Callback invoked with the token mapping issued by each refresh
pub type OnRefresh = Box<dyn Fn(&TokenSet) -> Result<(), MuleError> + Send + Sync>;

/// Source of `Authorization` header values
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Header value for the next request
    async fn authorization_header(&self) -> Result<String, MuleError>;
}

/// Fixed bearer token, never refreshed
#[derive(Debug, Clone)]
pub struct AccessTokenAuthorizer {
    access_token: String,
}

impl AccessTokenAuthorizer {
    /// Authorize every request with `access_token`
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl Authorizer for AccessTokenAuthorizer {
    async fn authorization_header(&self) -> Result<String, MuleError> {
        Ok(format!("Bearer {}", self.access_token))
    }
}

/// Access token that refreshes itself when it nears expiry
pub struct RefreshTokenAuthorizer {
    auth_client: NativeAppAuthClient,
    resource_server: String,
    current: Mutex<TokenRecord>,
    on_refresh: Option<OnRefresh>,
}

impl RefreshTokenAuthorizer {
    /// Build from the saved tokens of one resource server
    pub fn new(auth_client: NativeAppAuthClient, tokens: TokenRecord) -> Result<Self, MuleError> {
        if tokens.refresh_token.is_none() {
            return Err(MuleError::Auth(format!(
                "no refresh token saved for {}",
                tokens.resource_server
            )));
        }
        Ok(Self {
            auth_client,
            resource_server: tokens.resource_server.clone(),
            current: Mutex::new(tokens),
            on_refresh: None,
        })
    }

    /// Register the callback run after every successful refresh
    pub fn on_refresh(mut self, callback: OnRefresh) -> Self {
        self.on_refresh = Some(callback);
        self
    }

    async fn refresh(&self, record: &mut TokenRecord) -> Result<(), MuleError> {
        let refresh_token = record
            .refresh_token
            .clone()
            .ok_or_else(|| MuleError::Auth("refresh token missing".to_string()))?;

        let fresh = self.auth_client.refresh(&refresh_token).await?;
        let updated = fresh.get(&self.resource_server).ok_or_else(|| {
            MuleError::Auth(format!(
                "refresh response has no tokens for {}",
                self.resource_server
            ))
        })?;

        *record = TokenRecord {
            refresh_token: updated
                .refresh_token
                .clone()
                .or(Some(refresh_token)),
            ..updated.clone()
        };

        info!(
            resource_server = %self.resource_server,
            expires_at = record.expires_at_seconds,
            "Access token refreshed"
        );

        if let Some(callback) = &self.on_refresh {
            let mut saved = fresh.clone();
            saved.insert(self.resource_server.clone(), record.clone());
            callback(&saved)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Authorizer for RefreshTokenAuthorizer {
    async fn authorization_header(&self) -> Result<String, MuleError> {
        let mut record = self.current.lock().await;
        if record.expires_within(chrono::Utc::now().timestamp(), EXPIRY_MARGIN_SECS) {
            self.refresh(&mut record).await?;
        }
        Ok(format!("Bearer {}", record.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::TRANSFER_RESOURCE_SERVER;
    use mockito::Server;
    use std::sync::{Arc, Mutex as StdMutex};

    fn record(expires_at_seconds: i64) -> TokenRecord {
        TokenRecord {
            access_token: "old-access".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at_seconds,
            scope: String::new(),
            token_type: "Bearer".to_string(),
            resource_server: TRANSFER_RESOURCE_SERVER.to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_authorizer() {
        let auth = AccessTokenAuthorizer::new("abc");
        assert_eq!(auth.authorization_header().await.unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn test_valid_token_is_not_refreshed() {
        // No server behind this URL; a refresh attempt would fail
        let client =
            NativeAppAuthClient::new(reqwest::Client::new(), "http://127.0.0.1:9", "client");
        let far_future = chrono::Utc::now().timestamp() + 3600;
        let auth = RefreshTokenAuthorizer::new(client, record(far_future)).unwrap();

        assert_eq!(
            auth.authorization_header().await.unwrap(),
            "Bearer old-access"
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_reported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/oauth2/token")
            .with_status(200)
            .with_body(
                r#"{
                    "access_token": "new-access",
                    "expires_in": 3600,
                    "resource_server": "transfer.api.globus.org",
                    "token_type": "Bearer"
                }"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = NativeAppAuthClient::new(reqwest::Client::new(), &server.url(), "client");
        let seen: Arc<StdMutex<Vec<TokenSet>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let auth = RefreshTokenAuthorizer::new(client, record(0))
            .unwrap()
            .on_refresh(Box::new(move |tokens| {
                sink.lock().unwrap().push(tokens.clone());
                Ok(())
            }));

        assert_eq!(
            auth.authorization_header().await.unwrap(),
            "Bearer new-access"
        );
        // Second call uses the refreshed token without another request
        assert_eq!(
            auth.authorization_header().await.unwrap(),
            "Bearer new-access"
        );

        mock.assert_async().await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let saved = &seen[0][TRANSFER_RESOURCE_SERVER];
        assert_eq!(saved.access_token, "new-access");
        // Refresh token is carried over when the response omits it
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[test]
    fn test_requires_refresh_token() {
        let client =
            NativeAppAuthClient::new(reqwest::Client::new(), "http://127.0.0.1:9", "client");
        let mut rec = record(0);
        rec.refresh_token = None;
        assert!(RefreshTokenAuthorizer::new(client, rec).is_err());
    }
}
