//! Native-app OAuth2 client
//!
//! Authorization-code flow with PKCE and refresh tokens against the
//! Globus Auth API. Token responses are folded into a [`TokenSet`] keyed
//! by resource server, which is the shape the credential file stores.

use crate::auth::tokens::{TokenRecord, TokenSet};
use crate::error::MuleError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Token endpoint response
#[derive(Deserialize, Debug, Clone)]
pub struct TokenResponse {
    /// Access token for `resource_server`
    pub access_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
    /// Resource server the token is for
    pub resource_server: String,
    /// Granted scopes
    #[serde(default)]
    pub scope: String,
    /// Token type
    #[serde(default)]
    pub token_type: Option<String>,
    /// Refresh token, present when offline access was requested
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Tokens for the other resource servers in the requested scopes
    #[serde(default)]
    pub other_tokens: Vec<TokenResponse>,
}

impl TokenResponse {
    /// Flatten this response into a mapping keyed by resource server
    pub fn by_resource_server(&self, now_secs: i64) -> TokenSet {
        let mut tokens = TokenSet::new();
        for response in std::iter::once(self).chain(self.other_tokens.iter()) {
            tokens.insert(
                response.resource_server.clone(),
                TokenRecord {
                    access_token: response.access_token.clone(),
                    refresh_token: response.refresh_token.clone(),
                    expires_at_seconds: now_secs + response.expires_in,
                    scope: response.scope.clone(),
                    token_type: response
                        .token_type
                        .clone()
                        .unwrap_or_else(|| "Bearer".to_string()),
                    resource_server: response.resource_server.clone(),
                },
            );
        }
        tokens
    }
}

/// An authorization request waiting for the operator's auth code
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL the operator visits to log in
    pub url: Url,
    redirect_uri: String,
    verifier: String,
}

/// Client for the native-app flow
#[derive(Debug, Clone)]
pub struct NativeAppAuthClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl NativeAppAuthClient {
    /// Create a client for `client_id` talking to the Auth API at `base_url`
    pub fn new(http: reqwest::Client, base_url: &str, client_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
        }
    }

    /// OAuth client id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Start a flow requesting refresh tokens for `scopes`
    pub fn start_flow(
        &self,
        redirect_uri: &str,
        scopes: &str,
    ) -> Result<AuthorizationRequest, MuleError> {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let challenge = code_challenge(&verifier);

        let url = Url::parse_with_params(
            &format!("{}/v2/oauth2/authorize", self.base_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scopes),
                ("state", "_default"),
                ("response_type", "code"),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| MuleError::Config(format!("Invalid auth base URL: {}", e)))?;

        Ok(AuthorizationRequest {
            url,
            redirect_uri: redirect_uri.to_string(),
            verifier,
        })
    }

    /// Exchange the auth code the operator pasted back for tokens
    pub async fn exchange_code(
        &self,
        request: &AuthorizationRequest,
        auth_code: &str,
    ) -> Result<TokenSet, MuleError> {
        if auth_code.is_empty() {
            return Err(MuleError::Auth("auth code is empty".to_string()));
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("redirect_uri", request.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", request.verifier.as_str()),
        ];
        self.token_request(&form).await
    }

    /// Mint a new access token from a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, MuleError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        self.token_request(&form).await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, MuleError> {
        let url = format!("{}/v2/oauth2/token", self.base_url);
        debug!(url = %url, grant_type = %form[0].1, "Requesting tokens");

        let response = self.http.post(&url).form(form).send().await?;
        if !response.status().is_success() {
            return Err(MuleError::from_response(response).await);
        }

        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.by_resource_server(chrono::Utc::now().timestamp()))
    }
}

/// S256 PKCE challenge for `verifier`
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Whether we are running inside an SSH session
pub fn is_remote_session() -> bool {
    std::env::var_os("SSH_TTY").is_some() || std::env::var_os("SSH_CONNECTION").is_some()
}

/// Run the interactive login on the terminal
///
/// Prints the authorization URL, opens it in a browser when running
/// locally, then reads the auth code from stdin.
pub async fn login_interactive(
    client: &NativeAppAuthClient,
    redirect_uri: &str,
    scopes: &str,
) -> Result<TokenSet, MuleError> {
    let request = client.start_flow(redirect_uri, scopes)?;

    println!("Native App Authorization URL: \n{}", request.url);
    if !is_remote_session() {
        open_in_browser(request.url.as_str()).await;
    }

    print!("Enter the auth code: ");
    use std::io::Write as _;
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    let tokens = client.exchange_code(&request, line.trim()).await?;
    info!(
        resource_servers = ?tokens.keys().collect::<Vec<_>>(),
        "Login complete"
    );
    Ok(tokens)
}

async fn open_in_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    match Command::new(opener).arg(url).status().await {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(opener, exit_code = ?status.code(), "Browser opener failed"),
        Err(e) => warn!(opener, error = %e, "Could not launch browser"),
    }
}
