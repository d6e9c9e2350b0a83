//! Transfer Mule
//!
//! Waits for the CI server's trigger file, then runs the replication
//! workflow and uploads the status file. Runs until Ctrl+C or SIGTERM.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transfer_mule::auth::{self, NativeAppAuthClient, TokenStore};
use transfer_mule::config::Config;
use transfer_mule::orchestrator::{ErrorLog, PollLoop, TransferFacade};
use transfer_mule::transfer::TransferClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let http = config.service.http_client()?;
    let auth_client = NativeAppAuthClient::new(
        http.clone(),
        &config.service.auth_base_url,
        &config.service.client_id,
    );
    let store = TokenStore::new(&config.paths.token_file);

    let tokens = auth::load_or_login(&store, &auth_client, &config.service).await?;
    let authorizer = auth::transfer_authorizer(&tokens, auth_client, store)?;
    let client = TransferClient::new(
        http,
        &config.service.transfer_base_url,
        Arc::new(authorizer),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let facade = TransferFacade::new(
        client,
        ErrorLog::new(config.paths.error_file()),
        config.timing.clone(),
        cancel.clone(),
    );
    let mut poll_loop = PollLoop::new(facade, &config, cancel);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    poll_loop.run().await?;

    info!("Mule shutdown complete");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
    token.cancel();
}
