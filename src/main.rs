//! Route Tracker Agent - Main Entry Point
//!
//! Headless companion agent: verifies the stored session, then reports the
//! device position in the background until stopped.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use route_tracker_lib::{
    auth::AuthSession,
    config::Config,
    logging,
    poller::LocationPoller,
    position::PlatformPositionSource,
    storage::{SecureStorage, TokenKind, TokenStore},
    sync::ApiClient,
    SessionState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    logging::init(&config.data_dir);
    info!("Route Tracker Agent starting...");

    let storage = SecureStorage::open(&config.data_dir);
    let tokens = TokenStore::new(storage, &config.access_token_key, &config.refresh_token_key);

    // Provisioning: seed tokens handed in through the environment.
    if let Some(access) = &config.seed_access_token {
        tokens.set(TokenKind::Access, access);
    }
    if let Some(refresh) = &config.seed_refresh_token {
        tokens.set(TokenKind::Refresh, refresh);
    }

    let api = Arc::new(ApiClient::new(&config.api_base_url).context("building API client")?);
    let session = Arc::new(AuthSession::new(api.clone(), tokens));
    let source = Arc::new(PlatformPositionSource::new());
    let poller = LocationPoller::new(session.clone(), api, source);

    match session.startup().await {
        SessionState::Authorized => {
            poller.start(config.poll_interval);
        }
        state => {
            warn!("Startup left session in {:?}, exiting", state);
            anyhow::bail!("not authorized");
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");

    poller.stop();
    session.logout().await;

    info!("Route Tracker Agent stopped");
    Ok(())
}
