//! Configuration Module
//!
//! Environment-driven settings for the agent.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Route Tracker backend.
    pub api_base_url: String,
    /// Delay between location reports.
    pub poll_interval: Duration,
    /// Storage key for the access token slot.
    pub access_token_key: String,
    /// Storage key for the refresh token slot.
    pub refresh_token_key: String,
    /// Directory holding token slots and logs.
    pub data_dir: PathBuf,
    /// Optional token pair to seed into storage (provisioning).
    pub seed_access_token: Option<String>,
    pub seed_refresh_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let api_base_url = std::env::var("ROUTE_TRACKER_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let poll_interval_ms = std::env::var("ROUTE_TRACKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    warn!("Invalid ROUTE_TRACKER_POLL_INTERVAL_MS, using default");
                    None
                }
            })
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        let access_token_key = std::env::var("ROUTE_TRACKER_ACCESS_TOKEN_KEY")
            .unwrap_or_else(|_| "access_token".to_string());
        let refresh_token_key = std::env::var("ROUTE_TRACKER_REFRESH_TOKEN_KEY")
            .unwrap_or_else(|_| "refresh_token".to_string());

        let data_dir = std::env::var("ROUTE_TRACKER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self {
            api_base_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            access_token_key,
            refresh_token_key,
            data_dir,
            seed_access_token: std::env::var("ROUTE_TRACKER_ACCESS_TOKEN").ok(),
            seed_refresh_token: std::env::var("ROUTE_TRACKER_REFRESH_TOKEN").ok(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("RouteTracker")
}
