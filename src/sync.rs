//! API Sync Module
//!
//! Handles HTTP communication with the Route Tracker API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::position::Position;

/// Outcome of a verify call that got an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// 200: the access token is still accepted.
    Valid,
    /// 401: the access token has expired.
    Expired,
}

/// New token pair minted by the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefresh {
    pub jwt_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
struct LocationUpdate {
    lat: f64,
    long: f64,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status that the caller must
    /// interpret (401 drives the refresh path, anything else is terminal
    /// for that operation).
    #[error("Request rejected with status {0}")]
    Rejected(u16),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Remote operations the session and poller depend on.
///
/// `ApiClient` is the production implementation; tests substitute a scripted
/// fake.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Check whether `access_token` is still accepted.
    async fn verify(&self, access_token: &str) -> Result<VerifyStatus, ApiError>;

    /// Exchange `refresh_token` for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, ApiError>;

    /// Report the current device position.
    async fn update_location(&self, access_token: &str, position: &Position)
        -> Result<(), ApiError>;

    /// Signal route deactivation on logout. Best-effort.
    async fn deactivate_route(&self, access_token: &str) -> Result<(), ApiError>;
}

/// API client for the Route Tracker backend
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_authorized(
        &self,
        path: &str,
        token: &str,
        body: Option<&impl Serialize>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        // The backend expects the bare token, no "Bearer" scheme.
        let mut request = self.client.post(&url).header("Authorization", token);
        if let Some(body) = body {
            request = request.json(body);
        }

        request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}

#[async_trait]
impl TrackerApi for ApiClient {
    async fn verify(&self, access_token: &str) -> Result<VerifyStatus, ApiError> {
        debug!("Verifying access token");

        let response = self
            .post_authorized("/api/v1/auth/verify", access_token, None::<&()>)
            .await?;

        match response.status().as_u16() {
            200 => Ok(VerifyStatus::Valid),
            401 => Ok(VerifyStatus::Expired),
            status => Err(ApiError::Server(format!("verify returned {}", status))),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefresh, ApiError> {
        debug!("Requesting token refresh");

        let response = self
            .post_authorized("/api/v1/auth/verify/refresh", refresh_token, None::<&()>)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected(status.as_u16()));
        }

        let pair = response
            .json::<TokenRefresh>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        info!("Token refresh succeeded");
        Ok(pair)
    }

    async fn update_location(
        &self,
        access_token: &str,
        position: &Position,
    ) -> Result<(), ApiError> {
        let body = LocationUpdate {
            lat: position.lat,
            long: position.long,
        };

        let response = self
            .post_authorized("/api/v1/users/location/update", access_token, Some(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected(status.as_u16()));
        }

        debug!("Location update accepted");
        Ok(())
    }

    async fn deactivate_route(&self, access_token: &str) -> Result<(), ApiError> {
        let response = self
            .post_authorized("/api/v1/routes/deactivate/current", access_token, None::<&()>)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Rejected(status.as_u16()));
        }

        info!("Route deactivated");
        Ok(())
    }
}
