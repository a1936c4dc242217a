//! Position Module
//!
//! Device position acquisition behind a trait so the poller can be driven
//! by the platform geolocation service in production and by fakes in tests.

use async_trait::async_trait;
use serde::Serialize;

/// A sampled device position.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub lat: f64,
    pub long: f64,
    /// When the sample was taken; logged, not reported upstream.
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

impl Position {
    pub fn new(lat: f64, long: f64) -> Self {
        Self {
            lat,
            long,
            acquired_at: chrono::Utc::now(),
        }
    }
}

/// Position acquisition errors. Non-fatal to the poller; a failed sample is
/// logged and the cycle skipped.
#[derive(Debug, thiserror::Error)]
pub enum PositionError {
    #[error("No position provider available: {0}")]
    Unavailable(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

/// Source of the device's current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Position, PositionError>;
}

/// Platform-backed position source.
///
/// Windows reads the WinRT geolocation service. Other platforms accept a
/// `ROUTE_TRACKER_DEV_POSITION=lat,long` override for development and
/// otherwise report unavailable.
pub struct PlatformPositionSource;

impl PlatformPositionSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlatformPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(windows)]
#[async_trait]
impl PositionSource for PlatformPositionSource {
    async fn current_position(&self) -> Result<Position, PositionError> {
        // Geolocator::get() blocks on the WinRT async operation.
        let position = tokio::task::spawn_blocking(|| -> Result<Position, PositionError> {
            use windows::Devices::Geolocation::Geolocator;

            let locator = Geolocator::new().map_err(|e| PositionError::Platform(e.to_string()))?;
            let geoposition = locator
                .GetGeopositionAsync()
                .and_then(|op| op.get())
                .map_err(|e| PositionError::Platform(e.to_string()))?;
            let point = geoposition
                .Coordinate()
                .and_then(|c| c.Point())
                .and_then(|p| p.Position())
                .map_err(|e| PositionError::Platform(e.to_string()))?;

            Ok(Position::new(point.Latitude, point.Longitude))
        })
        .await
        .map_err(|e| PositionError::Platform(e.to_string()))??;

        Ok(position)
    }
}

#[cfg(not(windows))]
#[async_trait]
impl PositionSource for PlatformPositionSource {
    async fn current_position(&self) -> Result<Position, PositionError> {
        // Fallback for non-Windows (development only)
        let raw = std::env::var("ROUTE_TRACKER_DEV_POSITION")
            .map_err(|_| PositionError::Unavailable("no geolocation service".into()))?;

        let (lat, long) = raw
            .split_once(',')
            .ok_or_else(|| PositionError::Platform(format!("bad dev position: {}", raw)))?;

        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|e| PositionError::Platform(e.to_string()))?;
        let long = long
            .trim()
            .parse::<f64>()
            .map_err(|e| PositionError::Platform(e.to_string()))?;

        Ok(Position::new(lat, long))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[tokio::test]
    async fn dev_override_parses_lat_long() {
        std::env::set_var("ROUTE_TRACKER_DEV_POSITION", "48.85, 2.35");
        let source = PlatformPositionSource::new();
        let pos = source.current_position().await.unwrap();
        assert!((pos.lat - 48.85).abs() < f64::EPSILON);
        assert!((pos.long - 2.35).abs() < f64::EPSILON);
        std::env::remove_var("ROUTE_TRACKER_DEV_POSITION");
    }
}
