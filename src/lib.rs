//! Route Tracker Agent Library
//!
//! Core components of the background location agent: token storage, the
//! auth session state machine, the remote API client, and the location
//! poller.

pub mod auth;
pub mod config;
pub mod logging;
pub mod poller;
pub mod position;
pub mod storage;
pub mod sync;

pub use auth::{AuthSession, SessionState};
pub use config::Config;
pub use poller::LocationPoller;
pub use position::{PlatformPositionSource, Position, PositionError, PositionSource};
pub use storage::{SecureStorage, TokenKind, TokenStore};
pub use sync::{ApiClient, ApiError, TokenRefresh, TrackerApi, VerifyStatus};
