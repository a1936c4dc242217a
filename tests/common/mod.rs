//! Shared test doubles: a scripted API, a scripted position source, and a
//! throwaway token store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use route_tracker_lib::{
    ApiError, Position, PositionError, PositionSource, SecureStorage, TokenRefresh, TokenStore,
    TrackerApi, VerifyStatus,
};

/// Scripted `TrackerApi`: responses are popped per call; when a queue runs
/// dry the call succeeds (verify valid, location accepted), except refresh
/// which is rejected.
#[derive(Default)]
pub struct FakeApi {
    verify_responses: Mutex<VecDeque<Result<VerifyStatus, ApiError>>>,
    refresh_responses: Mutex<VecDeque<Result<TokenRefresh, ApiError>>>,
    location_responses: Mutex<VecDeque<Result<(), ApiError>>>,
    pub verify_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub deactivate_calls: AtomicUsize,
    /// Access token presented on each location update, in call order.
    pub location_tokens: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn push_verify(&self, response: Result<VerifyStatus, ApiError>) {
        self.verify_responses.lock().unwrap().push_back(response);
    }

    pub fn push_refresh(&self, response: Result<TokenRefresh, ApiError>) {
        self.refresh_responses.lock().unwrap().push_back(response);
    }

    pub fn push_location(&self, response: Result<(), ApiError>) {
        self.location_responses.lock().unwrap().push_back(response);
    }

    pub fn location_calls(&self) -> usize {
        self.location_tokens.lock().unwrap().len()
    }
}

pub fn new_pair(access: &str, refresh: &str) -> TokenRefresh {
    TokenRefresh {
        jwt_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }
}

#[async_trait]
impl TrackerApi for FakeApi {
    async fn verify(&self, _access_token: &str) -> Result<VerifyStatus, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verify_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(VerifyStatus::Valid))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenRefresh, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ApiError::Rejected(403)))
    }

    async fn update_location(
        &self,
        access_token: &str,
        _position: &Position,
    ) -> Result<(), ApiError> {
        self.location_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
        self.location_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn deactivate_route(&self, _access_token: &str) -> Result<(), ApiError> {
        self.deactivate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted position source; succeeds with a fixed position once the script
/// runs dry.
pub struct ScriptedPositions {
    responses: Mutex<VecDeque<Result<Position, PositionError>>>,
}

impl ScriptedPositions {
    pub fn always_ok() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_script(script: Vec<Result<Position, PositionError>>) -> Self {
        Self {
            responses: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl PositionSource for ScriptedPositions {
    async fn current_position(&self) -> Result<Position, PositionError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Position::new(51.5074, -0.1278)))
    }
}

/// Unique temp directory for one test's token slots.
pub fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "route-tracker-it-{}-{}-{}",
        name,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .subsec_nanos()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Token store view over `dir`; open a second view to inspect what a
/// session persisted.
pub fn tokens_at(dir: &std::path::Path) -> TokenStore {
    TokenStore::new(SecureStorage::open(dir), "access_token", "refresh_token")
}

/// Token store rooted in a unique temp directory.
pub fn temp_tokens(name: &str) -> TokenStore {
    tokens_at(&temp_dir(name))
}
