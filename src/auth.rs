//! Authentication Module
//!
//! Owns the token lifecycle: startup verification, token refresh on
//! rejection, and logout. Screens of the old client each re-implemented
//! this; here it lives in one place and consumers only see `token()` and
//! state change notifications.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::storage::{TokenKind, TokenStore};
use crate::sync::{ApiError, TrackerApi, VerifyStatus};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing known yet; startup has not run.
    Unknown,
    /// Startup verification in flight.
    Verifying,
    /// The access token was rejected and a refresh is in flight.
    RefreshPending,
    /// Holding an access token last accepted by verify or freshly minted
    /// by refresh.
    Authorized,
    Unauthorized,
}

struct SessionInner {
    access_token: String,
    state: SessionState,
}

/// Single owner of session state and token mutation.
pub struct AuthSession {
    api: Arc<dyn TrackerApi>,
    tokens: TokenStore,
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<SessionState>,
    // Serializes refresh attempts so two callers reporting the same rejected
    // token trigger exactly one refresh call.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AuthSession {
    pub fn new(api: Arc<dyn TrackerApi>, tokens: TokenStore) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unknown);
        Self {
            api,
            tokens,
            inner: Mutex::new(SessionInner {
                access_token: String::new(),
                state: SessionState::Unknown,
            }),
            state_tx,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The access token, present only while authorized.
    pub fn token(&self) -> Option<String> {
        let inner = self.lock();
        if inner.state == SessionState::Authorized && !inner.access_token.is_empty() {
            Some(inner.access_token.clone())
        } else {
            None
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.state() == SessionState::Authorized
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, state: SessionState) {
        self.lock().state = state;
        let _ = self.state_tx.send(state);
    }

    fn set_authorized(&self, access_token: String) {
        {
            let mut inner = self.lock();
            inner.access_token = access_token;
            inner.state = SessionState::Authorized;
        }
        let _ = self.state_tx.send(SessionState::Authorized);
    }

    fn set_unauthorized(&self) {
        {
            let mut inner = self.lock();
            inner.access_token.clear();
            inner.state = SessionState::Unauthorized;
        }
        let _ = self.state_tx.send(SessionState::Unauthorized);
    }

    /// Startup flow: verify the stored access token, falling back to the
    /// refresh path when it has expired.
    pub async fn startup(&self) -> SessionState {
        self.transition(SessionState::Verifying);

        let access_token = self.tokens.get(TokenKind::Access);

        match self.api.verify(&access_token).await {
            Ok(VerifyStatus::Valid) => {
                info!("Access token verified");
                self.set_authorized(access_token);
            }
            Ok(VerifyStatus::Expired) => {
                info!("Access token expired, attempting refresh");
                self.run_refresh().await;
            }
            Err(e) => {
                warn!("Verification failed: {}", e);
                self.set_unauthorized();
            }
        }

        self.state()
    }

    /// Report that `failed_token` was rejected by an authenticated request.
    /// Runs at most one refresh per rejected token; returns whether the
    /// session is authorized afterwards.
    pub async fn handle_unauthorized(&self, failed_token: &str) -> bool {
        let _gate = self.refresh_gate.lock().await;

        // Another caller may have already refreshed past this token.
        {
            let inner = self.lock();
            if inner.state == SessionState::Authorized && inner.access_token != failed_token {
                debug!("Token already refreshed, skipping");
                return true;
            }
        }

        self.run_refresh().await;
        self.is_authorized()
    }

    // The refresh path shared by startup and mid-session rejection: clear
    // the stored access token, exchange the refresh token for a new pair.
    async fn run_refresh(&self) {
        self.transition(SessionState::RefreshPending);
        self.tokens.set(TokenKind::Access, "");

        let refresh_token = self.tokens.get(TokenKind::Refresh);

        match self.api.refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens.set(TokenKind::Access, &pair.jwt_token);
                self.tokens.set(TokenKind::Refresh, &pair.refresh_token);
                self.set_authorized(pair.jwt_token);
            }
            Err(ApiError::Rejected(status)) => {
                warn!("Refresh rejected with status {}", status);
                self.tokens.clear();
                self.set_unauthorized();
            }
            Err(e) => {
                // Transport failure: unauthorized for this run, but the
                // stored pair is kept for the next startup.
                warn!("Refresh failed: {}", e);
                self.set_unauthorized();
            }
        }
    }

    /// Logout: best-effort route deactivation, then clear the session.
    pub async fn logout(&self) {
        info!("Logging out");

        let token = self.lock().access_token.clone();
        if !token.is_empty() {
            if let Err(e) = self.api.deactivate_route(&token).await {
                debug!("Route deactivation failed (ignored): {}", e);
            }
        }

        self.tokens.set(TokenKind::Access, "");
        self.set_unauthorized();
    }
}
