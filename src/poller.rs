//! Location Poller Module
//!
//! Repeating background task that samples the device position and reports
//! it upstream. At most one loop runs per poller; cancellation is
//! cooperative and takes effect at the loop's next suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::position::PositionSource;
use crate::sync::{ApiError, TrackerApi};

pub struct LocationPoller {
    session: Arc<AuthSession>,
    api: Arc<dyn TrackerApi>,
    source: Arc<dyn PositionSource>,
    control: Mutex<Option<PollControl>>,
}

struct PollControl {
    stop_tx: watch::Sender<bool>,
    active: Arc<AtomicBool>,
}

impl LocationPoller {
    pub fn new(
        session: Arc<AuthSession>,
        api: Arc<dyn TrackerApi>,
        source: Arc<dyn PositionSource>,
    ) -> Self {
        Self {
            session,
            api,
            source,
            control: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_control()
            .as_ref()
            .map(|c| c.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Begin polling. The first report fires immediately, then every
    /// `interval`. No-op when a loop is already active.
    pub fn start(&self, interval: Duration) {
        let mut control = self.lock_control();

        if let Some(existing) = control.as_ref() {
            if existing.active.load(Ordering::SeqCst) {
                debug!("Poller already running, ignoring start");
                return;
            }
        }

        info!("Starting location poller (interval: {:?})", interval);

        let (stop_tx, stop_rx) = watch::channel(false);
        let active = Arc::new(AtomicBool::new(true));

        tokio::spawn(poll_loop(
            self.session.clone(),
            self.api.clone(),
            self.source.clone(),
            active.clone(),
            stop_rx,
            interval,
        ));

        *control = Some(PollControl { stop_tx, active });
    }

    /// Request the loop to exit. An in-flight request is not cancelled; the
    /// loop observes the stop at its next suspension point.
    pub fn stop(&self) {
        if let Some(control) = self.lock_control().take() {
            info!("Stopping location poller");
            // Cooperative: signal and detach, the loop exits on its own.
            let _ = control.stop_tx.send(true);
        }
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, Option<PollControl>> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn poll_loop(
    session: Arc<AuthSession>,
    api: Arc<dyn TrackerApi>,
    source: Arc<dyn PositionSource>,
    active: Arc<AtomicBool>,
    mut stop_rx: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick resolves immediately, so the initial report is not
        // delayed by one interval.
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_rx.changed() => break,
        }
        if *stop_rx.borrow() {
            break;
        }

        let position = match source.current_position().await {
            Ok(position) => position,
            Err(e) => {
                warn!("Position sample failed, skipping cycle: {}", e);
                continue;
            }
        };

        let Some(token) = session.token() else {
            info!("No authorized session, stopping poller");
            break;
        };

        match api.update_location(&token, &position).await {
            Ok(()) => {
                debug!(
                    "Reported position lat={} long={} sampled at {}",
                    position.lat, position.long, position.acquired_at
                );
            }
            Err(ApiError::Rejected(401)) => {
                if !session.handle_unauthorized(&token).await {
                    warn!("Token refresh failed, stopping poller");
                    break;
                }
            }
            Err(e) => {
                warn!("Location report failed, skipping cycle: {}", e);
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    debug!("Poller loop exited");
}
