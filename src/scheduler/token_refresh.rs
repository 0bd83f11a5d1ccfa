//! Credential refresh scheduler
//!
//! Identity tokens expire after an hour. The session store re-mints the
//! credential on every identity event, but a long-running client also needs
//! to rotate it on a timer while someone stays signed in.

use crate::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Periodically refreshes the bearer credential of the signed-in identity
pub struct TokenRefreshScheduler {
    session: Arc<SessionStore>,
    interval: Duration,
}

impl TokenRefreshScheduler {
    pub fn new(session: Arc<SessionStore>, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Start the refresh loop; abort the returned handle to stop it
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Token refresh scheduler started (every {} minutes)",
                self.interval.as_secs() / 60
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.refresh_once().await;
            }
        })
    }

    async fn refresh_once(&self) {
        match self.session.refresh_credential().await {
            Ok(Some(_)) => info!("Credential refreshed"),
            Ok(None) => debug!("No signed-in identity, skipping credential refresh"),
            Err(e) => warn!("Scheduled credential refresh failed: {}", e),
        }
    }
}
