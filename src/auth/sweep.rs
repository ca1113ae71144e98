// Background token refresh loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::manager::AuthManager;

/// Result of a single sweep pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// No credential held yet
    Idle,
    /// Credential still valid
    Fresh,
    /// Expired credential cannot be refreshed (app token)
    NotRefreshable,
    Refreshed,
    /// Refresh attempted and failed; retried next tick
    Failed,
}

/// Periodically refreshes an expired credential between user requests
pub struct RefreshSweep {
    auth: Arc<AuthManager>,
    interval: Duration,
}

impl RefreshSweep {
    pub fn new(auth: Arc<AuthManager>, interval: Duration) -> Self {
        Self { auth, interval }
    }

    pub async fn tick(&self) -> SweepOutcome {
        let cred = match self.auth.store().last_known() {
            Some(cred) => cred,
            None => return SweepOutcome::Idle,
        };

        if !cred.is_expired() {
            return SweepOutcome::Fresh;
        }
        if !cred.can_refresh() {
            tracing::debug!("Expired app token held, it will be re-acquired on demand");
            return SweepOutcome::NotRefreshable;
        }

        tracing::info!("Twitch token expired, refreshing...");
        match self.auth.refresh().await {
            Ok(Some(fresh)) => {
                tracing::info!(
                    "Background refresh succeeded (token: {}...)",
                    fresh.redacted()
                );
                SweepOutcome::Refreshed
            }
            Ok(None) => SweepOutcome::NotRefreshable,
            Err(e) => {
                tracing::warn!("Background token refresh failed, retrying next tick: {}", e);
                SweepOutcome::Failed
            }
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Token refresh sweep started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Token refresh sweep stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
