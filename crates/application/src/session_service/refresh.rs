use std::sync::Weak;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::*;

impl SessionService {
    /// Exchanges the refresh token for a new access token.
    ///
    /// Any failure ends the session and returns `SessionExpired`. A result
    /// that arrives after the session changed is discarded with `Superseded`.
    /// Refreshes run one at a time; a caller that waited starts from the
    /// tokens the previous refresh installed.
    pub async fn refresh(&self) -> AppResult<()> {
        let _flight = self.inner.refresh_flight.lock().await;
        self.refresh_exclusive().await
    }

    /// Runs one expiry check. Returns whether a refresh was performed.
    ///
    /// The check is made after any refresh in flight has finished, so a
    /// session renewed meanwhile is not refreshed again.
    pub async fn check_session_expiry(&self) -> AppResult<bool> {
        let _flight = self.inner.refresh_flight.lock().await;
        let Some(session) = self.current_session() else {
            return Ok(false);
        };
        if !session.needs_refresh(Utc::now(), self.inner.config.refresh_threshold_chrono()) {
            return Ok(false);
        }

        self.refresh_exclusive().await?;
        Ok(true)
    }

    /// Caller holds `refresh_flight`.
    async fn refresh_exclusive(&self) -> AppResult<()> {
        let ticket = self.inner.identity_store.begin_refresh()?;
        let result = self
            .inner
            .backend
            .renew_session(&ticket.refresh_token)
            .await;

        let storage = &self.inner.storage;
        let applied = result.and_then(|renewal| {
            self.inner
                .identity_store
                .complete_refresh(&ticket, |current| {
                    let renewed = current.renew(
                        renewal.access_token,
                        renewal.refresh_token,
                        renewal.expires_in_seconds,
                        Utc::now(),
                    )?;
                    persist_tokens(storage.as_ref(), &renewed)?;
                    Ok(renewed)
                })
        });

        match applied {
            Ok(Some(session)) => {
                info!(
                    generation = ticket.generation,
                    expires_at = %session.expires_at(),
                    "session refreshed"
                );
                self.record_event(None, "refresh", "success");
                Ok(())
            }
            Ok(None) => Err(superseded()),
            Err(error) => {
                if !self.logout_if_current(ticket.generation) {
                    return Err(superseded());
                }
                warn!(error = %error, "session refresh failed; signed out");
                self.record_event(None, "refresh", "rejected");
                Err(AppError::SessionExpired(format!(
                    "session refresh failed: {error}"
                )))
            }
        }
    }

    /// Starts the recurring expiry check for `generation`, replacing any
    /// previous schedule. Skipped when the session already moved on.
    pub(super) fn start_refresh_schedule(&self, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available; scheduled session refresh disabled");
            return;
        };

        let mut slot = lock_unpoisoned(&self.inner.refresh_task);
        if self.inner.identity_store.generation() != generation {
            return;
        }

        let period = self.inner.config.refresh_check_interval();
        let task = runtime.spawn(run_refresh_schedule(
            Arc::downgrade(&self.inner),
            generation,
            period,
        ));
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
        debug!(generation, period_seconds = period.as_secs(), "refresh schedule started");
    }

    pub(super) fn cancel_refresh_schedule(&self) {
        if let Some(task) = lock_unpoisoned(&self.inner.refresh_task).take() {
            task.abort();
        }
    }
}

/// Periodic expiry check. Holds only a weak handle between ticks so dropping
/// the last service clone ends the loop.
async fn run_refresh_schedule(core: Weak<SessionCore>, generation: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = core.upgrade() else {
            break;
        };
        let service = SessionService { inner };
        if service.inner.identity_store.generation() != generation {
            debug!(generation, "refresh schedule outlived its session");
            break;
        }

        match service.check_session_expiry().await {
            Ok(true) => debug!(generation, "scheduled refresh completed"),
            Ok(false) => {}
            Err(AppError::Superseded(_)) => break,
            Err(error) => {
                warn!(generation, error = %error, "scheduled refresh failed");
                break;
            }
        }
    }
}

fn superseded() -> AppError {
    AppError::Superseded("the session changed while the refresh was in flight".to_owned())
}
