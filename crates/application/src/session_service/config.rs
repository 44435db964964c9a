use std::time::Duration;

use retrofit_core::{AppError, AppResult};

/// Default period between background expiry checks.
pub const DEFAULT_REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default remaining lifetime below which a session is refreshed.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// Scheduling knobs for the session refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    refresh_check_interval: Duration,
    refresh_threshold: Duration,
}

impl SessionConfig {
    /// Creates a validated config.
    pub fn new(refresh_check_interval: Duration, refresh_threshold: Duration) -> AppResult<Self> {
        if refresh_check_interval.is_zero() {
            return Err(AppError::Validation(
                "refresh check interval must be greater than zero".to_owned(),
            ));
        }
        if chrono::Duration::from_std(refresh_threshold).is_err() {
            return Err(AppError::Validation(
                "refresh threshold is out of range".to_owned(),
            ));
        }

        Ok(Self {
            refresh_check_interval,
            refresh_threshold,
        })
    }

    /// Returns the period between background expiry checks.
    #[must_use]
    pub fn refresh_check_interval(&self) -> Duration {
        self.refresh_check_interval
    }

    /// Returns the refresh threshold.
    #[must_use]
    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    pub(crate) fn refresh_threshold_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.refresh_threshold).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_check_interval: DEFAULT_REFRESH_CHECK_INTERVAL,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }
}
