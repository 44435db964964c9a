//! Credential material bound to an identity.

use chrono::{DateTime, Duration, Utc};
use retrofit_core::{AppError, AppResult, NonEmptyString};

/// Live access/refresh token pair with its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access_token: NonEmptyString,
    refresh_token: NonEmptyString,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Issues a session valid for `expires_in_seconds` from `now`.
    pub fn issue(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let expires_at = expiry_from(expires_in_seconds, now)?;

        Ok(Self {
            access_token: NonEmptyString::new(access_token)?,
            refresh_token: NonEmptyString::new(refresh_token)?,
            issued_at: now,
            expires_at,
        })
    }

    /// Rebuilds a persisted session from its stored expiry in epoch milliseconds.
    ///
    /// The issue time is not persisted; it is taken as `now`, clamped to stay
    /// strictly before the expiry.
    pub fn restore(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at_millis: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let expires_at = DateTime::from_timestamp_millis(expires_at_millis).ok_or_else(|| {
            AppError::PersistenceCorruption(format!(
                "token expiry '{expires_at_millis}' is out of range"
            ))
        })?;

        Ok(Self {
            access_token: NonEmptyString::new(access_token)?,
            refresh_token: NonEmptyString::new(refresh_token)?,
            issued_at: now.min(
                expires_at
                    .checked_sub_signed(Duration::milliseconds(1))
                    .unwrap_or(expires_at),
            ),
            expires_at,
        })
    }

    /// Returns the renewed session. Keeps the refresh token unless rotated.
    pub fn renew(
        &self,
        access_token: impl Into<String>,
        rotated_refresh_token: Option<String>,
        expires_in_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        let refresh_token = match rotated_refresh_token {
            Some(token) => NonEmptyString::new(token)?,
            None => self.refresh_token.clone(),
        };

        Ok(Self {
            access_token: NonEmptyString::new(access_token)?,
            refresh_token,
            issued_at: now,
            expires_at: expiry_from(expires_in_seconds, now)?,
        })
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.as_str()
    }

    /// Returns the issue time.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the absolute expiry.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the expiry in epoch milliseconds, the persisted representation.
    #[must_use]
    pub fn expires_at_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }

    /// Returns the lifetime left at `now`; negative once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Returns whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns whether the remaining lifetime has dropped below `threshold`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.remaining(now) < threshold
    }
}

fn expiry_from(expires_in_seconds: i64, now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    if expires_in_seconds <= 0 {
        return Err(AppError::Validation(format!(
            "session lifetime must be positive, got {expires_in_seconds}s"
        )));
    }

    Duration::try_seconds(expires_in_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "session lifetime {expires_in_seconds}s is out of range"
            ))
        })
}
