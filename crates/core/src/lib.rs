//! Shared primitives for all Rust crates in the retrofit session core.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across retrofit crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend rejected the presented credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The backend refused to dispatch a verification code.
    #[error("verification code dispatch failed: {0}")]
    VerificationCodeFailure(String),

    /// The operation requires an authenticated session.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),

    /// A refresh was requested without any session to renew.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The session could not be renewed and has been terminated.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The current identity is not eligible for the requested elevation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A persisted record exists but cannot be parsed.
    #[error("persisted record is corrupted: {0}")]
    PersistenceCorruption(String),

    /// An in-flight result was discarded because the session changed meanwhile.
    #[error("superseded: {0}")]
    Superseded(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
