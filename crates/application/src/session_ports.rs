//! Ports the session core depends on.

use async_trait::async_trait;

use retrofit_core::AppResult;
use retrofit_domain::{
    AccountRecord, ElevationGrant, ElevationRules, Identity, LoginCredentials, VerificationPurpose,
};

/// Synchronous key/value persistence used to survive process restarts.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// Successful authentication as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    /// Account the credentials belong to.
    pub account: AccountRecord,
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in_seconds: i64,
}

/// Successful refresh-token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRenewal {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the backend issued one.
    pub refresh_token: Option<String>,
    /// New access token lifetime in seconds.
    pub expires_in_seconds: i64,
}

/// Authentication backend collaborator.
///
/// Implementations report rejections with the matching `AppError` kind and
/// transport problems with `AppError::Internal`.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Checks a phone number + verification code login.
    async fn authenticate(&self, credentials: &LoginCredentials) -> AppResult<AuthGrant>;

    /// Exchanges a third-party authorization code.
    async fn exchange_delegated_code(&self, code: &str) -> AppResult<AuthGrant>;

    /// Sends a verification code to `phone_number`.
    async fn dispatch_verification_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()>;

    /// Exchanges a refresh token for a new access token.
    async fn renew_session(&self, refresh_token: &str) -> AppResult<SessionRenewal>;
}

/// Eligibility predicate deciding whether an identity may enter admin mode.
pub trait ElevationPolicy: Send + Sync {
    /// Returns the grant for an eligible identity.
    fn evaluate(&self, identity: &Identity) -> Option<ElevationGrant>;
}

impl ElevationPolicy for ElevationRules {
    fn evaluate(&self, identity: &Identity) -> Option<ElevationGrant> {
        ElevationRules::evaluate(self, identity)
    }
}
