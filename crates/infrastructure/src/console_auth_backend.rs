//! Console authentication backend for development. Logs verification codes
//! to tracing output and accepts a single configured code.

use async_trait::async_trait;
use retrofit_application::{AuthBackend, AuthGrant, SessionRenewal};
use retrofit_core::{AppError, AppResult};
use retrofit_domain::{AccountRecord, LoginCredentials, VerificationPurpose};
use tracing::info;
use uuid::Uuid;

const ACCESS_TOKEN_PREFIX: &str = "console-access-";
const REFRESH_TOKEN_PREFIX: &str = "console-refresh-";

/// Default token lifetime issued by the console backend.
pub const DEFAULT_CONSOLE_TOKEN_LIFETIME_SECONDS: i64 = 2 * 60 * 60;

/// Development authentication backend.
#[derive(Debug, Clone)]
pub struct ConsoleAuthBackend {
    verification_code: String,
    token_lifetime_seconds: i64,
}

impl ConsoleAuthBackend {
    /// Creates a backend that accepts `verification_code` for every phone.
    #[must_use]
    pub fn new(verification_code: impl Into<String>) -> Self {
        Self {
            verification_code: verification_code.into(),
            token_lifetime_seconds: DEFAULT_CONSOLE_TOKEN_LIFETIME_SECONDS,
        }
    }

    /// Overrides the issued token lifetime.
    #[must_use]
    pub fn with_token_lifetime(mut self, seconds: i64) -> Self {
        self.token_lifetime_seconds = seconds;
        self
    }

    fn grant(&self, account: AccountRecord) -> AuthGrant {
        AuthGrant {
            account,
            access_token: format!("{ACCESS_TOKEN_PREFIX}{}", Uuid::new_v4()),
            refresh_token: format!("{REFRESH_TOKEN_PREFIX}{}", Uuid::new_v4()),
            expires_in_seconds: self.token_lifetime_seconds,
        }
    }
}

fn validate_phone_number(phone_number: &str) -> AppResult<()> {
    let digits = phone_number.trim();
    if digits.len() < 6 || !digits.chars().all(|character| character.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "'{phone_number}' is not a phone number"
        )));
    }
    Ok(())
}

#[async_trait]
impl AuthBackend for ConsoleAuthBackend {
    async fn authenticate(&self, credentials: &LoginCredentials) -> AppResult<AuthGrant> {
        validate_phone_number(&credentials.phone_number)
            .map_err(|error| AppError::AuthenticationFailure(error.to_string()))?;
        if credentials.verification_code.trim() != self.verification_code {
            return Err(AppError::AuthenticationFailure(
                "verification code is incorrect".to_owned(),
            ));
        }

        let phone_number = credentials.phone_number.trim();
        let mut account = AccountRecord::new(format!("acct_{phone_number}"), phone_number);
        account.verified = true;
        Ok(self.grant(account))
    }

    async fn exchange_delegated_code(&self, code: &str) -> AppResult<AuthGrant> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::AuthenticationFailure(
                "authorization code is empty".to_owned(),
            ));
        }

        let mut account = AccountRecord::new(format!("delegated_{code}"), "");
        account.verified = true;
        Ok(self.grant(account))
    }

    async fn dispatch_verification_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        validate_phone_number(phone_number)
            .map_err(|error| AppError::VerificationCodeFailure(error.to_string()))?;

        info!(
            phone_number = phone_number,
            purpose = purpose.as_str(),
            "--- VERIFICATION CODE (console) ---\nTo: {}\nCode: {}\n--- END VERIFICATION CODE ---",
            phone_number,
            self.verification_code
        );
        Ok(())
    }

    async fn renew_session(&self, refresh_token: &str) -> AppResult<SessionRenewal> {
        if !refresh_token.starts_with(REFRESH_TOKEN_PREFIX) {
            return Err(AppError::AuthenticationFailure(
                "refresh token was not issued by this backend".to_owned(),
            ));
        }

        Ok(SessionRenewal {
            access_token: format!("{ACCESS_TOKEN_PREFIX}{}", Uuid::new_v4()),
            refresh_token: None,
            expires_in_seconds: self.token_lifetime_seconds,
        })
    }
}
