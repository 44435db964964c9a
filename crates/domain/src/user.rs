//! User classification types and validation rules.

use std::str::FromStr;

use retrofit_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Business role of a storefront account.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Homeowner or private individual.
    #[default]
    Individual,
    /// Company buying retrofit services.
    Company,
    /// Equipment or material supplier.
    Supplier,
    /// Construction contractor.
    Contractor,
    /// Retrofit designer or consultant.
    Designer,
    /// Public sector body.
    Government,
    /// Platform operator account.
    Admin,
}

impl UserRole {
    /// Returns the storage string for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
            Self::Supplier => "supplier",
            Self::Contractor => "contractor",
            Self::Designer => "designer",
            Self::Government => "government",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "individual" => Ok(Self::Individual),
            "company" => Ok(Self::Company),
            "supplier" => Ok(Self::Supplier),
            "contractor" => Ok(Self::Contractor),
            "designer" => Ok(Self::Designer),
            "government" => Ok(Self::Government),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("unknown user role '{value}'"))),
        }
    }
}

/// Account status reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    /// Account is usable.
    #[default]
    Active,
    /// Account awaits review or verification.
    Pending,
    /// Account has been deactivated.
    Inactive,
}

impl IdentityStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Inactive => "inactive",
        }
    }
}

/// Why a verification code is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    /// Sign in with an existing account.
    Login,
    /// Create a new account.
    Register,
    /// Recover account access.
    ResetPassword,
    /// Attach a phone number to an account.
    BindPhone,
}

impl VerificationPurpose {
    /// Returns the transport string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::ResetPassword => "reset_password",
            Self::BindPhone => "bind_phone",
        }
    }
}

impl FromStr for VerificationPurpose {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "login" => Ok(Self::Login),
            "register" => Ok(Self::Register),
            "reset_password" => Ok(Self::ResetPassword),
            "bind_phone" => Ok(Self::BindPhone),
            _ => Err(AppError::Validation(format!(
                "unknown verification purpose '{value}'"
            ))),
        }
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.' and no further '@'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Compares against a raw, unnormalized address.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.0.as_str())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_is_accepted() {
        let email = EmailAddress::new("USER@Example.COM");
        assert!(email.is_ok());
        assert_eq!(
            email.unwrap_or_else(|_| panic!("test")).as_str(),
            "user@example.com"
        );
    }

    #[test]
    fn email_without_at_is_rejected() {
        assert!(EmailAddress::new("noatsign").is_err());
    }

    #[test]
    fn email_with_two_ats_is_rejected() {
        assert!(EmailAddress::new("a@b@example.com").is_err());
    }

    #[test]
    fn email_match_ignores_case_and_padding() {
        let email = EmailAddress::new("ops@retrofit.example").unwrap_or_else(|_| panic!("test"));
        assert!(email.matches("  OPS@Retrofit.Example "));
        assert!(!email.matches("other@retrofit.example"));
    }

    #[test]
    fn user_role_roundtrip_storage_value() {
        for role in [UserRole::Supplier, UserRole::Designer, UserRole::Admin] {
            let restored = UserRole::from_str(role.as_str());
            assert_eq!(restored.ok(), Some(role));
        }
    }

    #[test]
    fn unknown_verification_purpose_is_rejected() {
        assert!(VerificationPurpose::from_str("unlock").is_err());
    }
}
