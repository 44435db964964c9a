//! Authenticated principal and the inputs used to establish it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdentityStatus, UserRole};

const DISPLAY_NAME_PREFIX: &str = "User";
const DISPLAY_NAME_SUFFIX_LEN: usize = 4;

/// Optional profile fields supplied at login or in a later profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    /// Preferred display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Company name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Industry sector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Region or province.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Business role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl ProfileFields {
    /// Returns true when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Phone number + verification code login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    /// Phone number the code was sent to.
    pub phone_number: String,
    /// One-time verification code.
    pub verification_code: String,
    /// Profile fields captured alongside the login.
    #[serde(default, flatten)]
    pub profile: ProfileFields,
}

impl LoginCredentials {
    /// Creates credentials without profile fields.
    #[must_use]
    pub fn new(phone_number: impl Into<String>, verification_code: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            verification_code: verification_code.into(),
            profile: ProfileFields::default(),
        }
    }

    /// Attaches profile fields.
    #[must_use]
    pub fn with_profile(mut self, profile: ProfileFields) -> Self {
        self.profile = profile;
        self
    }
}

/// Account record as reported by the authentication backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Stable account identifier.
    pub id: String,
    /// Phone number bound to the account.
    #[serde(default)]
    pub phone_number: String,
    /// Display name stored by the backend.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
    /// Company name.
    #[serde(default)]
    pub company: Option<String>,
    /// Industry sector.
    #[serde(default)]
    pub industry: Option<String>,
    /// Region or province.
    #[serde(default)]
    pub region: Option<String>,
    /// Business role.
    #[serde(default)]
    pub role: Option<UserRole>,
    /// Whether the account passed verification.
    #[serde(default)]
    pub verified: bool,
    /// Account status.
    #[serde(default)]
    pub status: IdentityStatus,
    /// Account creation time, if the backend tracks it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    /// Creates a minimal active account record.
    #[must_use]
    pub fn new(id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            display_name: None,
            email: None,
            company: None,
            industry: None,
            region: None,
            role: None,
            verified: false,
            status: IdentityStatus::Active,
            created_at: None,
        }
    }
}

/// Authenticated principal bound to the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    id: String,
    phone_number: String,
    display_name: String,
    email: Option<String>,
    company: Option<String>,
    industry: Option<String>,
    region: Option<String>,
    role: UserRole,
    verified: bool,
    status: IdentityStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Builds the identity for a fresh login.
    ///
    /// Fields supplied by the caller take precedence over the account record.
    /// `phone_number` overrides the account phone when present. Without any
    /// display name the nickname is derived from the phone-number suffix.
    #[must_use]
    pub fn establish(
        account: AccountRecord,
        phone_number: Option<&str>,
        profile: ProfileFields,
        now: DateTime<Utc>,
    ) -> Self {
        let phone_number = phone_number
            .map(str::to_owned)
            .unwrap_or(account.phone_number);
        let display_name = profile
            .nickname
            .or(account.display_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| default_display_name(phone_number.as_str()));

        Self {
            id: account.id,
            display_name,
            email: profile.email.or(account.email),
            company: profile.company.or(account.company),
            industry: profile.industry.or(account.industry),
            region: profile.region.or(account.region),
            role: profile.role.or(account.role).unwrap_or_default(),
            verified: account.verified,
            status: account.status,
            created_at: account.created_at.unwrap_or(now),
            updated_at: now,
            last_login_at: Some(now),
            phone_number,
        }
    }

    /// Merges a profile update and refreshes `updated_at`.
    pub fn apply_update(&mut self, patch: ProfileFields, now: DateTime<Utc>) {
        if let Some(nickname) = patch.nickname.filter(|name| !name.trim().is_empty()) {
            self.display_name = nickname;
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(company) = patch.company {
            self.company = Some(company);
        }
        if let Some(industry) = patch.industry {
            self.industry = Some(industry);
        }
        if let Some(region) = patch.region {
            self.region = Some(region);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        self.updated_at = now.max(self.updated_at);
    }

    /// Returns the stable account identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the phone number.
    #[must_use]
    pub fn phone_number(&self) -> &str {
        self.phone_number.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the email, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the company, if known.
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    /// Returns the industry, if known.
    #[must_use]
    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref()
    }

    /// Returns the region, if known.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns the business role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Returns whether the account is verified.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// Returns the account status.
    #[must_use]
    pub fn status(&self) -> IdentityStatus {
        self.status
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last modification time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the last login time.
    #[must_use]
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }
}

/// Derives a nickname such as `User1111` from the last digits of a phone number.
#[must_use]
pub fn default_display_name(phone_number: &str) -> String {
    let trimmed = phone_number.trim();
    let skip = trimmed
        .chars()
        .count()
        .saturating_sub(DISPLAY_NAME_SUFFIX_LEN);
    let suffix: String = trimmed.chars().skip(skip).collect();

    format!("{DISPLAY_NAME_PREFIX}{suffix}")
}
