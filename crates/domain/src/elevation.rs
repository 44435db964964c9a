//! Configurable eligibility rules for administrative elevation.

use std::collections::BTreeMap;

use retrofit_core::AppResult;

use crate::{ElevationGrant, EmailAddress, Identity, UserRole};

/// Local elevation rules: designated account ids, reserved email addresses
/// and privileged base roles, checked in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElevationRules {
    accounts: BTreeMap<String, ElevationGrant>,
    emails: Vec<(EmailAddress, ElevationGrant)>,
    base_roles: BTreeMap<UserRole, ElevationGrant>,
}

impl ElevationRules {
    /// Creates rules that elevate nobody.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Elevates the account with identifier `account_id`.
    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>, grant: ElevationGrant) -> Self {
        self.accounts.insert(account_id.into(), grant);
        self
    }

    /// Elevates identities carrying the reserved `email`.
    pub fn with_email(mut self, email: &str, grant: ElevationGrant) -> AppResult<Self> {
        let email = EmailAddress::new(email)?;
        self.emails.retain(|(existing, _)| existing != &email);
        self.emails.push((email, grant));
        Ok(self)
    }

    /// Elevates every identity with the given base role.
    #[must_use]
    pub fn with_base_role(mut self, role: UserRole, grant: ElevationGrant) -> Self {
        self.base_roles.insert(role, grant);
        self
    }

    /// Returns whether no rule is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.emails.is_empty() && self.base_roles.is_empty()
    }

    /// Returns the grant for the first matching rule.
    #[must_use]
    pub fn evaluate(&self, identity: &Identity) -> Option<ElevationGrant> {
        if let Some(grant) = self.accounts.get(identity.id()) {
            return Some(grant.clone());
        }

        if let Some(email) = identity.email()
            && let Some((_, grant)) = self
                .emails
                .iter()
                .find(|(reserved, _)| reserved.matches(email))
        {
            return Some(grant.clone());
        }

        self.base_roles.get(&identity.role()).cloned()
    }
}
