//! Elevated identity layered on top of a base identity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AdminRole, Identity, Permission, RoleMapping};

/// Outcome of a successful eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationGrant {
    /// Administrative role to assume.
    pub admin_role: AdminRole,
    /// Department recorded on the elevated identity.
    pub department: Option<String>,
}

impl ElevationGrant {
    /// Creates a grant for `admin_role` without a department.
    #[must_use]
    pub fn new(admin_role: AdminRole) -> Self {
        Self {
            admin_role,
            department: None,
        }
    }

    /// Records the department.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// Elevated identity. Permissions are fixed at elevation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    #[serde(flatten)]
    identity: Identity,
    admin_role: AdminRole,
    permissions: BTreeSet<Permission>,
    login_count: u32,
    is_active: bool,
    department: Option<String>,
    last_login_ip: Option<String>,
    elevated_at: DateTime<Utc>,
}

impl AdminIdentity {
    /// Elevates `identity` according to `grant`, resolving permissions once.
    #[must_use]
    pub fn elevate(
        identity: Identity,
        grant: ElevationGrant,
        mapping: &RoleMapping,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            permissions: mapping.permissions_for(grant.admin_role),
            admin_role: grant.admin_role,
            department: grant.department,
            login_count: 1,
            is_active: true,
            last_login_ip: None,
            elevated_at: now,
            identity,
        }
    }

    /// Continues the login counter of a previous elevation of the same account.
    #[must_use]
    pub fn continuing(mut self, previous: &AdminIdentity) -> Self {
        if previous.identity.id() == self.identity.id() {
            self.login_count = previous.login_count.saturating_add(1);
        }
        self
    }

    /// Records the client address the elevation happened from.
    #[must_use]
    pub fn with_last_login_ip(mut self, address: Option<String>) -> Self {
        self.last_login_ip = address;
        self
    }

    /// Replaces the embedded base identity after a profile edit of the same
    /// account. Identities of other accounts are ignored.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        if identity.id() == self.identity.id() {
            self.identity = identity;
        }
        self
    }

    /// Returns the base identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the administrative role.
    #[must_use]
    pub fn admin_role(&self) -> AdminRole {
        self.admin_role
    }

    /// Returns the permission set.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns how many times this account has been elevated.
    #[must_use]
    pub fn login_count(&self) -> u32 {
        self.login_count
    }

    /// Returns whether the administrative account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the department.
    #[must_use]
    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    /// Returns the last client address.
    #[must_use]
    pub fn last_login_ip(&self) -> Option<&str> {
        self.last_login_ip.as_deref()
    }

    /// Returns when the elevation happened.
    #[must_use]
    pub fn elevated_at(&self) -> DateTime<Utc> {
        self.elevated_at
    }

    /// Returns whether `permission` was granted.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Returns whether any of `permissions` was granted.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|permission| self.has_permission(*permission))
    }

    /// Returns whether the elevated role equals `role`.
    #[must_use]
    pub fn has_role(&self, role: AdminRole) -> bool {
        self.admin_role == role
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::{AccountRecord, ProfileFields};

    use super::*;

    fn identity(id: &str) -> Identity {
        Identity::establish(
            AccountRecord::new(id, "13800001111"),
            None,
            ProfileFields::default(),
            Utc::now(),
        )
    }

    #[test]
    fn elevate_resolves_permissions_from_mapping() {
        let admin = AdminIdentity::elevate(
            identity("admin_001"),
            ElevationGrant::new(AdminRole::Analyst),
            &RoleMapping::standard(),
            Utc::now(),
        );

        assert!(admin.has_permission(Permission::AnalyticsView));
        assert!(!admin.has_permission(Permission::SystemSettings));
        assert!(admin.has_any_permission(&[Permission::SystemSettings, Permission::DataExport]));
        assert!(admin.has_role(AdminRole::Analyst));
        assert_eq!(admin.login_count(), 1);
    }

    #[test]
    fn continuing_counts_only_same_account() {
        let now = Utc::now();
        let mapping = RoleMapping::standard();
        let previous = AdminIdentity::elevate(
            identity("admin_001"),
            ElevationGrant::new(AdminRole::Admin),
            &mapping,
            now,
        );

        let same = AdminIdentity::elevate(
            identity("admin_001"),
            ElevationGrant::new(AdminRole::Admin),
            &mapping,
            now,
        )
        .continuing(&previous);
        let other = AdminIdentity::elevate(
            identity("admin_002"),
            ElevationGrant::new(AdminRole::Admin),
            &mapping,
            now,
        )
        .continuing(&previous);

        assert_eq!(same.login_count(), 2);
        assert_eq!(other.login_count(), 1);
    }

    #[test]
    fn with_identity_ignores_other_accounts() {
        let admin = AdminIdentity::elevate(
            identity("admin_001"),
            ElevationGrant::new(AdminRole::Admin),
            &RoleMapping::standard(),
            Utc::now(),
        );
        let mut renamed = identity("admin_001");
        renamed.apply_update(
            ProfileFields {
                nickname: Some("Ops".to_owned()),
                ..ProfileFields::default()
            },
            Utc::now(),
        );

        let updated = admin.clone().with_identity(renamed);
        let untouched = admin.clone().with_identity(identity("admin_002"));

        assert_eq!(updated.identity().display_name(), "Ops");
        assert_eq!(untouched, admin);
    }

    #[test]
    fn admin_identity_persists_as_flat_record() {
        let admin = AdminIdentity::elevate(
            identity("admin_001"),
            ElevationGrant::new(AdminRole::ContentAdmin).with_department("Editorial"),
            &RoleMapping::standard(),
            Utc::now(),
        );

        let json = serde_json::to_string(&admin).unwrap_or_default();
        let restored: Result<AdminIdentity, _> = serde_json::from_str(&json);

        assert!(json.contains("\"adminRole\":\"content_admin\""));
        assert!(json.contains("\"phoneNumber\":\"13800001111\""));
        assert_eq!(restored.ok(), Some(admin));
    }
}
