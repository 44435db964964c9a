//! Static administrative role to permission table.

use std::collections::{BTreeMap, BTreeSet};

use retrofit_core::{AppError, AppResult};

use crate::{AdminRole, Permission};

/// Read-only table from administrative role to its permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    grants: BTreeMap<AdminRole, BTreeSet<Permission>>,
}

impl RoleMapping {
    /// Returns the built-in table shipped with the platform.
    #[must_use]
    pub fn standard() -> Self {
        use Permission::{
            AnalyticsView, ContentManage, DataExport, OrderManage, ProductManage, ServiceManage,
            SurveyManage, UserManage,
        };

        let grants = BTreeMap::from([
            (
                AdminRole::SuperAdmin,
                Permission::all().iter().copied().collect(),
            ),
            (
                AdminRole::Admin,
                BTreeSet::from([
                    UserManage,
                    ProductManage,
                    ContentManage,
                    SurveyManage,
                    OrderManage,
                    ServiceManage,
                    AnalyticsView,
                    DataExport,
                ]),
            ),
            (
                AdminRole::ContentAdmin,
                BTreeSet::from([ContentManage, ProductManage]),
            ),
            (
                AdminRole::ServiceAdmin,
                BTreeSet::from([ServiceManage, SurveyManage, OrderManage]),
            ),
            (AdminRole::Analyst, BTreeSet::from([AnalyticsView, DataExport])),
        ]);

        Self { grants }
    }

    /// Builds a table from explicit grants. Roles left out receive no permissions.
    #[must_use]
    pub fn from_grants(grants: BTreeMap<AdminRole, BTreeSet<Permission>>) -> Self {
        Self { grants }
    }

    /// Parses a JSON document such as `{"analyst": ["analytics.view"]}`.
    pub fn from_json(document: &str) -> AppResult<Self> {
        let grants: BTreeMap<AdminRole, BTreeSet<Permission>> = serde_json::from_str(document)
            .map_err(|error| AppError::Validation(format!("invalid role mapping: {error}")))?;

        Ok(Self { grants })
    }

    /// Returns the permissions granted to `role`.
    #[must_use]
    pub fn permissions_for(&self, role: AdminRole) -> BTreeSet<Permission> {
        self.grants.get(&role).cloned().unwrap_or_default()
    }

    /// Returns whether `role` carries `permission`.
    #[must_use]
    pub fn grants(&self, role: AdminRole, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|permissions| permissions.contains(&permission))
    }
}

impl Default for RoleMapping {
    fn default() -> Self {
        Self::standard()
    }
}
