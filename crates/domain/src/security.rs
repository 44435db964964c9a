use std::str::FromStr;

use retrofit_core::AppError;
use serde::{Deserialize, Serialize};

/// Capabilities granted to elevated identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Allows managing storefront accounts.
    #[serde(rename = "user.manage")]
    UserManage,
    /// Allows managing the product catalogue.
    #[serde(rename = "product.manage")]
    ProductManage,
    /// Allows editing articles, cases and static pages.
    #[serde(rename = "content.manage")]
    ContentManage,
    /// Allows managing building surveys.
    #[serde(rename = "survey.manage")]
    SurveyManage,
    /// Allows managing orders.
    #[serde(rename = "order.manage")]
    OrderManage,
    /// Allows handling service and support requests.
    #[serde(rename = "service.manage")]
    ServiceManage,
    /// Allows viewing dashboards and reports.
    #[serde(rename = "analytics.view")]
    AnalyticsView,
    /// Allows exporting data sets.
    #[serde(rename = "data.export")]
    DataExport,
    /// Allows changing platform settings.
    #[serde(rename = "system.settings")]
    SystemSettings,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserManage => "user.manage",
            Self::ProductManage => "product.manage",
            Self::ContentManage => "content.manage",
            Self::SurveyManage => "survey.manage",
            Self::OrderManage => "order.manage",
            Self::ServiceManage => "service.manage",
            Self::AnalyticsView => "analytics.view",
            Self::DataExport => "data.export",
            Self::SystemSettings => "system.settings",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::UserManage,
            Permission::ProductManage,
            Permission::ContentManage,
            Permission::SurveyManage,
            Permission::OrderManage,
            Permission::ServiceManage,
            Permission::AnalyticsView,
            Permission::DataExport,
            Permission::SystemSettings,
        ];

        ALL
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Administrative role held by an elevated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Unrestricted operator.
    SuperAdmin,
    /// General platform administrator.
    Admin,
    /// Content editor.
    ContentAdmin,
    /// Customer service operator.
    ServiceAdmin,
    /// Read-only reporting role.
    Analyst,
}

impl AdminRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::ContentAdmin => "content_admin",
            Self::ServiceAdmin => "service_admin",
            Self::Analyst => "analyst",
        }
    }

    /// Returns all known roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AdminRole] = &[
            AdminRole::SuperAdmin,
            AdminRole::Admin,
            AdminRole::ContentAdmin,
            AdminRole::ServiceAdmin,
            AdminRole::Analyst,
        ];

        ALL
    }
}

impl FromStr for AdminRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "content_admin" => Ok(Self::ContentAdmin),
            "service_admin" => Ok(Self::ServiceAdmin),
            "analyst" => Ok(Self::Analyst),
            _ => Err(AppError::Validation(format!(
                "unknown admin role value '{value}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{AdminRole, Permission};

    #[test]
    fn permission_roundtrip_storage_value() {
        for permission in Permission::all() {
            let restored = Permission::from_str(permission.as_str());
            assert_eq!(restored.ok(), Some(*permission));
        }
    }

    #[test]
    fn permission_serde_uses_storage_value() {
        let json = serde_json::to_string(&Permission::AnalyticsView).unwrap_or_default();
        assert_eq!(json, "\"analytics.view\"");
    }

    #[test]
    fn unknown_permission_is_rejected() {
        let parsed = Permission::from_str("survey.delete");
        assert!(parsed.is_err());
    }

    #[test]
    fn admin_role_roundtrip_storage_value() {
        for role in AdminRole::all() {
            assert_eq!(AdminRole::from_str(role.as_str()).ok(), Some(*role));
        }
    }
}
