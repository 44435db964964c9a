//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod admin;
mod elevation;
mod identity;
mod role_mapping;
mod security;
mod session;
mod storage;
mod user;

pub use admin::{AdminIdentity, ElevationGrant};
pub use elevation::ElevationRules;
pub use identity::{AccountRecord, Identity, LoginCredentials, ProfileFields, default_display_name};
pub use role_mapping::RoleMapping;
pub use security::{AdminRole, Permission};
pub use session::Session;
pub use storage::{
    ADMIN_DATA_KEY, ADMIN_MODE_KEY, ADMIN_STORAGE_KEYS, AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY,
    SESSION_STORAGE_KEYS, SIGNED_IN_STORAGE_KEYS, TOKEN_EXPIRES_AT_KEY, USER_DATA_KEY,
};
pub use user::{EmailAddress, IdentityStatus, UserRole, VerificationPurpose};
