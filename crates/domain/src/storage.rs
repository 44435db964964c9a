//! Persistence keys shared by the session and admin layers.

/// Access token string.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Refresh token string.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Serialized identity record.
pub const USER_DATA_KEY: &str = "user_data";
/// Absolute token expiry in epoch milliseconds.
pub const TOKEN_EXPIRES_AT_KEY: &str = "token_expires_at";
/// Admin mode flag.
pub const ADMIN_MODE_KEY: &str = "admin_mode";
/// Serialized admin identity record.
pub const ADMIN_DATA_KEY: &str = "admin_data";

/// Keys owned by the session lifecycle.
pub const SESSION_STORAGE_KEYS: [&str; 4] = [
    AUTH_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_DATA_KEY,
    TOKEN_EXPIRES_AT_KEY,
];

/// Keys owned by admin mode.
pub const ADMIN_STORAGE_KEYS: [&str; 2] = [ADMIN_MODE_KEY, ADMIN_DATA_KEY];

/// Every key a signed-in process may leave behind. Logout and a failed
/// restore remove all of them.
pub const SIGNED_IN_STORAGE_KEYS: [&str; 6] = [
    AUTH_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_DATA_KEY,
    TOKEN_EXPIRES_AT_KEY,
    ADMIN_MODE_KEY,
    ADMIN_DATA_KEY,
];
