use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use retrofit_application::{DEFAULT_REFRESH_CHECK_INTERVAL, DEFAULT_REFRESH_THRESHOLD, SessionConfig};
use retrofit_core::{AppError, AppResult};
use retrofit_domain::{AdminRole, ElevationGrant, ElevationRules, RoleMapping, UserRole};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub enum AuthBackendConfig {
    Console { verification_code: String },
    Http { base_url: Url, timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub session_store_path: PathBuf,
    pub auth_backend: AuthBackendConfig,
    pub session: SessionConfig,
    pub role_mapping: RoleMapping,
    pub elevation_rules: ElevationRules,
    pub client_address: Option<String>,
}

impl AgentConfig {
    pub fn load() -> AppResult<Self> {
        let session_store_path = env::var("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".retrofit/session.json"));

        let auth_backend = match env::var("AUTH_BACKEND")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => AuthBackendConfig::Console {
                verification_code: env::var("CONSOLE_VERIFICATION_CODE")
                    .unwrap_or_else(|_| "123456".to_owned()),
            },
            "http" => {
                let raw = required_non_empty_env("AUTH_BACKEND_URL")?;
                let base_url = Url::parse(raw.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid AUTH_BACKEND_URL '{raw}': {error}"))
                })?;
                let timeout_seconds = parse_env_u64("AUTH_BACKEND_TIMEOUT_SECONDS", 15)?;
                AuthBackendConfig::Http {
                    base_url,
                    timeout: Duration::from_secs(timeout_seconds),
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "AUTH_BACKEND must be either 'console' or 'http', got '{other}'"
                )));
            }
        };

        let session = SessionConfig::new(
            Duration::from_secs(parse_env_u64(
                "SESSION_REFRESH_INTERVAL_SECONDS",
                DEFAULT_REFRESH_CHECK_INTERVAL.as_secs(),
            )?),
            Duration::from_secs(parse_env_u64(
                "SESSION_REFRESH_THRESHOLD_SECONDS",
                DEFAULT_REFRESH_THRESHOLD.as_secs(),
            )?),
        )?;

        let role_mapping = match non_empty_env("ROLE_MAPPING_PATH") {
            Some(path) => {
                let document = fs::read_to_string(&path).map_err(|error| {
                    AppError::Validation(format!("failed to read ROLE_MAPPING_PATH '{path}': {error}"))
                })?;
                RoleMapping::from_json(document.as_str())?
            }
            None => RoleMapping::standard(),
        };

        let elevation_rules = elevation_rules(
            non_empty_env("ADMIN_ACCOUNT_IDS").as_deref(),
            non_empty_env("ADMIN_EMAILS").as_deref(),
            non_empty_env("ADMIN_BASE_ROLES").as_deref(),
        )?;

        Ok(Self {
            session_store_path,
            auth_backend,
            session,
            role_mapping,
            elevation_rules,
            client_address: non_empty_env("AGENT_CLIENT_ADDRESS"),
        })
    }
}

/// Builds elevation rules from comma-separated `subject[=admin_role]` lists.
/// Account ids and emails default to `super_admin`; base roles require an
/// explicit admin role.
fn elevation_rules(
    account_ids: Option<&str>,
    emails: Option<&str>,
    base_roles: Option<&str>,
) -> AppResult<ElevationRules> {
    let mut rules = ElevationRules::new();

    for (account_id, role) in parse_entries("ADMIN_ACCOUNT_IDS", account_ids)? {
        rules = rules.with_account(account_id, ElevationGrant::new(role.unwrap_or(AdminRole::SuperAdmin)));
    }

    for (email, role) in parse_entries("ADMIN_EMAILS", emails)? {
        rules = rules.with_email(email.as_str(), ElevationGrant::new(role.unwrap_or(AdminRole::SuperAdmin)))?;
    }

    for (user_role, role) in parse_entries("ADMIN_BASE_ROLES", base_roles)? {
        let Some(role) = role else {
            return Err(AppError::Validation(format!(
                "ADMIN_BASE_ROLES entry '{user_role}' must name an admin role"
            )));
        };
        rules = rules.with_base_role(UserRole::from_str(user_role.as_str())?, ElevationGrant::new(role));
    }

    Ok(rules)
}

fn parse_entries(name: &str, raw: Option<&str>) -> AppResult<Vec<(String, Option<AdminRole>)>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((subject, role)) => {
                let role = AdminRole::from_str(role.trim()).map_err(|error| {
                    AppError::Validation(format!("invalid {name} entry '{entry}': {error}"))
                })?;
                Ok((subject.trim().to_owned(), Some(role)))
            }
            None => Ok((entry.to_owned(), None)),
        })
        .collect()
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    non_empty_env(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
