//! Retrofit session agent: keeps a signed-in session alive from the terminal.

#![forbid(unsafe_code)]

mod agent_config;

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use retrofit_application::{
    AdminModeService, AuthBackend, AuthEventService, KeyValueStore, SessionService,
};
use retrofit_core::{AppError, AppResult};
use retrofit_domain::{LoginCredentials, VerificationPurpose};
use retrofit_infrastructure::{
    ConsoleAuthBackend, FileKeyValueStore, HttpAuthBackend, TracingAuthEventSink,
};
use tracing::{info, warn};

use crate::agent_config::{AgentConfig, AuthBackendConfig, init_tracing};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AgentCommand {
    Status,
    SendCode {
        phone_number: String,
        purpose: VerificationPurpose,
    },
    Login {
        phone_number: String,
        verification_code: String,
    },
    Admin,
    Logout,
    Run,
}

impl AgentCommand {
    fn parse<I>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match args.as_slice() {
            [] | ["status"] => Ok(Self::Status),
            ["send-code", phone_number] => Ok(Self::SendCode {
                phone_number: (*phone_number).to_owned(),
                purpose: VerificationPurpose::Login,
            }),
            ["send-code", phone_number, purpose] => Ok(Self::SendCode {
                phone_number: (*phone_number).to_owned(),
                purpose: VerificationPurpose::from_str(purpose)?,
            }),
            ["login", phone_number, verification_code] => Ok(Self::Login {
                phone_number: (*phone_number).to_owned(),
                verification_code: (*verification_code).to_owned(),
            }),
            ["admin"] => Ok(Self::Admin),
            ["logout"] => Ok(Self::Logout),
            ["run"] => Ok(Self::Run),
            _ => Err(AppError::Validation(format!(
                "usage: retrofit-agent [status | send-code <phone> [purpose] | login <phone> <code> | admin | logout | run], got '{}'",
                args.join(" ")
            ))),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = AgentCommand::parse(env::args().skip(1))?;
    let config = AgentConfig::load()?;

    let sessions = build_session_service(&config)?;
    let admin = AdminModeService::new(
        &sessions,
        Arc::new(config.elevation_rules.clone()),
        Arc::new(config.role_mapping.clone()),
    )
    .with_client_address(config.client_address.clone());
    admin.attach(&sessions);

    if let Some(identity) = sessions.initialize().await {
        info!(account_id = %identity.id(), "restored persisted session");
    }

    let result = execute(command, &sessions, &admin).await;
    sessions.dispose();
    result
}

async fn execute(
    command: AgentCommand,
    sessions: &SessionService,
    admin: &AdminModeService,
) -> AppResult<()> {
    match command {
        AgentCommand::Status => {
            print_status(sessions, admin);
            Ok(())
        }
        AgentCommand::SendCode {
            phone_number,
            purpose,
        } => {
            sessions
                .send_verification_code(phone_number.as_str(), purpose)
                .await?;
            println!("verification code sent to {phone_number}");
            Ok(())
        }
        AgentCommand::Login {
            phone_number,
            verification_code,
        } => {
            let identity = sessions
                .login(LoginCredentials::new(phone_number, verification_code))
                .await?;
            println!("signed in as {} ({})", identity.display_name(), identity.id());
            print_status(sessions, admin);
            Ok(())
        }
        AgentCommand::Admin => {
            let elevated = admin.switch_to_admin()?;
            let permissions: Vec<&str> = elevated
                .permissions()
                .iter()
                .map(|permission| permission.as_str())
                .collect();
            println!(
                "admin mode: {} [{}]",
                elevated.admin_role().as_str(),
                permissions.join(", ")
            );
            Ok(())
        }
        AgentCommand::Logout => {
            sessions.logout();
            println!("signed out");
            Ok(())
        }
        AgentCommand::Run => run_until_shutdown(sessions).await,
    }
}

async fn run_until_shutdown(sessions: &SessionService) -> AppResult<()> {
    if !sessions.is_authenticated() {
        return Err(AppError::NotAuthenticated(
            "no session to keep alive; run 'login' first".to_owned(),
        ));
    }

    let config = sessions.config();
    info!(
        refresh_check_interval_seconds = config.refresh_check_interval().as_secs(),
        refresh_threshold_seconds = config.refresh_threshold().as_secs(),
        "retrofit-agent keeping session alive"
    );

    match sessions.check_session_expiry().await {
        Ok(true) => info!("session refreshed on startup"),
        Ok(false) => {}
        Err(error) => warn!(error = %error, "startup refresh failed"),
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| AppError::Internal(format!("failed to listen for ctrl-c: {error}")))?;
    info!("shutdown requested");
    Ok(())
}

fn print_status(sessions: &SessionService, admin: &AdminModeService) {
    let snapshot = sessions.snapshot();
    let Some(identity) = snapshot.identity else {
        println!("status: {}", snapshot.phase.as_str());
        return;
    };

    println!(
        "status: {} as {} ({}, {})",
        snapshot.phase.as_str(),
        identity.display_name(),
        identity.id(),
        identity.phone_number()
    );
    if let Some(session) = snapshot.session {
        println!("session expires at {}", session.expires_at());
    }
    match admin.current_admin() {
        Some(elevated) => println!(
            "admin: {} (login #{})",
            elevated.admin_role().as_str(),
            elevated.login_count()
        ),
        None => println!("admin: no"),
    }
}

fn build_session_service(config: &AgentConfig) -> AppResult<SessionService> {
    let backend: Arc<dyn AuthBackend> = match &config.auth_backend {
        AuthBackendConfig::Console { verification_code } => {
            Arc::new(ConsoleAuthBackend::new(verification_code.clone()))
        }
        AuthBackendConfig::Http { base_url, timeout } => {
            let http_client = reqwest::Client::builder()
                .timeout(*timeout)
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            Arc::new(HttpAuthBackend::new(http_client, base_url.clone()))
        }
    };
    let storage: Arc<dyn KeyValueStore> =
        Arc::new(FileKeyValueStore::new(config.session_store_path.clone()));

    Ok(SessionService::new(
        backend,
        storage,
        AuthEventService::new(Arc::new(TracingAuthEventSink::new()))
            .with_ip_address(config.client_address.clone()),
        config.session,
    ))
}
