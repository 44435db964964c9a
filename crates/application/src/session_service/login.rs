use retrofit_domain::LoginCredentials;

use super::*;
use crate::AuthGrant;
use crate::identity_store::InstallTicket;

impl SessionService {
    /// Authenticates with a phone number and verification code.
    ///
    /// Profile fields in `credentials` override the backend account record.
    /// Returns `Superseded` when a logout happened while the backend call was
    /// in flight.
    pub async fn login(&self, credentials: LoginCredentials) -> AppResult<Identity> {
        let ticket = self.inner.identity_store.begin_login();
        let result = self.inner.backend.authenticate(&credentials).await;

        let grant = match result {
            Ok(grant) => grant,
            Err(error) => {
                self.inner.identity_store.abort_login(ticket);
                warn!(error = %error, "login rejected");
                self.record_event(None, "login", "rejected");
                return Err(authentication_failure(error));
            }
        };

        let LoginCredentials {
            phone_number,
            profile,
            ..
        } = credentials;
        self.establish(ticket, grant, Some(phone_number.as_str()), profile, "login")
    }

    /// Exchanges a third-party authorization code for a session.
    pub async fn login_with_delegated_credential(&self, code: &str) -> AppResult<Identity> {
        let ticket = self.inner.identity_store.begin_login();
        let result = self.inner.backend.exchange_delegated_code(code).await;

        let grant = match result {
            Ok(grant) => grant,
            Err(error) => {
                self.inner.identity_store.abort_login(ticket);
                warn!(error = %error, "delegated login rejected");
                self.record_event(None, "delegated_login", "rejected");
                return Err(authentication_failure(error));
            }
        };

        self.establish(ticket, grant, None, ProfileFields::default(), "delegated_login")
    }

    fn establish(
        &self,
        ticket: InstallTicket,
        grant: AuthGrant,
        phone_number: Option<&str>,
        profile: ProfileFields,
        event_type: &str,
    ) -> AppResult<Identity> {
        let now = Utc::now();
        let AuthGrant {
            account,
            access_token,
            refresh_token,
            expires_in_seconds,
        } = grant;

        let session = match Session::issue(access_token, refresh_token, expires_in_seconds, now) {
            Ok(session) => session,
            Err(error) => {
                self.inner.identity_store.abort_login(ticket);
                warn!(error = %error, "backend issued an unusable session");
                return Err(AppError::AuthenticationFailure(format!(
                    "backend issued an unusable session: {error}"
                )));
            }
        };
        let identity = Identity::establish(account, phone_number, profile, now);

        let storage = &self.inner.storage;
        let generation = match self.inner.identity_store.install(
            ticket,
            identity.clone(),
            session,
            |identity, session| persist_session(storage.as_ref(), identity, session),
        ) {
            Ok(generation) => generation,
            Err(error) => {
                warn!(account_id = %identity.id(), error = %error, "session was not installed");
                self.record_event(Some(identity.id()), event_type, "discarded");
                return Err(error);
            }
        };

        info!(account_id = %identity.id(), generation, "session established");
        self.record_event(Some(identity.id()), event_type, "success");
        self.notify_signed_in(generation, &identity);
        self.start_refresh_schedule(generation);

        Ok(identity)
    }
}

fn authentication_failure(error: AppError) -> AppError {
    match error {
        AppError::AuthenticationFailure(_) | AppError::Internal(_) => error,
        other => AppError::AuthenticationFailure(other.to_string()),
    }
}
