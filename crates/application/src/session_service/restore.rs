use tracing::debug;

use super::*;

/// Clears the loading flag however `initialize` exits.
struct LoadingGuard<'a>(&'a IdentityStore);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_restore();
    }
}

impl SessionService {
    /// Restores the persisted session at startup.
    ///
    /// Never fails: a missing, partial or unreadable record is purged and
    /// leaves the service signed out without contacting the backend. A
    /// restored session close to expiry is refreshed before returning.
    pub async fn initialize(&self) -> Option<Identity> {
        let store = &self.inner.identity_store;
        let ticket = store.begin_restore();
        let _loading = LoadingGuard(store);

        if let Some(identity) = store.current_identity() {
            return Some(identity);
        }

        let now = Utc::now();
        let (identity, session) = match self.read_persisted_session(now) {
            Ok(Some(restored)) => restored,
            Ok(None) => {
                purge_keys(self.inner.storage.as_ref(), &SIGNED_IN_STORAGE_KEYS);
                debug!("no persisted session to restore");
                return None;
            }
            Err(error) => {
                purge_keys(self.inner.storage.as_ref(), &SIGNED_IN_STORAGE_KEYS);
                warn!(error = %error, "discarded unreadable persisted session");
                return None;
            }
        };

        let needs_refresh = session.needs_refresh(now, self.inner.config.refresh_threshold_chrono());
        let generation = match store.install(ticket, identity.clone(), session, |_, _| Ok(())) {
            Ok(generation) => generation,
            Err(error) => {
                warn!(error = %error, "restored session was not installed");
                return None;
            }
        };

        info!(account_id = %identity.id(), generation, "session restored");
        self.record_event(Some(identity.id()), "restore", "success");
        self.notify_signed_in(generation, &identity);
        self.start_refresh_schedule(generation);

        if needs_refresh && let Err(error) = self.refresh().await {
            warn!(error = %error, "restored session could not be refreshed");
        }

        self.current_identity()
    }

    /// Reads the four session keys. `Ok(None)` when any of them is absent.
    fn read_persisted_session(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<Option<(Identity, Session)>> {
        let storage = &self.inner.storage;
        let (Some(access_token), Some(refresh_token), Some(user_data), Some(expires_at)) = (
            storage.get(AUTH_TOKEN_KEY)?,
            storage.get(REFRESH_TOKEN_KEY)?,
            storage.get(USER_DATA_KEY)?,
            storage.get(TOKEN_EXPIRES_AT_KEY)?,
        ) else {
            return Ok(None);
        };

        let identity: Identity = serde_json::from_str(&user_data).map_err(|error| {
            AppError::PersistenceCorruption(format!("stored identity is not valid: {error}"))
        })?;
        let expires_at_millis = expires_at.trim().parse::<i64>().map_err(|error| {
            AppError::PersistenceCorruption(format!(
                "stored token expiry '{expires_at}' is not valid: {error}"
            ))
        })?;
        let session = Session::restore(access_token, refresh_token, expires_at_millis, now)
            .map_err(|error| match error {
                AppError::PersistenceCorruption(_) => error,
                other => AppError::PersistenceCorruption(other.to_string()),
            })?;

        Ok(Some((identity, session)))
    }
}
