//! Session lifecycle: login, logout, restore, profile updates and refresh.
//!
//! `SessionService` is the only writer of the identity store. Every change of
//! the base identity is announced to subscribed observers as an
//! [`IdentityChanged`] event, guards first.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use retrofit_core::{AppError, AppResult};
use retrofit_domain::{
    AUTH_TOKEN_KEY, Identity, ProfileFields, REFRESH_TOKEN_KEY, SESSION_STORAGE_KEYS,
    SIGNED_IN_STORAGE_KEYS, Session, TOKEN_EXPIRES_AT_KEY, USER_DATA_KEY, VerificationPurpose,
};

use crate::identity_events::{IdentityChange, IdentityChanged, ObserverRegistry};
use crate::identity_store::{IdentitySnapshot, SessionPhase, lock_unpoisoned};
use crate::{
    AuthBackend, AuthEvent, AuthEventService, IdentityObserver, IdentityStore, KeyValueStore,
    SubscriptionId,
};

mod config;
mod login;
mod refresh;
mod restore;

pub use config::{DEFAULT_REFRESH_CHECK_INTERVAL, DEFAULT_REFRESH_THRESHOLD, SessionConfig};

/// Session lifecycle manager.
///
/// Cheap to clone; clones share one identity store and one refresh schedule.
/// The schedule is cancelled on logout, on [`SessionService::dispose`] and
/// when the last clone is dropped.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<SessionCore>,
}

struct SessionCore {
    backend: Arc<dyn AuthBackend>,
    storage: Arc<dyn KeyValueStore>,
    identity_store: Arc<IdentityStore>,
    observers: ObserverRegistry,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    refresh_flight: tokio::sync::Mutex<()>,
    auth_events: AuthEventService,
    config: SessionConfig,
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if let Some(task) = lock_unpoisoned(&self.refresh_task).take() {
            task.abort();
        }
    }
}

impl SessionService {
    /// Creates a session service with an empty identity store.
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        storage: Arc<dyn KeyValueStore>,
        auth_events: AuthEventService,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SessionCore {
                backend,
                storage,
                identity_store: Arc::new(IdentityStore::new()),
                observers: ObserverRegistry::default(),
                refresh_task: Mutex::new(None),
                refresh_flight: tokio::sync::Mutex::new(()),
                auth_events,
                config,
            }),
        }
    }

    /// Returns a read handle on the identity store.
    #[must_use]
    pub fn identity_store(&self) -> Arc<IdentityStore> {
        Arc::clone(&self.inner.identity_store)
    }

    /// Returns the persistence adapter shared with dependent services.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.inner.storage)
    }

    /// Returns the scheduling configuration.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.inner.config
    }

    /// Returns whether an identity and session are installed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.identity_store.is_authenticated()
    }

    /// Returns whether startup restore is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.identity_store.is_loading()
    }

    /// Returns the current identity.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.identity_store.current_identity()
    }

    /// Returns the current session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.inner.identity_store.current_session()
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.identity_store.phase()
    }

    /// Returns a consistent copy of the identity store.
    #[must_use]
    pub fn snapshot(&self) -> IdentitySnapshot {
        self.inner.identity_store.snapshot()
    }

    /// Subscribes an observer notified after every guard.
    pub fn subscribe(&self, observer: Arc<dyn IdentityObserver>) -> SubscriptionId {
        self.inner.observers.subscribe(observer)
    }

    /// Subscribes an observer that must see each change before ordinary observers.
    pub fn subscribe_guard(&self, observer: Arc<dyn IdentityObserver>) -> SubscriptionId {
        self.inner.observers.subscribe_guard(observer)
    }

    /// Removes a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Asks the backend to send a verification code. Leaves the store untouched.
    pub async fn send_verification_code(
        &self,
        phone_number: &str,
        purpose: VerificationPurpose,
    ) -> AppResult<()> {
        let result = self
            .inner
            .backend
            .dispatch_verification_code(phone_number, purpose)
            .await;

        match result {
            Ok(()) => {
                self.record_event(None, "verification_code", purpose.as_str());
                Ok(())
            }
            Err(error) => {
                warn!(purpose = purpose.as_str(), error = %error, "verification code dispatch failed");
                self.record_event(None, "verification_code", "rejected");
                Err(match error {
                    AppError::VerificationCodeFailure(_) => error,
                    other => AppError::VerificationCodeFailure(other.to_string()),
                })
            }
        }
    }

    /// Clears identity, session and every persisted key, admin keys included,
    /// whether or not admin mode is attached.
    ///
    /// Idempotent. Cancels the refresh schedule and notifies observers even
    /// when nobody was signed in, so dependent state is always torn down.
    pub fn logout(&self) {
        let storage = &self.inner.storage;
        let cleared = self
            .inner
            .identity_store
            .clear(|| purge_keys(storage.as_ref(), &SIGNED_IN_STORAGE_KEYS));
        self.finish_logout(cleared);
    }

    /// Logs out only if the session generation is still `generation`.
    fn logout_if_current(&self, generation: u64) -> bool {
        let storage = &self.inner.storage;
        let cleared = self
            .inner
            .identity_store
            .clear_if_current(generation, || {
                purge_keys(storage.as_ref(), &SIGNED_IN_STORAGE_KEYS)
            });

        match cleared {
            Some(cleared) => {
                self.finish_logout(cleared);
                true
            }
            None => false,
        }
    }

    fn finish_logout(&self, (was_present, generation): (bool, u64)) {
        self.cancel_refresh_schedule();
        self.inner.observers.notify(&IdentityChanged {
            generation,
            change: IdentityChange::SignedOut,
        });

        if was_present {
            info!(generation, "session ended");
            self.record_event(None, "logout", "success");
        }
    }

    /// Merges profile fields into the current identity and persists it.
    pub fn update_identity(&self, patch: ProfileFields) -> AppResult<Identity> {
        let storage = &self.inner.storage;
        let (identity, generation) =
            self.inner
                .identity_store
                .update_identity(patch, Utc::now(), |identity| {
                    storage.set(USER_DATA_KEY, &serialize_identity(identity)?)
                })?;

        self.inner.observers.notify(&IdentityChanged {
            generation,
            change: IdentityChange::Updated(identity.clone()),
        });
        info!(account_id = %identity.id(), "identity updated");

        Ok(identity)
    }

    /// Stops background work and drops every observer. The persisted session
    /// is kept for the next process.
    pub fn dispose(&self) {
        self.cancel_refresh_schedule();
        self.inner.observers.clear();
    }

    fn notify_signed_in(&self, generation: u64, identity: &Identity) {
        self.inner.observers.notify(&IdentityChanged {
            generation,
            change: IdentityChange::SignedIn(identity.clone()),
        });
    }

    fn record_event(&self, subject: Option<&str>, event_type: &str, outcome: &str) {
        self.inner
            .auth_events
            .record_event(AuthEvent::new(subject, event_type, outcome));
    }
}

fn serialize_identity(identity: &Identity) -> AppResult<String> {
    serde_json::to_string(identity)
        .map_err(|error| AppError::Internal(format!("failed to serialize identity: {error}")))
}

/// Writes the four session keys; on failure removes whatever was written.
fn persist_session(
    storage: &dyn KeyValueStore,
    identity: &Identity,
    session: &Session,
) -> AppResult<()> {
    let result = serialize_identity(identity).and_then(|user_data| {
        storage.set(USER_DATA_KEY, &user_data)?;
        persist_tokens(storage, session)
    });

    if result.is_err() {
        purge_keys(storage, &SESSION_STORAGE_KEYS);
    }
    result
}

fn persist_tokens(storage: &dyn KeyValueStore, session: &Session) -> AppResult<()> {
    storage.set(AUTH_TOKEN_KEY, session.access_token())?;
    storage.set(REFRESH_TOKEN_KEY, session.refresh_token())?;
    storage.set(
        TOKEN_EXPIRES_AT_KEY,
        &session.expires_at_millis().to_string(),
    )
}

pub(crate) fn purge_keys(storage: &dyn KeyValueStore, keys: &[&str]) {
    for key in keys {
        if let Err(error) = storage.remove(key) {
            warn!(key = %key, error = %error, "failed to remove persisted key");
        }
    }
}
