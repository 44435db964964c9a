//! Single source of truth for the current identity and session.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use retrofit_core::{AppError, AppResult};
use retrofit_domain::{Identity, ProfileFields, Session};

/// Lifecycle phase of the session state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No identity.
    #[default]
    Unauthenticated,
    /// Reading a persisted session at startup.
    Restoring,
    /// A login is awaiting the backend.
    Authenticating,
    /// An identity and session are installed.
    Authenticated,
    /// A refresh is awaiting the backend.
    Refreshing,
}

impl SessionPhase {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Restoring => "restoring",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
        }
    }
}

/// Point-in-time copy of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    /// Current identity.
    pub identity: Option<Identity>,
    /// Current session.
    pub session: Option<Session>,
    /// Current phase.
    pub phase: SessionPhase,
    /// Whether startup restore is running.
    pub loading: bool,
    /// Session generation.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct IdentityState {
    identity: Option<Identity>,
    session: Option<Session>,
    phase: SessionPhase,
    loading: bool,
    generation: u64,
    logout_epoch: u64,
}

impl IdentityState {
    fn settled_phase(&self) -> SessionPhase {
        if self.identity.is_some() && self.session.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        }
    }
}

/// Logout epoch captured when an identity-installing operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InstallTicket {
    logout_epoch: u64,
}

/// Generation and token captured when a refresh starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefreshTicket {
    pub(crate) generation: u64,
    pub(crate) refresh_token: String,
}

/// Holds the base identity, its session and the lifecycle flags.
///
/// Readable by anyone; written only by the session service. Every write runs
/// under one short lock, never across an `.await`.
#[derive(Debug, Default)]
pub struct IdentityStore {
    state: Mutex<IdentityState>,
}

impl IdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current identity.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Returns the current session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Returns whether both an identity and a session are installed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let state = self.lock();
        state.identity.is_some() && state.session.is_some()
    }

    /// Returns whether startup restore is running.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// Returns whether `account_id` is the installed identity.
    #[must_use]
    pub fn is_signed_in_as(&self, account_id: &str) -> bool {
        self.lock()
            .identity
            .as_ref()
            .is_some_and(|identity| identity.id() == account_id)
    }

    /// Returns the session generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Returns a consistent copy of the whole store.
    #[must_use]
    pub fn snapshot(&self) -> IdentitySnapshot {
        let state = self.lock();
        IdentitySnapshot {
            identity: state.identity.clone(),
            session: state.session.clone(),
            phase: state.phase,
            loading: state.loading,
            generation: state.generation,
        }
    }

    pub(crate) fn begin_restore(&self) -> InstallTicket {
        let mut state = self.lock();
        state.loading = true;
        if state.identity.is_none() {
            state.phase = SessionPhase::Restoring;
        }
        InstallTicket {
            logout_epoch: state.logout_epoch,
        }
    }

    pub(crate) fn finish_restore(&self) {
        let mut state = self.lock();
        state.loading = false;
        if state.phase == SessionPhase::Restoring {
            state.phase = state.settled_phase();
        }
    }

    pub(crate) fn begin_login(&self) -> InstallTicket {
        let mut state = self.lock();
        state.phase = SessionPhase::Authenticating;
        InstallTicket {
            logout_epoch: state.logout_epoch,
        }
    }

    pub(crate) fn abort_login(&self, ticket: InstallTicket) {
        let mut state = self.lock();
        if state.logout_epoch == ticket.logout_epoch && state.phase == SessionPhase::Authenticating {
            state.phase = state.settled_phase();
        }
    }

    /// Installs a new identity and session unless a logout happened since
    /// `ticket` was taken. `persist` runs under the lock before the swap;
    /// its failure leaves the store untouched. Returns the new generation.
    pub(crate) fn install<F>(
        &self,
        ticket: InstallTicket,
        identity: Identity,
        session: Session,
        persist: F,
    ) -> AppResult<u64>
    where
        F: FnOnce(&Identity, &Session) -> AppResult<()>,
    {
        let mut state = self.lock();
        if state.logout_epoch != ticket.logout_epoch {
            return Err(AppError::Superseded(
                "a logout happened while the session was being established".to_owned(),
            ));
        }

        if let Err(error) = persist(&identity, &session) {
            if state.phase == SessionPhase::Authenticating {
                state.phase = state.settled_phase();
            }
            return Err(error);
        }

        state.generation = state.generation.wrapping_add(1);
        state.identity = Some(identity);
        state.session = Some(session);
        state.phase = SessionPhase::Authenticated;
        Ok(state.generation)
    }

    pub(crate) fn begin_refresh(&self) -> AppResult<RefreshTicket> {
        let mut state = self.lock();
        let Some(session) = &state.session else {
            return Err(AppError::NoRefreshToken);
        };

        let ticket = RefreshTicket {
            generation: state.generation,
            refresh_token: session.refresh_token().to_owned(),
        };
        state.phase = SessionPhase::Refreshing;
        Ok(ticket)
    }

    /// Applies a renewal computed by `renew` if the session generation is
    /// still the one captured in `ticket`. Returns `None` for stale results.
    pub(crate) fn complete_refresh<F>(
        &self,
        ticket: &RefreshTicket,
        renew: F,
    ) -> AppResult<Option<Session>>
    where
        F: FnOnce(&Session) -> AppResult<Session>,
    {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            return Ok(None);
        }
        let Some(current) = &state.session else {
            return Ok(None);
        };

        let renewed = renew(current)?;
        state.session = Some(renewed.clone());
        state.phase = SessionPhase::Authenticated;
        Ok(Some(renewed))
    }

    pub(crate) fn update_identity<F>(
        &self,
        patch: ProfileFields,
        now: DateTime<Utc>,
        persist: F,
    ) -> AppResult<(Identity, u64)>
    where
        F: FnOnce(&Identity) -> AppResult<()>,
    {
        let mut state = self.lock();
        let Some(current) = &state.identity else {
            return Err(AppError::NotAuthenticated(
                "profile update requires a signed-in identity".to_owned(),
            ));
        };

        let mut updated = current.clone();
        updated.apply_update(patch, now);
        persist(&updated)?;

        state.identity = Some(updated.clone());
        Ok((updated, state.generation))
    }

    /// Drops identity and session. `purge` runs under the lock. Returns
    /// whether an identity was present and the new generation.
    pub(crate) fn clear<F>(&self, purge: F) -> (bool, u64)
    where
        F: FnOnce(),
    {
        let mut state = self.lock();
        Self::clear_locked(&mut state, purge)
    }

    /// Like [`IdentityStore::clear`], but only while the session generation
    /// is still `generation`.
    pub(crate) fn clear_if_current<F>(&self, generation: u64, purge: F) -> Option<(bool, u64)>
    where
        F: FnOnce(),
    {
        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        Some(Self::clear_locked(&mut state, purge))
    }

    fn clear_locked<F>(state: &mut IdentityState, purge: F) -> (bool, u64)
    where
        F: FnOnce(),
    {
        let was_present = state.identity.is_some();

        purge();
        state.identity = None;
        state.session = None;
        state.phase = SessionPhase::Unauthenticated;
        state.generation = state.generation.wrapping_add(1);
        state.logout_epoch = state.logout_epoch.wrapping_add(1);
        (was_present, state.generation)
    }

    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        lock_unpoisoned(&self.state)
    }
}

/// Locks `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use retrofit_core::AppError;
    use retrofit_domain::{AccountRecord, Identity, ProfileFields, Session};

    use super::{IdentityStore, SessionPhase};

    fn identity() -> Identity {
        Identity::establish(
            AccountRecord::new("acct_1", "13800001111"),
            None,
            ProfileFields::default(),
            Utc::now(),
        )
    }

    fn session() -> Session {
        match Session::issue("access", "refresh", 3600, Utc::now()) {
            Ok(session) => session,
            Err(error) => panic!("session should issue: {error}"),
        }
    }

    #[test]
    fn install_is_rejected_after_intervening_logout() {
        let store = IdentityStore::new();
        let ticket = store.begin_login();
        store.clear(|| {});

        let result = store.install(ticket, identity(), session(), |_, _| Ok(()));

        assert!(matches!(result, Err(AppError::Superseded(_))));
        assert!(!store.is_authenticated());
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
    }

    #[test]
    fn failed_persist_leaves_store_empty() {
        let store = IdentityStore::new();
        let ticket = store.begin_login();

        let result = store.install(ticket, identity(), session(), |_, _| {
            Err(AppError::Internal("disk full".to_owned()))
        });

        assert!(result.is_err());
        assert!(!store.is_authenticated());
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
    }

    #[test]
    fn stale_refresh_is_not_applied() {
        let store = IdentityStore::new();
        let ticket = store.begin_login();
        assert!(
            store
                .install(ticket, identity(), session(), |_, _| Ok(()))
                .is_ok()
        );

        let refresh = match store.begin_refresh() {
            Ok(refresh) => refresh,
            Err(error) => panic!("refresh should begin: {error}"),
        };
        store.clear(|| {});

        let applied = store.complete_refresh(&refresh, |current| Ok(current.clone()));
        assert!(matches!(applied, Ok(None)));
        assert!(store.current_session().is_none());
    }

    #[test]
    fn conditional_clear_ignores_newer_generation() {
        let store = IdentityStore::new();
        let ticket = store.begin_login();
        let Ok(generation) = store.install(ticket, identity(), session(), |_, _| Ok(())) else {
            panic!("install should succeed");
        };

        assert!(store.clear_if_current(generation + 1, || {}).is_none());
        assert!(store.is_authenticated());

        let cleared = store.clear_if_current(generation, || {});
        assert_eq!(cleared, Some((true, generation + 1)));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn begin_refresh_without_session_fails() {
        let store = IdentityStore::new();
        assert!(matches!(
            store.begin_refresh(),
            Err(AppError::NoRefreshToken)
        ));
    }

    #[test]
    fn update_requires_identity() {
        let store = IdentityStore::new();
        let result = store.update_identity(ProfileFields::default(), Utc::now(), |_| Ok(()));
        assert!(matches!(result, Err(AppError::NotAuthenticated(_))));
    }

    #[test]
    fn restore_toggles_loading_flag() {
        let store = IdentityStore::new();
        store.begin_restore();
        assert!(store.is_loading());
        assert_eq!(store.phase(), SessionPhase::Restoring);

        store.finish_restore();
        assert!(!store.is_loading());
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
    }
}
