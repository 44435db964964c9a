//! Admin mode: elevation of the base identity and permission queries.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use retrofit_core::{AppError, AppResult};
use retrofit_domain::{
    ADMIN_DATA_KEY, ADMIN_MODE_KEY, ADMIN_STORAGE_KEYS, AdminIdentity, AdminRole, Identity,
    Permission, RoleMapping,
};

use crate::identity_events::{IdentityChange, IdentityChanged};
use crate::identity_store::lock_unpoisoned;
use crate::session_service::purge_keys;
use crate::{
    ElevationPolicy, IdentityObserver, IdentityStore, KeyValueStore, SessionService,
    SubscriptionId,
};

/// Value written under `admin_mode` while elevated.
const ADMIN_MODE_ENABLED: &str = "true";

#[derive(Debug, Default)]
struct AdminState {
    admin: Option<AdminIdentity>,
    generation: u64,
}

/// Layers an elevated identity on top of the base session.
///
/// Observes the session service as a guard: elevation is evaluated on every
/// sign-in and torn down on sign-out before ordinary observers run.
#[derive(Clone)]
pub struct AdminModeService {
    identity_store: Arc<IdentityStore>,
    storage: Arc<dyn KeyValueStore>,
    policy: Arc<dyn ElevationPolicy>,
    role_mapping: Arc<RoleMapping>,
    state: Arc<Mutex<AdminState>>,
    client_address: Option<String>,
}

impl AdminModeService {
    /// Creates an admin mode service sharing the session's store and storage.
    #[must_use]
    pub fn new(
        sessions: &SessionService,
        policy: Arc<dyn ElevationPolicy>,
        role_mapping: Arc<RoleMapping>,
    ) -> Self {
        Self {
            identity_store: sessions.identity_store(),
            storage: sessions.storage(),
            policy,
            role_mapping,
            state: Arc::new(Mutex::new(AdminState::default())),
            client_address: None,
        }
    }

    /// Records `client_address` as the last login address of elevations.
    #[must_use]
    pub fn with_client_address(mut self, client_address: Option<String>) -> Self {
        self.client_address = client_address;
        self
    }

    /// Subscribes to `sessions` as a guard observer and evaluates the
    /// identity that is already signed in, if any.
    pub fn attach(&self, sessions: &SessionService) -> SubscriptionId {
        let subscription = sessions.subscribe_guard(Arc::new(self.clone()));

        let snapshot = self.identity_store.snapshot();
        if let Some(identity) = snapshot.identity {
            self.on_identity_changed(&IdentityChanged {
                generation: snapshot.generation,
                change: IdentityChange::SignedIn(identity),
            });
        }
        subscription
    }

    /// Returns the elevated identity `identity` would receive, if eligible.
    #[must_use]
    pub fn evaluate(&self, identity: &Identity) -> Option<AdminIdentity> {
        let grant = self.policy.evaluate(identity)?;
        Some(
            AdminIdentity::elevate(identity.clone(), grant, &self.role_mapping, Utc::now())
                .with_last_login_ip(self.client_address.clone()),
        )
    }

    /// Elevates the signed-in identity.
    pub fn switch_to_admin(&self) -> AppResult<AdminIdentity> {
        let mut state = lock_unpoisoned(&self.state);
        let snapshot = self.identity_store.snapshot();
        let Some(identity) = snapshot.identity else {
            return Err(AppError::NotAuthenticated(
                "admin mode requires a signed-in identity".to_owned(),
            ));
        };
        state.generation = state.generation.max(snapshot.generation);

        if let Some(admin) = &state.admin
            && admin.identity().id() == identity.id()
        {
            return Ok(admin.clone());
        }

        let Some(admin) = self.evaluate(&identity) else {
            warn!(account_id = %identity.id(), "admin mode denied");
            return Err(AppError::PermissionDenied(format!(
                "account '{}' is not eligible for admin mode",
                identity.id()
            )));
        };

        let admin = self.continue_login_count(admin, state.admin.as_ref());
        if let Err(error) = self.persist(&admin) {
            purge_keys(self.storage.as_ref(), &ADMIN_STORAGE_KEYS);
            return Err(error);
        }

        info!(
            account_id = %identity.id(),
            admin_role = admin.admin_role().as_str(),
            login_count = admin.login_count(),
            "admin mode entered"
        );
        state.admin = Some(admin.clone());
        Ok(admin)
    }

    /// Leaves admin mode. The base session is untouched.
    pub fn exit_admin(&self) {
        let mut state = lock_unpoisoned(&self.state);
        let previous = state.admin.take();
        purge_keys(self.storage.as_ref(), &ADMIN_STORAGE_KEYS);

        if let Some(admin) = previous {
            info!(account_id = %admin.identity().id(), "admin mode exited");
        }
    }

    /// Returns whether an elevated identity is installed.
    ///
    /// Queries only report an elevation whose account is still the signed-in
    /// identity, so they turn false as soon as the store is cleared, before
    /// the sign-out notification reaches this service.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.active(&lock_unpoisoned(&self.state)).is_some()
    }

    /// Returns the elevated identity.
    #[must_use]
    pub fn current_admin(&self) -> Option<AdminIdentity> {
        self.active(&lock_unpoisoned(&self.state)).cloned()
    }

    /// Returns the permissions of the elevated identity; empty when not elevated.
    #[must_use]
    pub fn permissions(&self) -> BTreeSet<Permission> {
        self.active(&lock_unpoisoned(&self.state))
            .map(|admin| admin.permissions().clone())
            .unwrap_or_default()
    }

    /// Returns whether the elevated identity holds `permission`.
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.active(&lock_unpoisoned(&self.state))
            .is_some_and(|admin| admin.has_permission(permission))
    }

    /// Like [`AdminModeService::has_permission`] for a dotted token such as
    /// `user.manage`. Unknown tokens are never granted.
    #[must_use]
    pub fn has_permission_token(&self, token: &str) -> bool {
        Permission::from_str(token).is_ok_and(|permission| self.has_permission(permission))
    }

    /// Returns whether the elevated identity holds any of `permissions`.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[Permission]) -> bool {
        self.active(&lock_unpoisoned(&self.state))
            .is_some_and(|admin| admin.has_any_permission(permissions))
    }

    /// Returns whether the elevated identity has `role`.
    #[must_use]
    pub fn has_role(&self, role: AdminRole) -> bool {
        self.active(&lock_unpoisoned(&self.state))
            .is_some_and(|admin| admin.has_role(role))
    }

    fn active<'a>(&self, state: &'a AdminState) -> Option<&'a AdminIdentity> {
        state
            .admin
            .as_ref()
            .filter(|admin| self.identity_store.is_signed_in_as(admin.identity().id()))
    }

    fn continue_login_count(
        &self,
        admin: AdminIdentity,
        previous: Option<&AdminIdentity>,
    ) -> AdminIdentity {
        if let Some(previous) = previous {
            return admin.continuing(previous);
        }

        match self.persisted_admin() {
            Some(previous) => admin.continuing(&previous),
            None => admin,
        }
    }

    fn persisted_admin(&self) -> Option<AdminIdentity> {
        let raw = match self.storage.get(ADMIN_DATA_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(error = %error, "failed to read persisted admin data");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(admin) => Some(admin),
            Err(error) => {
                debug!(error = %error, "ignoring unreadable persisted admin data");
                None
            }
        }
    }

    fn persist(&self, admin: &AdminIdentity) -> AppResult<()> {
        let admin_data = serde_json::to_string(admin).map_err(|error| {
            AppError::Internal(format!("failed to serialize admin identity: {error}"))
        })?;
        self.storage.set(ADMIN_MODE_KEY, ADMIN_MODE_ENABLED)?;
        self.storage.set(ADMIN_DATA_KEY, &admin_data)
    }

    fn handle_signed_in(&self, state: &mut AdminState, identity: &Identity) {
        let previous = state.admin.take();
        let Some(admin) = self.evaluate(identity) else {
            purge_keys(self.storage.as_ref(), &ADMIN_STORAGE_KEYS);
            return;
        };

        let admin = self.continue_login_count(admin, previous.as_ref());
        if let Err(error) = self.persist(&admin) {
            warn!(account_id = %identity.id(), error = %error, "automatic elevation not persisted");
            purge_keys(self.storage.as_ref(), &ADMIN_STORAGE_KEYS);
            return;
        }

        info!(
            account_id = %identity.id(),
            admin_role = admin.admin_role().as_str(),
            login_count = admin.login_count(),
            "admin mode entered automatically"
        );
        state.admin = Some(admin);
    }

    fn handle_updated(&self, state: &mut AdminState, identity: &Identity) {
        let Some(admin) = state.admin.take() else {
            return;
        };

        let admin = admin.with_identity(identity.clone());
        if let Err(error) = self.persist(&admin) {
            warn!(account_id = %identity.id(), error = %error, "failed to persist admin identity");
        }
        state.admin = Some(admin);
    }
}

impl IdentityObserver for AdminModeService {
    fn on_identity_changed(&self, event: &IdentityChanged) {
        let mut state = lock_unpoisoned(&self.state);
        if event.generation < state.generation {
            debug!(
                generation = event.generation,
                current = state.generation,
                "ignoring stale identity change"
            );
            return;
        }
        state.generation = event.generation;

        match &event.change {
            IdentityChange::SignedIn(identity) => self.handle_signed_in(&mut state, identity),
            IdentityChange::Updated(identity) => self.handle_updated(&mut state, identity),
            IdentityChange::SignedOut => {
                state.admin = None;
                purge_keys(self.storage.as_ref(), &ADMIN_STORAGE_KEYS);
            }
        }
    }
}
