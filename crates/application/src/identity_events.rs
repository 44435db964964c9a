//! Identity change notifications emitted by the session lifecycle.

use std::sync::{Arc, Mutex};

use retrofit_domain::Identity;

use crate::identity_store::lock_unpoisoned;

/// What happened to the base identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    /// An identity became present (login or restore).
    SignedIn(Identity),
    /// The present identity was edited.
    Updated(Identity),
    /// The identity became absent.
    SignedOut,
}

/// Notification delivered to identity observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChanged {
    /// Session generation the change belongs to. Monotonically increasing.
    pub generation: u64,
    /// The change itself.
    pub change: IdentityChange,
}

impl IdentityChanged {
    /// Returns the identity after the change, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match &self.change {
            IdentityChange::SignedIn(identity) | IdentityChange::Updated(identity) => {
                Some(identity)
            }
            IdentityChange::SignedOut => None,
        }
    }
}

/// Receives identity change notifications synchronously.
pub trait IdentityObserver: Send + Sync {
    /// Handles one change. Must not block.
    fn on_identity_changed(&self, event: &IdentityChanged);
}

impl<F> IdentityObserver for F
where
    F: Fn(&IdentityChanged) + Send + Sync,
{
    fn on_identity_changed(&self, event: &IdentityChanged) {
        self(event);
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = (SubscriptionId, Arc<dyn IdentityObserver>);

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    guards: Vec<Subscriber>,
    observers: Vec<Subscriber>,
}

/// Ordered observer list. Guards always run before ordinary observers.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    state: Mutex<RegistryState>,
}

impl ObserverRegistry {
    pub(crate) fn subscribe_guard(&self, observer: Arc<dyn IdentityObserver>) -> SubscriptionId {
        let mut state = lock_unpoisoned(&self.state);
        let id = next_id(&mut state);
        state.guards.push((id, observer));
        id
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn IdentityObserver>) -> SubscriptionId {
        let mut state = lock_unpoisoned(&self.state);
        let id = next_id(&mut state);
        state.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        let before = state.guards.len() + state.observers.len();
        state.guards.retain(|(existing, _)| *existing != id);
        state.observers.retain(|(existing, _)| *existing != id);
        before != state.guards.len() + state.observers.len()
    }

    pub(crate) fn clear(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.guards.clear();
        state.observers.clear();
    }

    /// Delivers `event` outside the registry lock so observers may subscribe.
    pub(crate) fn notify(&self, event: &IdentityChanged) {
        let subscribers: Vec<Arc<dyn IdentityObserver>> = {
            let state = lock_unpoisoned(&self.state);
            state
                .guards
                .iter()
                .chain(state.observers.iter())
                .map(|(_, observer)| Arc::clone(observer))
                .collect()
        };

        for observer in subscribers {
            observer.on_identity_changed(event);
        }
    }
}

fn next_id(state: &mut RegistryState) -> SubscriptionId {
    state.next_id = state.next_id.wrapping_add(1);
    SubscriptionId(state.next_id)
}
