//! Application services and ports.

#![forbid(unsafe_code)]

mod admin_mode_service;
mod auth_event_service;
mod identity_events;
mod identity_store;
mod session_ports;
mod session_service;

#[cfg(test)]
mod test_fakes;

pub use admin_mode_service::AdminModeService;
pub use auth_event_service::{AuthEvent, AuthEventService, AuthEventSink};
pub use identity_events::{IdentityChange, IdentityChanged, IdentityObserver, SubscriptionId};
pub use identity_store::{IdentitySnapshot, IdentityStore, SessionPhase};
pub use session_ports::{
    AuthBackend, AuthGrant, ElevationPolicy, KeyValueStore, SessionRenewal,
};
pub use session_service::{
    DEFAULT_REFRESH_CHECK_INTERVAL, DEFAULT_REFRESH_THRESHOLD, SessionConfig, SessionService,
};
