use std::sync::Arc;

use retrofit_core::AppResult;
use tracing::warn;

/// Authentication event payload for security analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    /// Account identifier if available.
    pub subject: Option<String>,
    /// Stable event type identifier.
    pub event_type: String,
    /// Event outcome label (success or failure reason).
    pub outcome: String,
    /// Client address if available.
    pub ip_address: Option<String>,
}

impl AuthEvent {
    /// Creates an event without a client address.
    #[must_use]
    pub fn new(
        subject: Option<&str>,
        event_type: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.map(str::to_owned),
            event_type: event_type.into(),
            outcome: outcome.into(),
            ip_address: None,
        }
    }
}

/// Sink port for auth event persistence.
pub trait AuthEventSink: Send + Sync {
    /// Appends an auth event entry.
    fn append_event(&self, event: AuthEvent) -> AppResult<()>;
}

/// Application service for auth event recording.
#[derive(Clone)]
pub struct AuthEventService {
    sink: Option<Arc<dyn AuthEventSink>>,
    ip_address: Option<String>,
}

impl AuthEventService {
    /// Creates a service from a sink implementation.
    #[must_use]
    pub fn new(sink: Arc<dyn AuthEventSink>) -> Self {
        Self {
            sink: Some(sink),
            ip_address: None,
        }
    }

    /// Creates a service that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: None,
            ip_address: None,
        }
    }

    /// Stamps every recorded event with the client address.
    #[must_use]
    pub fn with_ip_address(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    /// Records an auth event. Sink failures are logged, never surfaced.
    pub fn record_event(&self, mut event: AuthEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        if event.ip_address.is_none() {
            event.ip_address.clone_from(&self.ip_address);
        }

        let event_type = event.event_type.clone();
        if let Err(error) = sink.append_event(event) {
            warn!(event_type = %event_type, error = %error, "failed to record auth event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use retrofit_core::{AppError, AppResult};

    use super::{AuthEvent, AuthEventService, AuthEventSink};

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuthEvent>>,
    }

    impl AuthEventSink for RecordingSink {
        fn append_event(&self, event: AuthEvent) -> AppResult<()> {
            self.events
                .lock()
                .map_err(|_| AppError::Internal("poisoned".to_owned()))?
                .push(event);
            Ok(())
        }
    }

    struct FailingSink;

    impl AuthEventSink for FailingSink {
        fn append_event(&self, _event: AuthEvent) -> AppResult<()> {
            Err(AppError::Internal("sink offline".to_owned()))
        }
    }

    #[test]
    fn record_event_stamps_client_address() {
        let sink = Arc::new(RecordingSink::default());
        let service =
            AuthEventService::new(sink.clone()).with_ip_address(Some("10.0.0.8".to_owned()));

        service.record_event(AuthEvent::new(Some("acct_1"), "login", "success"));

        let events = sink.events.lock().map(|events| events.clone()).unwrap_or_default();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ip_address.as_deref(), Some("10.0.0.8"));
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let service = AuthEventService::new(Arc::new(FailingSink));
        service.record_event(AuthEvent::new(None, "logout", "success"));
    }
}
