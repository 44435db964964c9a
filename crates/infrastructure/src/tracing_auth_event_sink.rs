use retrofit_application::{AuthEvent, AuthEventSink};
use retrofit_core::AppResult;
use tracing::info;

/// Auth event sink that writes every event to the `tracing` output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuthEventSink;

impl TracingAuthEventSink {
    /// Creates a tracing sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AuthEventSink for TracingAuthEventSink {
    fn append_event(&self, event: AuthEvent) -> AppResult<()> {
        info!(
            subject = event.subject.as_deref().unwrap_or("-"),
            event_type = %event.event_type,
            outcome = %event.outcome,
            ip_address = event.ip_address.as_deref().unwrap_or("-"),
            "auth event"
        );
        Ok(())
    }
}
