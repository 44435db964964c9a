//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_auth_backend;
mod file_key_value_store;
mod http_auth_backend;
mod in_memory_key_value_store;
mod tracing_auth_event_sink;

pub use console_auth_backend::{ConsoleAuthBackend, DEFAULT_CONSOLE_TOKEN_LIFETIME_SECONDS};
pub use file_key_value_store::FileKeyValueStore;
pub use http_auth_backend::HttpAuthBackend;
pub use in_memory_key_value_store::InMemoryKeyValueStore;
pub use tracing_auth_event_sink::TracingAuthEventSink;
