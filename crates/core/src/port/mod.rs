// Port Layer - Interfaces for external dependencies

pub mod connection;
pub mod event_sink;
pub mod id_provider; // For deterministic testing
pub mod job_callback;
pub mod time_provider;

// Re-exports
pub use connection::{Connection, ConnectionError, Connector};
pub use event_sink::{DispatchEvent, EventSink, TracingEventSink};
pub use id_provider::IdProvider;
pub use job_callback::{BoundQuery, ExecutionError, JobCallback, Response};
pub use time_provider::TimeProvider;
