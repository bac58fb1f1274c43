// Domain Layer - Pure dispatch entities

pub mod error;
pub mod job;
pub mod query;
pub mod queue;
pub mod worker_state;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId};
pub use query::{Payload, Query, SessionBinding, SessionId, WorkerId, MAX_PAYLOAD_LEN};
pub use queue::QueueOrder;
pub use worker_state::WorkerState;
