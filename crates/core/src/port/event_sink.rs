// Event Sink Port
// Observable stream of dispatch outcomes (the submit caller never sees them)

use crate::domain::{JobId, SessionId, WorkerId};
use serde::Serialize;
use tracing::{error, info, warn};

/// Dispatch lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    WorkerConnected {
        worker: WorkerId,
        session: SessionId,
    },
    ConnectFailed {
        worker: WorkerId,
        error: String,
    },
    JobSubmitted {
        job_id: JobId,
        len: usize,
    },
    JobClaimed {
        job_id: JobId,
        worker: WorkerId,
        session: SessionId,
        queued_ms: i64,
    },
    JobCompleted {
        job_id: JobId,
        worker: WorkerId,
        response: String,
    },
    JobFailed {
        job_id: JobId,
        worker: WorkerId,
        error: String,
    },
    JobPanicked {
        job_id: JobId,
        worker: WorkerId,
        message: String,
    },
    WorkerReconnected {
        worker: WorkerId,
        session: SessionId,
    },
    WorkerRetired {
        worker: WorkerId,
        reason: String,
    },
    WorkerStopped {
        worker: WorkerId,
    },
    JobsAbandoned {
        count: usize,
    },
}

/// Event sink port
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DispatchEvent);
}

/// Default sink: one tracing record per event
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &DispatchEvent) {
        match event {
            DispatchEvent::WorkerConnected { worker, session } => {
                info!(worker = %worker, session = %session, "Worker connected");
            }
            DispatchEvent::ConnectFailed { worker, error } => {
                error!(worker = %worker, error = %error, "Worker slot failed to connect");
            }
            DispatchEvent::JobSubmitted { job_id, len } => {
                tracing::debug!(job_id = %job_id, len = len, "Job submitted");
            }
            DispatchEvent::JobClaimed {
                job_id,
                worker,
                session,
                queued_ms,
            } => {
                info!(
                    job_id = %job_id,
                    worker = %worker,
                    session = %session,
                    queued_ms = queued_ms,
                    "Job claimed"
                );
            }
            DispatchEvent::JobCompleted {
                job_id,
                worker,
                response,
            } => {
                info!(job_id = %job_id, worker = %worker, response = %response, "Job completed");
            }
            DispatchEvent::JobFailed {
                job_id,
                worker,
                error,
            } => {
                warn!(job_id = %job_id, worker = %worker, error = %error, "Job failed");
            }
            DispatchEvent::JobPanicked {
                job_id,
                worker,
                message,
            } => {
                error!(job_id = %job_id, worker = %worker, panic_msg = %message, "Job panicked");
            }
            DispatchEvent::WorkerReconnected { worker, session } => {
                info!(worker = %worker, session = %session, "Worker reconnected");
            }
            DispatchEvent::WorkerRetired { worker, reason } => {
                error!(worker = %worker, reason = %reason, "Worker retired");
            }
            DispatchEvent::WorkerStopped { worker } => {
                info!(worker = %worker, "Worker stopped");
            }
            DispatchEvent::JobsAbandoned { count } => {
                warn!(count = count, "Undelivered jobs dropped at shutdown");
            }
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    /// Records every event; tests can block until a condition holds
    #[derive(Default)]
    pub struct RecordingEventSink {
        events: Mutex<Vec<DispatchEvent>>,
        changed: Condvar,
    }

    impl RecordingEventSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<DispatchEvent> {
            self.events.lock().unwrap().clone()
        }

        /// Block until `predicate` holds over the recorded events, or `timeout` elapses
        pub fn wait_until<P>(&self, timeout: Duration, predicate: P) -> bool
        where
            P: Fn(&[DispatchEvent]) -> bool,
        {
            let deadline = Instant::now() + timeout;
            let mut events = self.events.lock().unwrap();
            loop {
                if predicate(&events) {
                    return true;
                }
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                events = self.changed.wait_timeout(events, deadline - now).unwrap().0;
            }
        }
    }

    impl EventSink for RecordingEventSink {
        fn emit(&self, event: &DispatchEvent) {
            self.events.lock().unwrap().push(event.clone());
            self.changed.notify_all();
        }
    }
}
