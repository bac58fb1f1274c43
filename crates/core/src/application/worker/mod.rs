// Worker - one thread, one persistent connection, serving the shared queue

pub mod constants;
mod panic_guard;
mod shutdown;

pub use panic_guard::{guard_callback, CallbackOutcome};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::driver::Outstanding;
use crate::application::job_queue::JobQueue;
use crate::domain::{Job, SessionBinding, SessionId, WorkerId, WorkerState};
use crate::error::Result;
use crate::port::{BoundQuery, Connection, Connector, DispatchEvent, EventSink, TimeProvider};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state every worker reaches back into
pub(crate) struct WorkerContext {
    pub queue: Arc<JobQueue>,
    pub shutdown: ShutdownToken,
    pub outstanding: Arc<Outstanding>,
    pub connector: Arc<dyn Connector>,
    pub events: Arc<dyn EventSink>,
    pub time_provider: Arc<dyn TimeProvider>,
}

/// Whether the worker's connection can carry the next job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionHealth {
    Healthy,
    Broken,
}

/// Per-slot counters, readable from other threads
pub(crate) struct WorkerStats {
    state: AtomicU8,
    session: AtomicU64, // 0 = no session
    served: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time view of one worker slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerSnapshot {
    pub worker: WorkerId,
    pub state: WorkerState,
    pub session: Option<SessionId>,
    pub served: u64,
    pub failed: u64,
    pub panicked: u64,
    pub reconnects: u64,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Starting.as_u8()),
            session: AtomicU64::new(0),
            served: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, worker: WorkerId, to: WorkerState) {
        let from = self.state();
        if let Err(e) = from.transition(to) {
            warn!(worker = %worker, error = %e, "Unexpected worker state transition");
        }
        self.state.store(to.as_u8(), Ordering::Release);
    }

    fn set_session(&self, session: SessionId) {
        self.session.store(session.0, Ordering::Release);
    }

    pub fn snapshot(&self, worker: WorkerId) -> WorkerSnapshot {
        let session = self.session.load(Ordering::Acquire);
        WorkerSnapshot {
            worker,
            state: self.state(),
            session: (session != 0).then_some(SessionId(session)),
            served: self.served.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Worker owns one connection and serves jobs from the shared queue until stopped
pub(crate) struct Worker {
    id: WorkerId,
    connection: Box<dyn Connection>,
    health: ConnectionHealth,
    ctx: Arc<WorkerContext>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Open the slot's connection (STARTING -> CONNECTING -> IDLE).
    ///
    /// A failed connect is final for the slot: no retry, no replacement.
    pub fn connect(id: WorkerId, ctx: Arc<WorkerContext>, stats: Arc<WorkerStats>) -> Result<Self> {
        stats.transition(id, WorkerState::Connecting);
        match ctx.connector.connect() {
            Ok(connection) => {
                let session = connection.session_id();
                stats.set_session(session);
                stats.transition(id, WorkerState::Idle);
                ctx.events
                    .emit(&DispatchEvent::WorkerConnected { worker: id, session });
                Ok(Self {
                    id,
                    connection,
                    health: ConnectionHealth::Healthy,
                    ctx,
                    stats,
                })
            }
            Err(e) => {
                stats.transition(id, WorkerState::Stopped);
                ctx.events.emit(&DispatchEvent::ConnectFailed {
                    worker: id,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Serving loop; returns when the run flag is cleared or the worker retires
    pub fn run(mut self) {
        info!(worker = %self.id, session = %self.connection.session_id(), "Worker started");
        let retired = loop {
            if self.ctx.shutdown.is_shutdown() {
                break None;
            }
            self.ctx.queue.wait();
            if self.ctx.shutdown.is_shutdown() {
                // Pass the stop on to the next parked worker.
                self.ctx.queue.wake();
                break None;
            }
            if let Err(reason) = self.ensure_healthy() {
                // Leave the wake for a healthy peer.
                self.ctx.queue.wake();
                break Some(reason);
            }
            match self.ctx.queue.pop() {
                Some(job) => self.execute(job),
                None => debug!(worker = %self.id, "Woke with nothing to do"),
            }
        };

        self.stats.transition(self.id, WorkerState::Stopped);
        match retired {
            Some(reason) => self.ctx.events.emit(&DispatchEvent::WorkerRetired {
                worker: self.id,
                reason,
            }),
            None => self
                .ctx
                .events
                .emit(&DispatchEvent::WorkerStopped { worker: self.id }),
        }
    }

    /// Replace a broken connection with exactly one reconnect attempt
    fn ensure_healthy(&mut self) -> std::result::Result<(), String> {
        if self.health == ConnectionHealth::Healthy {
            return Ok(());
        }
        self.stats.transition(self.id, WorkerState::Connecting);
        self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        match self.ctx.connector.connect() {
            Ok(connection) => {
                let session = connection.session_id();
                self.connection = connection;
                self.health = ConnectionHealth::Healthy;
                self.stats.set_session(session);
                self.stats.transition(self.id, WorkerState::Idle);
                self.ctx.events.emit(&DispatchEvent::WorkerReconnected {
                    worker: self.id,
                    session,
                });
                Ok(())
            }
            Err(e) => Err(format!("reconnect failed: {}", e)),
        }
    }

    /// Bind, run and release one job (IDLE -> EXECUTING -> IDLE)
    fn execute(&mut self, job: Job) {
        let Job {
            id: job_id,
            mut query,
            callback,
        } = job;
        self.stats.transition(self.id, WorkerState::Executing);

        let session = self.connection.session_id();
        let binding = SessionBinding {
            session_id: session,
            logical_id: self.id,
            claimed_at: self.ctx.time_provider.now_millis(),
        };

        match query.bind(binding) {
            Ok(()) => {
                self.ctx.events.emit(&DispatchEvent::JobClaimed {
                    job_id: job_id.clone(),
                    worker: self.id,
                    session,
                    queued_ms: query.queued_ms().unwrap_or(0),
                });

                let connection = &mut self.connection;
                let outcome = guard_callback(self.id, &job_id, || {
                    let mut bound = BoundQuery::new(&query, &mut **connection)?;
                    callback.call(&mut bound)
                });

                match outcome {
                    CallbackOutcome::Served(response) => {
                        self.stats.served.fetch_add(1, Ordering::Relaxed);
                        self.ctx.events.emit(&DispatchEvent::JobCompleted {
                            job_id,
                            worker: self.id,
                            response: response.to_string_lossy(),
                        });
                    }
                    CallbackOutcome::Failed(e) => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        if e.breaks_connection() {
                            warn!(worker = %self.id, session = %session, error = %e, "Connection marked broken");
                            self.health = ConnectionHealth::Broken;
                        }
                        self.ctx.events.emit(&DispatchEvent::JobFailed {
                            job_id,
                            worker: self.id,
                            error: e.to_string(),
                        });
                    }
                    CallbackOutcome::Panicked(message) => {
                        // The exchange may have stopped halfway; the stream position is unknown.
                        self.stats.panicked.fetch_add(1, Ordering::Relaxed);
                        self.health = ConnectionHealth::Broken;
                        self.ctx.events.emit(&DispatchEvent::JobPanicked {
                            job_id,
                            worker: self.id,
                            message,
                        });
                    }
                }
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.ctx.events.emit(&DispatchEvent::JobFailed {
                    job_id,
                    worker: self.id,
                    error: e.to_string(),
                });
            }
        }

        drop(query);
        drop(callback);
        self.ctx.outstanding.finish(1);
        self.stats.transition(self.id, WorkerState::Idle);
    }
}
