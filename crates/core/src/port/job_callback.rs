// Job Callback Port
// The operation a worker runs for each claimed job

use super::connection::Connection;
use crate::domain::Query;
use thiserror::Error;

/// Bytes returned by one request/response cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub bytes: Vec<u8>,
}

impl Response {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Callback execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Query not bound to a session")]
    Unbound,

    #[error("Callback failed: {0}")]
    Failed(String),
}

impl ExecutionError {
    /// Whether the connection that produced this error can no longer be trusted
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            ExecutionError::Send(_) | ExecutionError::Receive(_) | ExecutionError::ConnectionClosed
        )
    }
}

/// A claimed query together with the connection it was bound to.
///
/// Handed to the callback by the claiming worker after session binding, so the
/// callback works against whichever connection claimed the job.
pub struct BoundQuery<'a> {
    query: &'a Query,
    connection: &'a mut dyn Connection,
}

impl<'a> BoundQuery<'a> {
    /// Pair a bound query with its connection.
    ///
    /// # Errors
    /// - ExecutionError::Unbound if the query carries no session, or a session
    ///   other than the connection's
    pub fn new(query: &'a Query, connection: &'a mut dyn Connection) -> Result<Self, ExecutionError> {
        match query.session_id() {
            Some(session) if session == connection.session_id() => Ok(Self { query, connection }),
            _ => Err(ExecutionError::Unbound),
        }
    }

    pub fn query(&self) -> &Query {
        self.query
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        &mut *self.connection
    }
}

/// Job callback trait
///
/// Implementations:
/// - RequestProtocol: send the payload, read one response
/// - closures `Fn(&mut BoundQuery) -> Result<Response, ExecutionError>`
pub trait JobCallback: Send + Sync {
    /// Run the job against its bound connection
    fn call(&self, bound: &mut BoundQuery<'_>) -> Result<Response, ExecutionError>;
}

impl<F> JobCallback for F
where
    F: Fn(&mut BoundQuery<'_>) -> Result<Response, ExecutionError> + Send + Sync,
{
    fn call(&self, bound: &mut BoundQuery<'_>) -> Result<Response, ExecutionError> {
        self(bound)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{SessionId, WorkerId};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;

    /// What a recording callback observed for one invocation
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Invocation {
        pub payload: Vec<u8>,
        pub session_id: Option<SessionId>,
        pub logical_id: Option<WorkerId>,
        pub connection_session: SessionId,
    }

    /// Callback that reports every invocation over a channel
    pub struct RecordingCallback {
        tx: Mutex<Sender<Invocation>>,
    }

    impl RecordingCallback {
        pub fn new() -> (Self, Receiver<Invocation>) {
            let (tx, rx) = mpsc::channel();
            (Self { tx: Mutex::new(tx) }, rx)
        }
    }

    impl JobCallback for RecordingCallback {
        fn call(&self, bound: &mut BoundQuery<'_>) -> Result<Response, ExecutionError> {
            let invocation = Invocation {
                payload: bound.query().payload().as_bytes().to_vec(),
                session_id: bound.query().session_id(),
                logical_id: bound.query().logical_id(),
                connection_session: bound.connection().session_id(),
            };
            let _ = self.tx.lock().unwrap().send(invocation);
            Ok(Response::empty())
        }
    }

    /// Callback that blocks until released, for holding a worker busy
    pub struct GateCallback {
        started: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl GateCallback {
        /// Returns the callback, a receiver signalled when it starts, and a release sender
        pub fn new() -> (Self, Receiver<()>, Sender<()>) {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            (
                Self {
                    started: Mutex::new(started_tx),
                    release: Mutex::new(release_rx),
                },
                started_rx,
                release_tx,
            )
        }
    }

    impl JobCallback for GateCallback {
        fn call(&self, _bound: &mut BoundQuery<'_>) -> Result<Response, ExecutionError> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(Response::empty())
        }
    }
}
