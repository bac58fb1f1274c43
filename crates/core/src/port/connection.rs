// Connection Port
// Abstraction over the persistent outbound connection each worker owns

use crate::domain::SessionId;
use std::io;
use thiserror::Error;

/// Connection establishment errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("Connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },
}

/// A live, exclusively owned connection to the remote service.
///
/// Never shared between workers, so implementations need no internal locking.
pub trait Connection: Send {
    /// Identity of this connection
    fn session_id(&self) -> SessionId;

    /// Write all of `bytes`
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// One blocking read into `buf`; returns the number of bytes read (0 = peer closed)
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Opens connections to the configured endpoint
pub trait Connector: Send + Sync {
    /// Open one new connection
    ///
    /// # Errors
    /// - ConnectionError::Connect if the endpoint refuses or is unreachable
    fn connect(&self) -> Result<Box<dyn Connection>, ConnectionError>;

    /// Human readable endpoint, for logs
    fn endpoint(&self) -> String;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock connection behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Reply with "echo:<request>"
        Echo,
        /// Every send fails
        FailSend(String),
        /// Reads report the peer closed the connection
        PeerClosed,
    }

    /// In-memory connection
    pub struct MockConnection {
        session: SessionId,
        behavior: MockBehavior,
        last_request: Vec<u8>,
        sent: Arc<Mutex<Vec<(SessionId, Vec<u8>)>>>,
    }

    impl Connection for MockConnection {
        fn session_id(&self) -> SessionId {
            self.session
        }

        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            if let MockBehavior::FailSend(msg) = &self.behavior {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, msg.clone()));
            }
            self.last_request = bytes.to_vec();
            self.sent.lock().unwrap().push((self.session, bytes.to_vec()));
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.behavior {
                MockBehavior::PeerClosed => Ok(0),
                _ => {
                    let mut reply = b"echo:".to_vec();
                    reply.extend_from_slice(&self.last_request);
                    let n = reply.len().min(buf.len());
                    buf[..n].copy_from_slice(&reply[..n]);
                    Ok(n)
                }
            }
        }
    }

    /// Mock connector handing out MockConnections with sequential session ids
    pub struct MockConnector {
        behavior: Mutex<MockBehavior>,
        next_session: AtomicU64,
        /// Number of connect calls to refuse before succeeding (usize::MAX = always)
        refuse_remaining: AtomicUsize,
        connect_calls: AtomicUsize,
        sent: Arc<Mutex<Vec<(SessionId, Vec<u8>)>>>,
    }

    impl MockConnector {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                next_session: AtomicU64::new(1),
                refuse_remaining: AtomicUsize::new(0),
                connect_calls: AtomicUsize::new(0),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_echo() -> Self {
            Self::new(MockBehavior::Echo)
        }

        /// Refuse every connection attempt
        pub fn new_refusing() -> Self {
            let connector = Self::new_echo();
            connector.refuse_next(usize::MAX);
            connector
        }

        /// Refuse the next `n` connection attempts
        pub fn refuse_next(&self, n: usize) {
            self.refuse_remaining.store(n, Ordering::SeqCst);
        }

        /// Behavior for connections opened from now on
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn connect_calls(&self) -> usize {
            self.connect_calls.load(Ordering::SeqCst)
        }

        /// Every (session, request) pair successfully sent so far
        pub fn sent(&self) -> Vec<(SessionId, Vec<u8>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Connector for MockConnector {
        fn connect(&self) -> Result<Box<dyn Connection>, ConnectionError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            let refuse = self
                .refuse_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                    0 => None,
                    usize::MAX => Some(usize::MAX),
                    n => Some(n - 1),
                })
                .is_ok();
            if refuse {
                return Err(ConnectionError::Connect {
                    endpoint: self.endpoint(),
                    reason: "connection refused".to_string(),
                });
            }
            let session = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
            Ok(Box::new(MockConnection {
                session,
                behavior: self.behavior.lock().unwrap().clone(),
                last_request: Vec::new(),
                sent: Arc::clone(&self.sent),
            }))
        }

        fn endpoint(&self) -> String {
            "mock://service".to_string()
        }
    }
}
