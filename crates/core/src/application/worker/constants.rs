// Worker constants (No magic values)
use std::time::Duration;

/// Default number of worker slots
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Compiled-in remote endpoint
pub const DEFAULT_ENDPOINT_HOST: &str = "127.0.0.1";
pub const DEFAULT_ENDPOINT_PORT: u16 = 32209;

/// Read buffer for a single response (bytes)
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Graceful shutdown timeout for joining worker threads (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Poll interval while waiting for worker threads to finish
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Thread name prefix for worker threads
pub const WORKER_THREAD_PREFIX: &str = "fanout-worker";
