// Application Layer - queue, workers and the driver that owns them

pub mod driver;
pub mod job_queue;
pub mod request;
pub mod signal;
pub mod worker;

// Re-exports
pub use driver::{Driver, PoolStats, ShutdownReport};
pub use job_queue::{JobQueue, QueueStats};
pub use request::RequestProtocol;
pub use signal::BinarySignal;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, WorkerSnapshot};
