// Fanout Core - Dispatch Logic & Ports
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{Driver, JobQueue, PoolStats, RequestProtocol, ShutdownReport};
pub use config::{DriverConfig, EndpointConfig};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
