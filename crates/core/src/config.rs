// Driver Configuration

use crate::application::worker::constants::{
    DEFAULT_ENDPOINT_HOST, DEFAULT_ENDPOINT_PORT, DEFAULT_WORKER_COUNT,
    GRACEFUL_SHUTDOWN_TIMEOUT_MS, RESPONSE_BUFFER_SIZE,
};
use crate::domain::QueueOrder;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote endpoint every worker connects to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ENDPOINT_HOST.to_string(),
            port: DEFAULT_ENDPOINT_PORT,
        }
    }
}

impl std::fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Fixed number of worker slots
    pub workers: usize,
    pub endpoint: EndpointConfig,
    pub queue_order: QueueOrder,
    /// Read buffer for one response
    pub response_buffer_bytes: usize,
    /// How long shutdown waits for worker threads to exit
    pub shutdown_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            endpoint: EndpointConfig::default(),
            queue_order: QueueOrder::default(),
            response_buffer_bytes: RESPONSE_BUFFER_SIZE,
            shutdown_timeout_ms: GRACEFUL_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl DriverConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject configurations the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::Config("workers must be at least 1".to_string()));
        }
        if self.response_buffer_bytes == 0 {
            return Err(AppError::Config(
                "response_buffer_bytes must be at least 1".to_string(),
            ));
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(AppError::Config("endpoint.host is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_compiled_in_endpoint() {
        let config = DriverConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.endpoint.to_string(), "127.0.0.1:32209");
        assert_eq!(config.queue_order, QueueOrder::Lifo);
        assert_eq!(config.response_buffer_bytes, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = DriverConfig::default().with_workers(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DriverConfig =
            serde_json::from_str(r#"{"workers": 2, "queue_order": "fifo"}"#).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_order, QueueOrder::Fifo);
        assert_eq!(config.endpoint.port, 32209);
    }
}
