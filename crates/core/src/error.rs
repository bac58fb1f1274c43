// Central Error Type for the Application

use thiserror::Error;

/// Errors surfaced by the driver's public operations
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected payload (empty or over the wire bound)
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// No pool slot could reach the lookup service
    #[error("Connection error: {0}")]
    Connection(#[from] crate::port::ConnectionError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission after shutdown began
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
