//! Common error types for datafy

use thiserror::Error;

/// Common result type for datafy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by every datafy job
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog credentials could not be retrieved or were malformed
    #[error("Secrets error: {0}")]
    Secrets(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input or stored value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
