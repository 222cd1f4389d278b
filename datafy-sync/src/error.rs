//! Run-level error types for datafy-sync
//!
//! Per-track catalog and write failures do not surface here; they are
//! recorded in the run summary and the batch continues. A `SyncError` means
//! the run itself cannot proceed.

use crate::services::CatalogError;
use thiserror::Error;

/// Fatal run error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog credentials could not be retrieved
    #[error("Secrets unavailable: {0}")]
    Secrets(#[source] datafy_common::Error),

    /// Token exchange failed or the catalog rejected the token mid-run
    #[error("Catalog authorization failed: {0}")]
    Auth(#[source] CatalogError),

    /// Store read failed, or a store write outside the per-track path failed
    #[error("Store error: {0}")]
    Store(#[from] datafy_common::Error),

    /// Bad command-line input, such as a malformed track id
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Catalog HTTP client could not be constructed
    #[error("Catalog client error: {0}")]
    Client(String),

    /// Run deadline passed before the run could start fetching
    #[error("Run cancelled")]
    Cancelled,
}

/// Result type for job orchestrators
pub type SyncResult<T> = Result<T, SyncError>;
