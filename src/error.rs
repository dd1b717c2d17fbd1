//! # Error Types
//!
//! Unified error handling for the backfill pipeline.
//!
//! Two layers: [`StoreError`] covers document-store transport and API
//! failures, which the batch submitter absorbs into per-item failure
//! bookkeeping and never propagates; [`BackfillError`] covers everything
//! fatal to a run (relational connect/query failures, configuration
//! problems, checkpoint/failure-log I/O) and surfaces to the process
//! exit code.

use thiserror::Error;

/// Result type for fatal-capable operations
pub type BackfillResult<T> = Result<T, BackfillError>;

/// Errors that abort a backfill run
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint persistence failed at {path}: {reason}")]
    Checkpoint { path: String, reason: String },
}

impl BackfillError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a checkpoint persistence error
    pub fn checkpoint(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Checkpoint {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the document store client
///
/// A `StoreError` returned from a bulk submission means the whole request
/// failed (transport or request-level); item-level errors travel inside the
/// successful response instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bulk API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Malformed bulk response: {0}")]
    MalformedResponse(String),

    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an API error from an HTTP response
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if the error is worth retrying on a later run
    ///
    /// Purely informational: the submitter records failures either way and
    /// the next run retries anything not checkpointed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Api { status, .. } => *status >= 500,
            StoreError::MalformedResponse(_) => false,
            StoreError::Serialization(_) => false,
        }
    }
}
