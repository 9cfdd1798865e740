//! Error types shared by the pipeline modules.
//!
//! Collaborator failures are reported as values of [`Error`]; only the
//! binary entry point converts them into an `anyhow` error and a non-zero
//! exit code.

use thiserror::Error;

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for weight computation and distribution.
#[derive(Debug, Error)]
pub enum Error {
    /// Row store rejected or failed a request.
    #[error("Row store error: {0}")]
    Store(String),

    /// GitHub returned an error status or an unexpected body.
    #[error("GitHub API error: {0}")]
    Github(String),

    /// Code frequency statistics are still being computed upstream.
    #[error("Code frequency not available yet for {0}")]
    StatsPending(String),

    /// Split relay rejected a create or update.
    #[error("Split distribution error: {0}")]
    Splits(String),

    /// Bad user input (date range, addresses, config).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed line in a recovery file.
    #[error("Recovery file line {line}: {reason}")]
    Recovery { line: usize, reason: String },

    /// Another run holds the reconciliation lease.
    #[error("Run lock already held: {0}")]
    Locked(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure is the "statistics not ready" signal.
    pub fn is_pending(&self) -> bool {
        matches!(self, Error::StatsPending(_))
    }
}
