//! Error types for ImmuneScore

use thiserror::Error;

/// Errors raised at the fallible edges of the crate (storage, parsing, config).
///
/// The numeric core (normalize / predict / fit) never fails.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid training config: {0}")]
    InvalidConfig(String),

    #[error("Invalid daily record: {0}")]
    InvalidRecord(String),

    #[error("Parameter store error: {0}")]
    Store(String),
}
