//! Error types for the history-store archive engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("duplicate key in snapshot: {0}")]
    DuplicateKey(String),

    #[error("document is not sorted as required: {0}")]
    UnsortedInput(String),

    #[error("unknown version: {0}")]
    Version(i64),

    #[error("archive invariant violated: {0}")]
    Integrity(String),

    #[error("store I/O error: {0}")]
    Store(String),

    #[error("malformed record: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for HistoryError {
    fn from(err: bincode::Error) -> Self {
        HistoryError::Serialization(err.to_string())
    }
}
