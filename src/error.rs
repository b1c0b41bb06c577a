//! Error taxonomy for the memory store
//!
//! Semantic-layer failures (`DimensionMismatch`, `EmbeddingUnavailable`) are
//! recoverable: they degrade recording to log-only mode. Log failures
//! (`StorageUnavailable`) are fatal to `record`. `CorruptIndex` is fatal at open.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector index backend: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        MemoryError::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
