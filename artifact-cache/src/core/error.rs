use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Storage IO error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("No record for key: {0}")]
    NotFound(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("Data file corrupted: {0:?}")]
    Corrupted(PathBuf),
}

impl CacheError {
    /// Whether this error reports a missing key rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<globset::Error> for CacheError {
    fn from(e: globset::Error) -> Self {
        CacheError::InvalidPattern(e.to_string())
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
