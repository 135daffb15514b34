//! Error types for cache operations

use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while reading or writing cached results
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be serialized or a stored blob could not be parsed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Gzip encoding or decoding failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid cache configuration
    #[error("Configuration error: {0}")]
    Config(#[from] tooling::ToolingError),
}
