//! Error types for sub-graph execution
//!
//! Two layers:
//!
//! - [`ExecutionError`] for problems that stop a whole batch or pipeline call
//!   before any outcome exists (cache namespace could not be opened,
//!   invalid configuration)
//! - [`ItemFailure`] for a single item or stage; these are data, collected
//!   into the aggregate outcome, never thrown across the task queue

use serde::{Deserialize, Serialize};
use subgraph_cache::CacheError;
use thiserror::Error;

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Error returned by a [`GraphInvoker`](crate::invoker::GraphInvoker)
pub type InvokeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a runner call as a whole
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Runner or target configuration is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cache namespace could not be opened
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Fingerprint or cache key could not be computed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tooling error: {0}")]
    Tooling(#[from] tooling::ToolingError),
}

/// Why an item or stage did not produce outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Item shape was wrong or required inputs were missing
    Validation,
    /// The invoker returned an error or panicked
    Invocation,
    /// Never ran because the batch or host had already aborted
    Aborted,
    /// A cached value could not be read or written
    Cache,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Validation => "validation",
            FailureKind::Invocation => "invocation",
            FailureKind::Aborted => "aborted",
            FailureKind::Cache => "cache",
        };
        f.write_str(name)
    }
}

/// Structured failure for one item or stage
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("ItemIndex {index}: {message}")]
pub struct ItemFailure {
    pub index: usize,
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(index: usize, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            message: message.into(),
        }
    }

    pub fn validation(index: usize, message: impl Into<String>) -> Self {
        Self::new(index, FailureKind::Validation, message)
    }

    pub fn invocation(index: usize, message: impl Into<String>) -> Self {
        Self::new(index, FailureKind::Invocation, message)
    }

    pub fn aborted(index: usize, target_name: &str) -> Self {
        Self::new(index, FailureKind::Aborted, format!("Aborted {}", target_name))
    }

    pub fn cache(index: usize, message: impl Into<String>) -> Self {
        Self::new(index, FailureKind::Cache, message)
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == FailureKind::Aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_failure_display() {
        let failure = ItemFailure::invocation(1, "Error running summarize. Inputs: {}. boom");
        assert_eq!(
            failure.to_string(),
            "ItemIndex 1: Error running summarize. Inputs: {}. boom"
        );
    }

    #[test]
    fn test_aborted_message() {
        let failure = ItemFailure::aborted(4, "summarize");
        assert!(failure.is_aborted());
        assert_eq!(failure.message, "Aborted summarize");
    }

    #[test]
    fn test_cache_error_conversion() {
        let err: ExecutionError = CacheError::Storage("disk full".into()).into();
        assert_eq!(err.to_string(), "Cache error: Storage error: disk full");
    }
}
