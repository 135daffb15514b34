//! Shared helpers for the subgraph runner crates
//!
//! - [`serialization`] - canonical JSON and SHA-256 content digests
//! - [`config`] - layered configuration from defaults and `SUBGRAPH_*` variables
//! - [`logging`] - timing helpers for `tracing`
//! - [`async_utils`] - deadlines for fallible futures

pub mod async_utils;
pub mod config;
pub mod logging;
pub mod serialization;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ToolingError>;
