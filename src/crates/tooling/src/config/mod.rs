//! Configuration loading
//!
//! Implement [`ConfigBuilder`] and read overrides through an [`EnvReader`]:
//!
//! ```rust
//! use tooling::config::{ConfigBuilder, EnvReader};
//!
//! #[derive(Debug, Clone, Default)]
//! struct WorkerConfig {
//!     concurrency: i64,
//!     caching: bool,
//! }
//!
//! impl ConfigBuilder for WorkerConfig {
//!     fn from_env(prefix: &str) -> tooling::Result<Self> {
//!         let env = EnvReader::new(prefix);
//!         Ok(Self {
//!             concurrency: env.parse_or("CONCURRENCY", 1)?,
//!             caching: env.bool("CACHE_ENABLED")?.unwrap_or(false),
//!         })
//!     }
//!
//!     fn merge(&mut self, other: Self) -> &mut Self {
//!         *self = other;
//!         self
//!     }
//! }
//!
//! let config = WorkerConfig::from_env_with_defaults("WORKER_DOC_").unwrap();
//! assert_eq!(config.concurrency, 1);
//! ```

mod builder;
mod env;

pub use builder::ConfigBuilder;
pub use env::{build_env_key, get_env, get_env_bool, get_env_parse, EnvReader};
