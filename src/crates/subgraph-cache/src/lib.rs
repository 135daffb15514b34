//! # subgraph-cache - Result cache for sub-graph invocations
//!
//! Memoizes sub-graph outputs by content-addressed key inside per-target
//! namespaces.
//!
//! - [`ContentStore`] - byte-level backend trait, with [`InMemoryContentStore`]
//!   and [`FsContentStore`]
//! - [`CompressedStore`] - typed values as gzip-compressed JSON blobs
//! - [`CacheRegistry`] / [`CacheNamespace`] - namespaces that clear themselves
//!   when the target fingerprint changes and expire after a TTL
//!
//! ```rust,no_run
//! use subgraph_cache::CacheRegistry;
//! use serde_json::json;
//!
//! # async fn run() -> subgraph_cache::Result<()> {
//! let registry = CacheRegistry::in_memory();
//! let ns = registry.get_or_create("summarize", "fingerprint-1").await?;
//! ns.put("cache-key", &json!({"summary": "..."})).await?;
//! let hit: Option<serde_json::Value> = ns.get("cache-key").await?;
//! assert!(hit.is_some());
//! registry.sweep_expired().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod compressed;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod store;

pub use codec::{BlobCodec, CompressionLevel};
pub use compressed::CompressedStore;
pub use config::{CacheConfig, DEFAULT_TTL};
pub use error::{CacheError, Result};
pub use metrics::CacheMetrics;
pub use registry::{CacheNamespace, CacheRegistry};
pub use store::{ContentStore, FsContentStore, InMemoryContentStore, NamespaceMeta};
