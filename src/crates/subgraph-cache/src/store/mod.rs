//! Byte-level storage backends for cached results
//!
//! A [`ContentStore`] maps `(namespace, key)` pairs to opaque blobs and keeps
//! a small [`NamespaceMeta`] record per namespace. The cache layer above it
//! decides what the bytes mean; backends only move them around.

mod fs;
mod memory;

pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-namespace bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMeta {
    /// When the namespace becomes eligible for sweeping
    pub expires_at: DateTime<Utc>,
    /// Fingerprint of the target definition the entries were produced from
    pub fingerprint: Option<String>,
}

impl NamespaceMeta {
    pub fn new(expires_at: DateTime<Utc>, fingerprint: impl Into<String>) -> Self {
        Self {
            expires_at,
            fingerprint: Some(fingerprint.into()),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage backend for cache blobs
///
/// A namespace becomes visible to [`list_namespaces`](Self::list_namespaces)
/// once metadata has been written for it.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read a blob, `None` on miss
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob, replacing any previous value
    async fn set(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Drop every entry of a namespace, keeping its metadata
    async fn clear(&self, namespace: &str) -> Result<()>;

    /// Drop a namespace together with its metadata
    async fn remove_namespace(&self, namespace: &str) -> Result<()>;

    async fn list_namespaces(&self) -> Result<Vec<String>>;

    async fn metadata(&self, namespace: &str) -> Result<Option<NamespaceMeta>>;

    async fn set_metadata(&self, namespace: &str, meta: NamespaceMeta) -> Result<()>;

    /// Number of entries stored in a namespace
    async fn entry_count(&self, namespace: &str) -> Result<usize>;

    async fn expiry_of(&self, namespace: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.metadata(namespace).await?.map(|meta| meta.expires_at))
    }
}
