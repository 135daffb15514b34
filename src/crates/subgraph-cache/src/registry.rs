//! Namespaced cache registry
//!
//! A [`CacheRegistry`] owns every cache namespace backed by one
//! [`ContentStore`]. Each namespace belongs to one target and remembers the
//! fingerprint of the target definition its entries were computed from.
//! Asking for a namespace with a different fingerprint clears it first, so
//! callers never invalidate by hand.
//!
//! Namespaces expire a fixed TTL after creation. Nothing runs in the
//! background: expired namespaces are dropped by [`CacheRegistry::sweep_expired`],
//! which runners call after a cached batch completes.

use crate::codec::CompressionLevel;
use crate::compressed::CompressedStore;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::metrics::{CacheMetrics, MetricsRecorder};
use crate::store::{ContentStore, InMemoryContentStore, NamespaceMeta};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tooling::logging::{format_duration, LogGuard};
use tracing::{debug, info};

struct RegistryInner {
    store: CompressedStore,
    ttl: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: MetricsRecorder,
}

/// Process-wide set of cache namespaces
///
/// Cloning is cheap and shares state.
#[derive(Clone)]
pub struct CacheRegistry {
    inner: Arc<RegistryInner>,
}

impl CacheRegistry {
    pub fn new(store: Arc<dyn ContentStore>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store: CompressedStore::new(store, config.compression),
                ttl: config.ttl,
                locks: DashMap::new(),
                metrics: MetricsRecorder::default(),
            }),
        }
    }

    /// Registry over a fresh in-memory store with default settings
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryContentStore::new()), CacheConfig::default())
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn compression(&self) -> CompressionLevel {
        self.inner.store.level()
    }

    pub fn content_store(&self) -> Arc<dyn ContentStore> {
        Arc::clone(self.inner.store.store())
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.metrics.snapshot()
    }

    fn lock_for(&self, namespace: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .locks
                .entry(namespace.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Forget the lock of a removed namespace unless a caller still holds it
    fn release_lock(&self, namespace: &str) {
        self.inner
            .locks
            .remove_if(namespace, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.inner.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Return the namespace for `namespace_id`, creating it if needed
    ///
    /// If the stored fingerprint differs from `fingerprint`, every entry is
    /// removed before this returns. A namespace found already expired is
    /// restarted with a fresh TTL.
    pub async fn get_or_create(
        &self,
        namespace_id: &str,
        fingerprint: &str,
    ) -> Result<CacheNamespace> {
        let lock = self.lock_for(namespace_id);
        let _guard = lock.lock().await;

        let store = self.inner.store.store();
        let now = Utc::now();

        match store.metadata(namespace_id).await? {
            None => {
                store
                    .set_metadata(
                        namespace_id,
                        NamespaceMeta::new(self.expiry_from(now), fingerprint),
                    )
                    .await?;
                debug!(
                    namespace = namespace_id,
                    ttl = %format_duration(self.inner.ttl),
                    "Created cache namespace"
                );
            }
            Some(meta) if meta.is_expired_at(now) => {
                store.clear(namespace_id).await?;
                store
                    .set_metadata(
                        namespace_id,
                        NamespaceMeta::new(self.expiry_from(now), fingerprint),
                    )
                    .await?;
                debug!(namespace = namespace_id, "Restarted expired cache namespace");
            }
            Some(meta) if meta.fingerprint.as_deref() != Some(fingerprint) => {
                store.clear(namespace_id).await?;
                store
                    .set_metadata(
                        namespace_id,
                        NamespaceMeta::new(meta.expires_at, fingerprint),
                    )
                    .await?;
                self.inner.metrics.invalidation();
                info!(
                    namespace = namespace_id,
                    previous = ?meta.fingerprint,
                    current = fingerprint,
                    "Target definition changed, cleared cache namespace"
                );
            }
            Some(_) => {}
        }

        Ok(CacheNamespace {
            id: namespace_id.to_string(),
            fingerprint: fingerprint.to_string(),
            registry: self.clone(),
        })
    }

    /// Remove every namespace whose expiry has passed
    ///
    /// Returns the number of namespaces removed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let _scope = LogGuard::new("sweep_expired");
        let store = self.inner.store.store();
        let mut removed = 0;

        for namespace_id in store.list_namespaces().await? {
            let lock = self.lock_for(&namespace_id);
            let guard = lock.lock().await;

            let expired = match store.metadata(&namespace_id).await? {
                Some(meta) => meta.is_expired_at(Utc::now()),
                None => false,
            };
            if expired {
                store.remove_namespace(&namespace_id).await?;
                removed += 1;
                debug!(namespace = %namespace_id, "Removed expired cache namespace");
            }

            drop(guard);
            drop(lock);
            if expired {
                self.release_lock(&namespace_id);
            }
        }

        if removed > 0 {
            self.inner.metrics.expired(removed);
            info!(removed, "Swept expired cache namespaces");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("ttl", &self.inner.ttl)
            .field("store", &self.inner.store)
            .field("namespaces", &self.inner.locks.len())
            .finish()
    }
}

/// Handle to one namespace, valid for the fingerprint it was opened with
#[derive(Debug, Clone)]
pub struct CacheNamespace {
    id: String,
    fingerprint: String,
    registry: CacheRegistry,
}

impl CacheNamespace {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Look up a cached value
    pub async fn get<T: DeserializeOwned>(&self, cache_key: &str) -> Result<Option<T>> {
        let inner = &self.registry.inner;
        let value = inner.store.get(&self.id, cache_key).await?;

        if value.is_some() {
            inner.metrics.hit();
            debug!(namespace = %self.id, cache_key, "Cache hit");
        } else {
            inner.metrics.miss();
            debug!(namespace = %self.id, cache_key, "Cache miss");
        }
        Ok(value)
    }

    /// Store a value
    ///
    /// Skipped when the namespace has since been reopened with another
    /// fingerprint, so results computed from an outdated definition never
    /// land in the refreshed namespace.
    pub async fn put<T: Serialize + ?Sized>(&self, cache_key: &str, value: &T) -> Result<()> {
        let inner = &self.registry.inner;
        let lock = self.registry.lock_for(&self.id);
        let _guard = lock.lock().await;

        let current = inner.store.store().metadata(&self.id).await?;
        if current.and_then(|meta| meta.fingerprint).as_deref() != Some(self.fingerprint.as_str()) {
            debug!(namespace = %self.id, cache_key, "Namespace fingerprint moved on, skipping store");
            return Ok(());
        }

        let bytes = inner.store.put(&self.id, cache_key, value).await?;
        inner.metrics.write(bytes);
        debug!(namespace = %self.id, cache_key, bytes, "Stored cache entry");
        Ok(())
    }

    /// When this namespace becomes eligible for sweeping
    pub async fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.registry
            .inner
            .store
            .store()
            .expiry_of(&self.id)
            .await
    }

    pub async fn len(&self) -> Result<usize> {
        self.registry.inner.store.store().entry_count(&self.id).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
