//! Process-local content store

use super::{ContentStore, NamespaceMeta};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct NamespaceSlot {
    meta: Option<NamespaceMeta>,
    entries: HashMap<String, Vec<u8>>,
}

/// In-memory [`ContentStore`]
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    namespaces: Arc<RwLock<HashMap<String, NamespaceSlot>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of namespaces held, listed or not
    pub async fn len(&self) -> usize {
        self.namespaces.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.namespaces.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|slot| slot.entries.get(key).cloned()))
    }

    async fn set(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .entries
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(slot) = namespaces.get_mut(namespace) {
            slot.entries.clear();
        }
        Ok(())
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        let mut ids: Vec<String> = namespaces
            .iter()
            .filter(|(_, slot)| slot.meta.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn metadata(&self, namespace: &str) -> Result<Option<NamespaceMeta>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|slot| slot.meta.clone()))
    }

    async fn set_metadata(&self, namespace: &str, meta: NamespaceMeta) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.to_string()).or_default().meta = Some(meta);
        Ok(())
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|slot| slot.entries.len())
            .unwrap_or(0))
    }
}
