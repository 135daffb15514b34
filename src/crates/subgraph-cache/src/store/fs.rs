//! Filesystem content store
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<digest(namespace)>/meta.json
//! <root>/<digest(namespace)>/<digest(key)>.blob
//! ```
//!
//! Directory and file names are digests so arbitrary namespace ids and keys
//! map to safe paths. `meta.json` keeps the original namespace id.

use super::{ContentStore, NamespaceMeta};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tooling::serialization::digest_bytes;
use tracing::{debug, warn};

const META_FILE: &str = "meta.json";
const BLOB_EXTENSION: &str = "blob";

#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    namespace: String,
    #[serde(flatten)]
    meta: NamespaceMeta,
}

/// [`ContentStore`] persisting blobs as files
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened filesystem content store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(digest_bytes(namespace.as_bytes()))
    }

    fn blob_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.{}", digest_bytes(key.as_bytes()), BLOB_EXTENSION))
    }

    /// Write via a temporary file and rename so readers never see partial blobs.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_meta_file(dir: &Path) -> Result<Option<MetaFile>> {
        match Self::read_optional(&dir.join(META_FILE)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn blob_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(BLOB_EXTENSION) {
                blobs.push(path);
            }
        }
        Ok(blobs)
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Self::read_optional(&self.blob_path(namespace, key)).await
    }

    async fn set(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        fs::create_dir_all(self.namespace_dir(namespace)).await?;
        Self::write_atomic(&self.blob_path(namespace, key), &bytes).await
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        for blob in Self::blob_files(&self.namespace_dir(namespace)).await? {
            match fs::remove_file(&blob).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn remove_namespace(&self, namespace: &str) -> Result<()> {
        match fs::remove_dir_all(self.namespace_dir(namespace)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            match Self::read_meta_file(&entry.path()).await {
                Ok(Some(file)) => ids.push(file.namespace),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Skipping unreadable namespace metadata");
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn metadata(&self, namespace: &str) -> Result<Option<NamespaceMeta>> {
        let file = Self::read_meta_file(&self.namespace_dir(namespace)).await?;
        match file {
            Some(file) if file.namespace == namespace => Ok(Some(file.meta)),
            Some(file) => Err(CacheError::Storage(format!(
                "namespace directory for '{}' holds metadata for '{}'",
                namespace, file.namespace
            ))),
            None => Ok(None),
        }
    }

    async fn set_metadata(&self, namespace: &str, meta: NamespaceMeta) -> Result<()> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir).await?;
        let file = MetaFile {
            namespace: namespace.to_string(),
            meta,
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        Self::write_atomic(&dir.join(META_FILE), &bytes).await
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize> {
        Ok(Self::blob_files(&self.namespace_dir(namespace)).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_get_set_remove() {
        let dir = TempDir::new().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("graph/1", "key").await.unwrap(), None);
        store.set("graph/1", "key", b"payload".to_vec()).await.unwrap();
        assert_eq!(
            store.get("graph/1", "key").await.unwrap(),
            Some(b"payload".to_vec())
        );

        store.remove_namespace("graph/1").await.unwrap();
        assert_eq!(store.get("graph/1", "key").await.unwrap(), None);
        store.remove_namespace("graph/1").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let store = FsContentStore::open(dir.path()).await.unwrap();
        let meta = NamespaceMeta::new(Utc::now() + Duration::hours(3), "fp-1");

        store.set_metadata("ns", meta.clone()).await.unwrap();
        store.set("ns", "a", vec![1]).await.unwrap();
        store.set("ns", "b", vec![2]).await.unwrap();
        assert_eq!(store.entry_count("ns").await.unwrap(), 2);

        store.clear("ns").await.unwrap();
        assert_eq!(store.entry_count("ns").await.unwrap(), 0);
        assert_eq!(store.metadata("ns").await.unwrap(), Some(meta));
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let expires = Utc::now() + Duration::minutes(5);
        {
            let store = FsContentStore::open(dir.path()).await.unwrap();
            store
                .set_metadata("ns-a", NamespaceMeta::new(expires, "fp"))
                .await
                .unwrap();
            store.set("ns-a", "k", vec![7, 7]).await.unwrap();
            store
                .set_metadata("ns-b", NamespaceMeta::new(expires, "fp"))
                .await
                .unwrap();
        }

        let reopened = FsContentStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.list_namespaces().await.unwrap(), vec!["ns-a", "ns-b"]);
        assert_eq!(reopened.get("ns-a", "k").await.unwrap(), Some(vec![7, 7]));
        assert_eq!(reopened.expiry_of("ns-a").await.unwrap(), Some(expires));
    }
}
