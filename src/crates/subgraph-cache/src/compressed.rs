//! Typed, compressed view over a [`ContentStore`]

use crate::codec::{BlobCodec, CompressionLevel};
use crate::error::Result;
use crate::store::ContentStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Stores serialized values as gzip blobs in a [`ContentStore`]
#[derive(Clone)]
pub struct CompressedStore {
    store: Arc<dyn ContentStore>,
    codec: BlobCodec,
}

impl CompressedStore {
    pub fn new(store: Arc<dyn ContentStore>, level: CompressionLevel) -> Self {
        Self {
            store,
            codec: BlobCodec::new(level),
        }
    }

    /// Read and decode a value, `None` on miss
    ///
    /// A blob that fails to decompress or parse is an error, not a miss.
    pub async fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>> {
        match self.store.get(namespace, key).await? {
            Some(blob) => Ok(Some(self.codec.decode(&blob)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a value; returns the stored blob size in bytes
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
    ) -> Result<usize> {
        let blob = self.codec.encode(value)?;
        let size = blob.len();
        self.store.set(namespace, key, blob).await?;
        Ok(size)
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn level(&self) -> CompressionLevel {
        self.codec.level()
    }
}

impl std::fmt::Debug for CompressedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedStore")
            .field("level", &self.codec.level())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::store::InMemoryContentStore;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_put_get() {
        let store = CompressedStore::new(
            Arc::new(InMemoryContentStore::new()),
            CompressionLevel::Fast,
        );
        let value = json!({"answer": 42, "items": [1, 2, 3]});

        let size = store.put("ns", "k", &value).await.unwrap();
        assert!(size > 0);
        assert_eq!(store.get::<Value>("ns", "k").await.unwrap(), Some(value));
        assert_eq!(store.get::<Value>("ns", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_error() {
        let backend = Arc::new(InMemoryContentStore::new());
        backend.set("ns", "k", b"garbage".to_vec()).await.unwrap();
        let store = CompressedStore::new(backend, CompressionLevel::Default);

        let err = store.get::<Value>("ns", "k").await.unwrap_err();
        assert!(matches!(err, CacheError::Compression(_)));
    }
}
