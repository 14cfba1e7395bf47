//! In-memory object bucket.

use std::collections::BTreeMap;
use std::sync::RwLock;

use bytes::Bytes;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ObjectBucket;

/// In-memory bucket backed by a `RwLock<BTreeMap>`.
///
/// Listing returns keys in lexicographic order, like S3 does. Useful for
/// testing and for the binary's in-memory mode.
pub struct MemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBucket {
    /// Create an empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        let map = self.objects.read().expect("lock poisoned");
        map.keys().cloned().collect()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Whether the bucket holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ObjectBucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, max_keys: usize) -> Result<Vec<String>, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.keys().take(max_keys).cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        debug!(bucket = %self.name, key, size = data.len(), "storing object in memory");
        map.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(key);
        debug!(bucket = %self.name, key, "deleted object from memory");
        Ok(())
    }
}
