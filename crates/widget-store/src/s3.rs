//! S3 bucket adapter built on the `object_store` crate.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::debug;

use crate::error::StoreError;
use crate::traits::ObjectBucket;

/// An [`ObjectBucket`] over any `object_store` backend, normally S3.
pub struct S3Bucket {
    name: String,
    store: Arc<dyn ObjectStore>,
}

impl S3Bucket {
    /// Connect to an S3 bucket in the given region.
    ///
    /// Credentials come from the standard `AWS_*` environment variables.
    pub fn connect(bucket: &str, region: &str) -> Result<Self, StoreError> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|e| StoreError::backend("s3", e))?;

        Ok(Self::from_store(bucket, Arc::new(store)))
    }

    /// Wrap an already-built object store.
    pub fn from_store(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

#[async_trait::async_trait]
impl ObjectBucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, max_keys: usize) -> Result<Vec<String>, StoreError> {
        let mut stream = self.store.list(None);
        let mut keys = Vec::new();

        while keys.len() < max_keys {
            match stream.next().await {
                Some(meta) => {
                    let meta = meta.map_err(|e| StoreError::backend("s3", e))?;
                    keys.push(meta.location.to_string());
                }
                None => break,
            }
        }

        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let result = match self.store.get(&Path::from(key)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(StoreError::backend("s3", e)),
        };

        let data = result
            .bytes()
            .await
            .map_err(|e| StoreError::backend("s3", e))?;
        Ok(Some(data))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let size = data.len();
        self.store
            .put(&Path::from(key), PutPayload::from(data))
            .await
            .map_err(|e| StoreError::backend("s3", e))?;
        debug!(bucket = %self.name, key, size, "stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.store.delete(&Path::from(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!(bucket = %self.name, key, "deleted object");
                Ok(())
            }
            Err(e) => Err(StoreError::backend("s3", e)),
        }
    }
}
