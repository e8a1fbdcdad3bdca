use async_trait::async_trait;
use dashmap::DashMap;

use super::{ObjectStore, StoreError};

/// Process-local object store. Objects live until the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// (bucket, key) -> body
    objects: DashMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .insert((bucket.to_string(), key.to_string()), body.into());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|body| body.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
