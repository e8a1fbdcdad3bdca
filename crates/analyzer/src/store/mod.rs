pub mod memory;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use s3::S3ObjectStore;

/// Errors reported by an object store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("object store request failed: {0}")]
    Transient(String),
    #[error("invalid object store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Read access to named blobs.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Returns the full object body.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
