use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::store::{ObjectStore, StoreError};

/// Download failed on every attempt. Carries the last underlying error only.
#[derive(Debug, Error)]
#[error("failed to download {bucket}/{key} after {attempts} attempts: {source}")]
pub struct FetchError {
    pub bucket: String,
    pub key: String,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// Object downloads with retry, driven by a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingFetcher {
    store: Arc<dyn ObjectStore>,
    policy: Arc<dyn RetryPolicy>,
}

impl RetryingFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, policy: Arc<dyn RetryPolicy>) -> Self {
        Self { store, policy }
    }

    pub async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.store.get(bucket, key).await {
                Ok(bytes) => {
                    debug!(
                        bucket,
                        attempt,
                        size_bytes = bytes.len(),
                        backend = self.store.name(),
                        "Object fetched"
                    );
                    return Ok(bytes);
                }
                Err(err) => match self.policy.next_delay(attempt, &err) {
                    Some(delay) => {
                        warn!(
                            bucket,
                            key,
                            attempt,
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "Object download failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(FetchError {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                            attempts: attempt,
                            source: err,
                        });
                    }
                },
            }
        }
    }
}
