use std::sync::Arc;

use async_trait::async_trait;
use depot_kv::{KeyValueStore, KvError, ListOptions};
use depot_types::{Blob, Hash};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::layout::{blob_key, hash_from_key, prefix_key, BLOBS};
use crate::traits::{unique_match, verify_body, ContentStore};

/// Naive content store: every body is stored in full under `["blobs", hash]`.
pub struct PlainStore {
    kv: Arc<dyn KeyValueStore>,
    verify_reads: bool,
}

impl PlainStore {
    /// Create a store over the given substrate.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            verify_reads: false,
        }
    }

    /// Re-hash every body on read and fail on mismatch.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_reads = verify;
        self
    }
}

#[async_trait]
impl ContentStore for PlainStore {
    async fn write(&self, blob: Blob) -> StoreResult<Hash> {
        let hash = blob.hash().ok_or(StoreError::EmptyBlob)?;
        self.kv.set(&blob_key(&hash), blob).await?;
        debug!(hash = %hash.short_hex(), "stored blob");
        Ok(hash)
    }

    async fn read(&self, hash: &Hash) -> StoreResult<Blob> {
        let blob = match self.kv.get(&blob_key(hash)).await {
            Ok(blob) => blob,
            Err(KvError::NotFound { .. }) => return Err(StoreError::not_found(hash)),
            Err(e) => return Err(e.into()),
        };
        if self.verify_reads {
            let body = blob.body().ok_or_else(|| StoreError::not_found(hash))?;
            verify_body(hash, body)?;
        }
        Ok(blob)
    }

    async fn read_many(&self, hashes: &[Hash]) -> StoreResult<Vec<(Hash, Blob)>> {
        let keys: Vec<_> = hashes.iter().map(blob_key).collect();
        let found = self.kv.get_many(&keys).await?;

        let mut found = found.into_iter().peekable();
        let mut result = Vec::with_capacity(hashes.len());
        for (hash, key) in hashes.iter().zip(&keys) {
            match found.next_if(|(k, _)| k == key) {
                Some((_, blob)) => {
                    if self.verify_reads {
                        if let Some(body) = blob.body() {
                            verify_body(hash, body)?;
                        }
                    }
                    result.push((*hash, blob));
                }
                None => return Err(StoreError::not_found(hash)),
            }
        }
        Ok(result)
    }

    async fn resolve(&self, prefix: &str) -> StoreResult<Hash> {
        let entries = self
            .kv
            .list(&prefix_key(BLOBS, prefix), ListOptions::limit(2))
            .await?;
        let matches = entries.iter().filter_map(|(k, _)| hash_from_key(k)).collect();
        unique_match(prefix, matches)
    }

    async fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.kv.exists(&blob_key(hash)).await?)
    }
}
