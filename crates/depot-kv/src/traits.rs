//! The [`KeyValueStore`] trait defining the substrate interface.
//!
//! depot persists everything onto an ordered byte-key store. Any backend
//! (in-memory, embedded database, remote service) implements this trait.

use async_trait::async_trait;
use depot_types::Blob;

use crate::error::{KvError, KvResult};
use crate::key::{Key, ListOptions};

/// Ordered key-value storage of [`Blob`]s.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are
/// last-writer-wins; the trait offers no compare-and-set.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the blob stored under `key`.
    ///
    /// Fails with [`KvError::NotFound`] if nothing is stored there.
    async fn get(&self, key: &Key) -> KvResult<Blob>;

    /// Store `blob` under `key`, replacing any previous value.
    ///
    /// Fails with [`KvError::EmptyBlob`] if the blob has no body.
    async fn set(&self, key: &Key, blob: Blob) -> KvResult<()>;

    /// List entries whose key falls in the range selected by `prefix`
    /// (see [`Key::matches_prefix`]), in ascending key order.
    async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<(Key, Blob)>>;

    /// Delete the value under `key`. Returns `true` if it existed.
    async fn delete(&self, key: &Key) -> KvResult<bool>;

    /// Read several keys at once.
    ///
    /// Missing keys are skipped; present ones are returned in request order.
    /// Backends may override for fewer round-trips.
    async fn get_many(&self, keys: &[Key]) -> KvResult<Vec<(Key, Blob)>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get(key).await {
                Ok(blob) => found.push((key.clone(), blob)),
                Err(KvError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Check whether a value is stored under `key`.
    async fn exists(&self, key: &Key) -> KvResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(KvError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
