//! In-memory key-value store for testing and ephemeral use.
//!
//! [`InMemoryKeyValueStore`] keeps every entry in a `BTreeMap` keyed by the
//! encoded key, protected by a `RwLock`. Ordered iteration over the map is
//! what gives `list` its prefix-range semantics.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use depot_types::Blob;
use tracing::trace;

use crate::error::{KvError, KvResult};
use crate::key::{Key, ListOptions};
use crate::traits::KeyValueStore;

/// An in-memory implementation of [`KeyValueStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, Blob>>,
}

impl InMemoryKeyValueStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries whose key falls under `prefix`.
    pub fn count_prefix(&self, prefix: &Key) -> usize {
        let encoded = prefix.encode();
        self.entries
            .read()
            .map(|m| m.keys().filter(|k| k.starts_with(&encoded)).count())
            .unwrap_or(0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> KvError {
    KvError::Backend(format!("lock poisoned: {e}"))
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &Key) -> KvResult<Blob> {
        let entries = self.entries.read().map_err(poisoned)?;
        entries
            .get(&key.encode())
            .cloned()
            .ok_or_else(|| KvError::NotFound { key: key.clone() })
    }

    async fn set(&self, key: &Key, blob: Blob) -> KvResult<()> {
        if !blob.has_body() {
            return Err(KvError::EmptyBlob { key: key.clone() });
        }
        trace!(%key, "kv set");
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.encode(), blob);
        Ok(())
    }

    async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<(Key, Blob)>> {
        let encoded = prefix.encode();
        let lower = match &options.after {
            Some(after) if after.encode() >= encoded => Bound::Excluded(after.encode()),
            _ => Bound::Included(encoded.clone()),
        };
        let limit = options.limit.unwrap_or(usize::MAX);

        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&encoded))
            .take(limit)
            .map(|(k, v)| (Key::decode(k), v.clone()))
            .collect())
    }

    async fn delete(&self, key: &Key) -> KvResult<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(&key.encode()).is_some())
    }

    async fn get_many(&self, keys: &[Key]) -> KvResult<Vec<(Key, Blob)>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(&k.encode()).map(|v| (k.clone(), v.clone())))
            .collect())
    }
}
