use async_trait::async_trait;
use depot_types::{Blob, Hash};

use crate::error::{StoreError, StoreResult};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same body always produces the
///   same hash, so writing it twice stores it once.
/// - Hashes depend on body bytes only, never on metadata headers.
/// - Concurrent reads are always safe (objects are immutable).
/// - All substrate errors are propagated, never silently ignored.
///
/// The trait works on untyped [`Hash`]es so it stays object safe; typed
/// callers go through [`ContentStoreExt`].
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Write a blob and return its content hash.
    ///
    /// Fails with [`StoreError::EmptyBlob`] if the blob has no body.
    async fn write(&self, blob: Blob) -> StoreResult<Hash>;

    /// Read an object by hash.
    ///
    /// Fails with [`StoreError::NotFound`] if the object is absent.
    async fn read(&self, hash: &Hash) -> StoreResult<Blob>;

    /// Read several objects, preserving request order.
    ///
    /// Fails with [`StoreError::NotFound`] naming the first absent hash.
    async fn read_many(&self, hashes: &[Hash]) -> StoreResult<Vec<(Hash, Blob)>>;

    /// Find the unique stored hash whose hex form starts with `prefix`.
    ///
    /// Fails with [`StoreError::NotFound`] on zero matches and
    /// [`StoreError::Multiple`] on more than one.
    async fn resolve(&self, prefix: &str) -> StoreResult<Hash>;

    /// Check whether an object is stored.
    async fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        match self.read(hash).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Typed convenience layer over [`ContentStore`].
#[async_trait]
pub trait ContentStoreExt: ContentStore {
    /// Write a typed blob and return its typed hash.
    async fn write_typed<T>(&self, blob: Blob<T>) -> StoreResult<Hash<T>> {
        Ok(self.write(blob.erase()).await?.cast())
    }

    /// Read a typed blob.
    async fn read_typed<T>(&self, hash: Hash<T>) -> StoreResult<Blob<T>> {
        Ok(self.read(&hash.erase()).await?.cast())
    }

    /// Resolve a short prefix into a typed hash.
    async fn resolve_typed<T>(&self, prefix: &str) -> StoreResult<Hash<T>> {
        Ok(self.resolve(prefix).await?.cast())
    }
}

impl<S: ContentStore + ?Sized> ContentStoreExt for S {}

/// Shared resolution logic: interpret a 2-item prefix scan.
pub(crate) fn unique_match(prefix: &str, matches: Vec<Hash>) -> StoreResult<Hash> {
    match matches.as_slice() {
        [] => Err(StoreError::NotFound(format!("{prefix}*"))),
        [only] => Ok(*only),
        _ => Err(StoreError::Multiple {
            prefix: prefix.to_string(),
        }),
    }
}

/// Verify a body against the hash it was requested under.
pub(crate) fn verify_body(expected: &Hash, body: &[u8]) -> StoreResult<()> {
    let computed: Hash = Hash::of(body);
    if &computed != expected {
        return Err(StoreError::HashMismatch {
            expected: expected.to_hex(),
            computed: computed.to_hex(),
        });
    }
    Ok(())
}
