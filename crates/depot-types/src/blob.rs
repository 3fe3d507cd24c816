use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TypeError;
use crate::hash::{Hash, Raw};

/// Metadata header carrying the hex hash of a prior revision.
///
/// Producers attach it to hint the content store that the new body is a
/// revision of that object; it never affects the blob's hash.
pub const PARENT_HEADER: &str = "parent";

/// A body (or its absence) plus string-keyed metadata headers.
///
/// The hash is computed lazily from the body bytes only and cached.
/// Reading the body by value ([`Blob::into_body`]) consumes the blob, so a
/// caller that needs the bytes twice must `clone()` first.
pub struct Blob<T = Raw> {
    body: Option<Bytes>,
    metadata: BTreeMap<String, String>,
    hash: OnceLock<Hash<T>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Blob<T> {
    /// Create a blob from body bytes.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            metadata: BTreeMap::new(),
            hash: OnceLock::new(),
            _kind: PhantomData,
        }
    }

    /// A blob without a body, representing an absent object.
    pub fn absent() -> Self {
        Self {
            body: None,
            metadata: BTreeMap::new(),
            hash: OnceLock::new(),
            _kind: PhantomData,
        }
    }

    /// Serialize `value` as JSON into a new blob.
    pub fn json<V: Serialize>(value: &V) -> Result<Self, TypeError> {
        let data =
            serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Attach a metadata header, replacing any previous value.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the [`PARENT_HEADER`] hint when `parent` is set.
    pub fn with_parent(self, parent: Option<Hash<T>>) -> Self {
        match parent {
            Some(parent) => self.with_meta(PARENT_HEADER, parent.to_hex()),
            None => self,
        }
    }

    /// Look up a metadata header.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// All metadata headers.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// The parsed [`PARENT_HEADER`] hint, if present and well formed.
    pub fn parent(&self) -> Option<Hash<T>> {
        self.meta(PARENT_HEADER).and_then(|h| Hash::from_hex(h).ok())
    }

    /// Returns `true` if the blob carries a body.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Borrow the body bytes.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Consume the blob and take its body.
    pub fn into_body(self) -> Option<Bytes> {
        self.body
    }

    /// The body as UTF-8 text, if present and valid.
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Decode the body as JSON.
    pub fn parse_json<V: DeserializeOwned>(&self) -> Result<V, TypeError> {
        let body = self.body.as_deref().ok_or(TypeError::MissingBody)?;
        serde_json::from_slice(body).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Content hash of the body. `None` for an absent blob.
    ///
    /// Computed once; subsequent calls return the cached digest.
    pub fn hash(&self) -> Option<Hash<T>> {
        let body = self.body.as_deref()?;
        Some(*self.hash.get_or_init(|| Hash::of(body)))
    }

    /// Reinterpret this blob as carrying a different logical type.
    pub fn cast<U>(self) -> Blob<U> {
        let hash = OnceLock::new();
        if let Some(h) = self.hash.get() {
            let _ = hash.set(h.cast());
        }
        Blob {
            body: self.body,
            metadata: self.metadata,
            hash,
            _kind: PhantomData,
        }
    }

    /// Drop the logical type tag.
    pub fn erase(self) -> Blob<Raw> {
        self.cast()
    }
}

impl<T> Clone for Blob<T> {
    fn clone(&self) -> Self {
        let hash = OnceLock::new();
        if let Some(h) = self.hash.get() {
            let _ = hash.set(*h);
        }
        Self {
            body: self.body.clone(),
            metadata: self.metadata.clone(),
            hash,
            _kind: PhantomData,
        }
    }
}

impl<T> PartialEq for Blob<T> {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body && self.metadata == other.metadata
    }
}

impl<T> Eq for Blob<T> {}

impl<T> fmt::Debug for Blob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.body.as_ref().map(Bytes::len))
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn hash_ignores_metadata() {
        let plain: Blob = Blob::new("content");
        let tagged: Blob = Blob::new("content").with_meta("author", "someone");
        assert_eq!(plain.hash(), tagged.hash());
        assert_ne!(plain, tagged);
    }

    #[test]
    fn hash_is_stable_across_clones_and_casts() {
        let blob: Blob = Blob::new("abc");
        let first = blob.hash().unwrap();
        assert_eq!(blob.clone().hash(), Some(first));
        let typed: Blob<u8> = blob.cast();
        assert_eq!(typed.hash().map(Hash::erase), Some(first));
    }

    #[test]
    fn absent_blob_has_no_hash() {
        let blob: Blob = Blob::absent();
        assert!(!blob.has_body());
        assert!(blob.hash().is_none());
        assert!(matches!(
            blob.parse_json::<Vec<u8>>(),
            Err(TypeError::MissingBody)
        ));
    }

    #[test]
    fn parent_header_roundtrip() {
        let prior: Hash = Hash::of(b"v1");
        let blob: Blob = Blob::new("v2").with_parent(Some(prior));
        assert_eq!(blob.meta(PARENT_HEADER), Some(prior.to_hex().as_str()));
        assert_eq!(blob.parent(), Some(prior));

        let orphan: Blob = Blob::new("v2").with_parent(None);
        assert!(orphan.parent().is_none());
    }

    #[test]
    fn json_body() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Record {
            depth: u64,
        }
        let blob: Blob = Blob::json(&Record { depth: 3 }).unwrap();
        assert_eq!(blob.text(), Some(r#"{"depth":3}"#));
        assert_eq!(blob.parse_json::<Record>().unwrap(), Record { depth: 3 });
    }

    #[test]
    fn into_body_consumes() {
        let blob: Blob = Blob::new(vec![1u8, 2, 3]);
        let copy = blob.clone();
        assert_eq!(blob.into_body().unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(copy.body().unwrap().as_ref(), &[1, 2, 3]);
    }
}
