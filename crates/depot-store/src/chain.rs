//! Logarithmic delta-chain content store.
//!
//! Successive revisions of an object form a chain: each write names its
//! predecessor through the [`PARENT_HEADER`](depot_types::PARENT_HEADER)
//! metadata hint. Rather than storing a patch against the immediate
//! predecessor (which would make reads linear in chain length), a revision
//! at depth `d` stores a patch against the revision obtained by clearing the
//! lowest set bit of `d`. Its [`Pack`] then lists exactly `popcount(d) - 1`
//! patches on top of one full base, and every power-of-two depth starts a
//! fresh base. Reads replay at most `log2(d)` patches.
//!
//! Raw bytes of every revision are also kept under `["blobs", hash]`, the
//! same layout the plain store uses; chain bases are read from there.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use depot_kv::{KeyValueStore, KvError, ListOptions};
use depot_types::{Blob, Bytes, Hash, Raw};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::delta::Delta;
use crate::error::{StoreError, StoreResult};
use crate::layout::{blob_key, delta_key, hash_from_key, pack_key, prefix_key, PACKS};
use crate::traits::{unique_match, verify_body, ContentStore};

/// Chain record stored for every revision under `["packs", hash]`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Pack<T = Raw> {
    /// Revision this one was written against, if any.
    pub parent: Option<Hash<T>>,
    /// 1 for a chain root.
    pub depth: u64,
    /// Full base body the patches apply to.
    pub first: Hash<T>,
    /// Patches replayed on `first`, oldest first.
    pub delta: Vec<Hash<Delta>>,
    /// Metadata headers of the stored blob.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    _kind: PhantomData<fn() -> T>,
}

impl<T> Pack<T> {
    fn root(hash: Hash<T>, headers: BTreeMap<String, String>) -> Self {
        Self {
            parent: None,
            depth: 1,
            first: hash,
            delta: Vec::new(),
            headers,
            _kind: PhantomData,
        }
    }

    /// Reinterpret the pack for another content type.
    pub fn cast<U>(self) -> Pack<U> {
        Pack {
            parent: self.parent.map(Hash::cast),
            depth: self.depth,
            first: self.first.cast(),
            delta: self.delta,
            headers: self.headers,
            _kind: PhantomData,
        }
    }
}

impl<T> Clone for Pack<T> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent,
            depth: self.depth,
            first: self.first,
            delta: self.delta.clone(),
            headers: self.headers.clone(),
            _kind: PhantomData,
        }
    }
}

/// Number of patches a revision at `depth` shares with the one below it.
fn common_bits(depth: u64) -> usize {
    (depth & depth.wrapping_sub(1)).count_ones() as usize
}

/// Content store using the logarithmic delta-chain encoding.
pub struct DeltaChainStore {
    kv: Arc<dyn KeyValueStore>,
    verify_reads: bool,
}

impl DeltaChainStore {
    /// Create a store over the given substrate.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            verify_reads: false,
        }
    }

    /// Re-hash every reconstructed body and fail on mismatch.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify_reads = verify;
        self
    }

    /// Load the chain record of a stored object.
    pub async fn read_pack<T>(&self, hash: &Hash<T>) -> StoreResult<Pack<T>> {
        let hash = hash.erase();
        self.load_pack(&hash)
            .await?
            .map(Pack::cast)
            .ok_or_else(|| StoreError::not_found(&hash))
    }

    async fn load_pack(&self, hash: &Hash) -> StoreResult<Option<Pack>> {
        match self.kv.get(&pack_key(hash)).await {
            Ok(blob) => decode_pack(hash, &blob).map(Some),
            Err(KvError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_base(&self, hash: &Hash) -> StoreResult<Bytes> {
        match self.kv.get(&blob_key(hash)).await {
            Ok(blob) => blob.into_body().ok_or_else(|| StoreError::not_found(hash)),
            Err(KvError::NotFound { .. }) => Err(StoreError::not_found(hash)),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_deltas(&self, hashes: &[Hash<Delta>]) -> StoreResult<HashMap<Hash<Delta>, Delta>> {
        let keys: Vec<_> = hashes.iter().map(delta_key).collect();
        let found = self.kv.get_many(&keys).await?;
        let mut deltas = HashMap::with_capacity(found.len());
        for (key, blob) in found {
            let hash: Hash<Delta> = hash_from_key(&key)
                .ok_or_else(|| StoreError::CorruptDelta(format!("bad delta key {key}")))?
                .cast();
            let body = blob.body().ok_or_else(|| StoreError::not_found(&hash))?;
            deltas.insert(hash, Delta::decode(body)?);
        }
        Ok(deltas)
    }

    /// Rebuild the body described by `first` plus `delta`.
    async fn replay(&self, first: &Hash, delta: &[Hash<Delta>]) -> StoreResult<Vec<u8>> {
        let base = self.read_base(first).await?;
        let deltas = self.read_deltas(delta).await?;
        apply_chain(base.to_vec(), delta, &deltas)
    }

    async fn store_delta(&self, delta: &Delta) -> StoreResult<Hash<Delta>> {
        let encoded = delta.encode()?;
        let hash = Hash::<Delta>::of(&encoded);
        self.kv.set(&delta_key(&hash), Blob::new(encoded)).await?;
        Ok(hash)
    }

    /// Work out the pack for a new revision written against `parent`.
    async fn extend(
        &self,
        hash: Hash,
        parent: Hash,
        parent_pack: Pack,
        body: &[u8],
        headers: BTreeMap<String, String>,
    ) -> StoreResult<Pack> {
        let depth = parent_pack.depth + 1;
        let bits = common_bits(depth);

        if bits == 0 {
            debug!(hash = %hash.short_hex(), depth, "delta chain reset");
            return Ok(Pack {
                parent: Some(parent),
                depth,
                first: hash,
                delta: Vec::new(),
                headers,
                _kind: PhantomData,
            });
        }

        let keep = bits - 1;
        if parent_pack.delta.len() < keep {
            return Err(StoreError::CorruptPack {
                hash: parent.to_hex(),
                reason: format!(
                    "depth {} carries {} deltas, need at least {keep}",
                    parent_pack.depth,
                    parent_pack.delta.len()
                ),
            });
        }
        let mut delta = parent_pack.delta[..keep].to_vec();
        let common = self.replay(&parent_pack.first, &delta).await?;
        delta.push(self.store_delta(&Delta::compute(&common, body)).await?);

        debug!(hash = %hash.short_hex(), depth, deltas = delta.len(), "delta chain extended");
        Ok(Pack {
            parent: Some(parent),
            depth,
            first: parent_pack.first,
            delta,
            headers,
            _kind: PhantomData,
        })
    }

    fn rebuild(&self, hash: &Hash, pack: Pack, body: Vec<u8>) -> StoreResult<Blob> {
        if self.verify_reads {
            verify_body(hash, &body)?;
        }
        let blob = pack
            .headers
            .into_iter()
            .fold(Blob::new(body), |blob, (k, v)| blob.with_meta(k, v));
        Ok(blob)
    }
}

fn decode_pack(hash: &Hash, blob: &Blob) -> StoreResult<Pack> {
    blob.parse_json().map_err(|e| StoreError::CorruptPack {
        hash: hash.to_hex(),
        reason: e.to_string(),
    })
}

fn apply_chain(
    mut body: Vec<u8>,
    chain: &[Hash<Delta>],
    deltas: &HashMap<Hash<Delta>, Delta>,
) -> StoreResult<Vec<u8>> {
    for link in chain {
        let delta = deltas.get(link).ok_or_else(|| StoreError::not_found(link))?;
        body = delta.apply(&body)?;
    }
    Ok(body)
}

#[async_trait]
impl ContentStore for DeltaChainStore {
    async fn write(&self, blob: Blob) -> StoreResult<Hash> {
        let hash = blob.hash().ok_or(StoreError::EmptyBlob)?;
        if self.kv.exists(&pack_key(&hash)).await? {
            debug!(hash = %hash.short_hex(), "pack already stored");
            return Ok(hash);
        }

        let headers = blob.metadata().clone();
        let parent = blob.parent().filter(|p| *p != hash);
        let body = blob.body().cloned().ok_or(StoreError::EmptyBlob)?;

        let pack = match parent {
            None => Pack::root(hash, headers),
            Some(parent) => match self.load_pack(&parent).await? {
                Some(parent_pack) => self.extend(hash, parent, parent_pack, &body, headers).await?,
                None => {
                    warn!(
                        hash = %hash.short_hex(),
                        parent = %parent.short_hex(),
                        "parent hint has no pack, starting a new chain"
                    );
                    Pack::root(hash, headers)
                }
            },
        };

        self.kv.set(&blob_key(&hash), blob).await?;
        self.kv.set(&pack_key(&hash), Blob::json(&pack)?).await?;
        debug!(hash = %hash.short_hex(), depth = pack.depth, "stored revision");
        Ok(hash)
    }

    async fn read(&self, hash: &Hash) -> StoreResult<Blob> {
        let pack = self
            .load_pack(hash)
            .await?
            .ok_or_else(|| StoreError::not_found(hash))?;
        let body = self.replay(&pack.first, &pack.delta).await?;
        self.rebuild(hash, pack, body)
    }

    /// Batched read: packs, bases and patches are each fetched with a
    /// single `get_many` before any replay happens.
    async fn read_many(&self, hashes: &[Hash]) -> StoreResult<Vec<(Hash, Blob)>> {
        let pack_keys: Vec<_> = hashes.iter().map(pack_key).collect();
        let mut found = self.kv.get_many(&pack_keys).await?.into_iter().peekable();
        let mut packs = Vec::with_capacity(hashes.len());
        for (hash, key) in hashes.iter().zip(&pack_keys) {
            match found.next_if(|(k, _)| k == key) {
                Some((_, blob)) => packs.push(decode_pack(hash, &blob)?),
                None => return Err(StoreError::not_found(hash)),
            }
        }

        let mut firsts: Vec<Hash> = packs.iter().map(|p| p.first).collect();
        firsts.sort();
        firsts.dedup();
        let base_keys: Vec<_> = firsts.iter().map(blob_key).collect();
        let mut bases = HashMap::with_capacity(firsts.len());
        for (key, blob) in self.kv.get_many(&base_keys).await? {
            if let (Some(hash), Some(body)) = (hash_from_key(&key), blob.into_body()) {
                bases.insert(hash, body);
            }
        }

        let mut links: Vec<Hash<Delta>> = packs.iter().flat_map(|p| p.delta.iter().copied()).collect();
        links.sort();
        links.dedup();
        let deltas = self.read_deltas(&links).await?;

        let mut result = Vec::with_capacity(hashes.len());
        for (hash, pack) in hashes.iter().zip(packs) {
            let base = bases
                .get(&pack.first)
                .ok_or_else(|| StoreError::not_found(&pack.first))?;
            let body = apply_chain(base.to_vec(), &pack.delta, &deltas)?;
            result.push((*hash, self.rebuild(hash, pack, body)?));
        }
        Ok(result)
    }

    async fn resolve(&self, prefix: &str) -> StoreResult<Hash> {
        let entries = self
            .kv
            .list(&prefix_key(PACKS, prefix), ListOptions::limit(2))
            .await?;
        let matches = entries.iter().filter_map(|(k, _)| hash_from_key(k)).collect();
        unique_match(prefix, matches)
    }

    async fn exists(&self, hash: &Hash) -> StoreResult<bool> {
        Ok(self.kv.exists(&pack_key(hash)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_kv::{InMemoryKeyValueStore, Key};

    fn store() -> (Arc<InMemoryKeyValueStore>, DeltaChainStore) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        (kv.clone(), DeltaChainStore::new(kv).with_verification(true))
    }

    async fn write_chain(store: &DeltaChainStore, revisions: &[String]) -> Vec<Hash> {
        let mut parent = None;
        let mut hashes = Vec::new();
        for text in revisions {
            let blob = Blob::new(text.clone()).with_parent(parent);
            let hash = store.write(blob).await.unwrap();
            parent = Some(hash);
            hashes.push(hash);
        }
        hashes
    }

    #[test]
    fn common_bits_follow_binary_depth() {
        assert_eq!(common_bits(1), 0);
        assert_eq!(common_bits(2), 0);
        assert_eq!(common_bits(3), 1);
        assert_eq!(common_bits(7), 2);
        assert_eq!(common_bits(8), 0);
        assert_eq!(common_bits(15), 3);
    }

    #[tokio::test]
    async fn append_chain_reads_back_every_revision() {
        let (_, store) = store();
        let revisions: Vec<String> = (1..=100).map(|n| "a".repeat(n)).collect();
        let hashes = write_chain(&store, &revisions).await;

        for (i, (hash, text)) in hashes.iter().zip(&revisions).enumerate() {
            let depth = i as u64 + 1;
            let blob = store.read(hash).await.unwrap();
            assert_eq!(blob.text(), Some(text.as_str()), "revision {depth}");

            let pack = store.read_pack(hash).await.unwrap();
            assert_eq!(pack.depth, depth);
            assert_eq!(pack.delta.len(), depth.count_ones() as usize - 1);
        }
    }

    #[tokio::test]
    async fn power_of_two_depth_resets_to_full_base() {
        let (_, store) = store();
        let revisions: Vec<String> = (0..8).map(|n| format!("line {n}\n").repeat(n + 1)).collect();
        let hashes = write_chain(&store, &revisions).await;

        for index in [0usize, 1, 3, 7] {
            let pack = store.read_pack(&hashes[index]).await.unwrap();
            assert!(pack.delta.is_empty());
            assert_eq!(pack.first, hashes[index]);
        }
        let pack = store.read_pack(&hashes[6]).await.unwrap();
        assert_eq!(pack.first, hashes[3]);
        assert_eq!(pack.parent, Some(hashes[5]));
    }

    #[tokio::test]
    async fn reordered_runs_read_back_at_depth_three() {
        let (_, store) = store();
        let revisions = [
            "seed\n".to_string(),
            "b\nb\nb\nb\nd\na\na\na\na\na\n".to_string(),
            "d\nc\nd\na\nc\nb\n".to_string(),
        ];
        let hashes = write_chain(&store, &revisions).await;

        let pack = store.read_pack(&hashes[2]).await.unwrap();
        assert_eq!(pack.depth, 3);
        assert_eq!(pack.delta.len(), 1);
        for (hash, text) in hashes.iter().zip(&revisions) {
            let blob = store.read(hash).await.unwrap();
            assert_eq!(blob.text(), Some(text.as_str()));
        }
    }

    #[tokio::test]
    async fn multiline_edits_survive_replay() {
        let (_, store) = store();
        let mut text = String::new();
        let mut revisions = Vec::new();
        for i in 0..20 {
            text = text.replace(&format!("entry {}", i / 2), &format!("edited {i}"));
            text.push_str(&format!("entry {i}\n"));
            revisions.push(text.clone());
        }
        let hashes = write_chain(&store, &revisions).await;
        for (hash, text) in hashes.iter().zip(&revisions) {
            assert_eq!(store.read(hash).await.unwrap().text(), Some(text.as_str()));
        }
    }

    #[tokio::test]
    async fn rewriting_known_content_keeps_existing_pack() {
        let (kv, store) = store();
        let hashes = write_chain(&store, &["x".to_string(), "xy".to_string()]).await;
        let before = kv.len();

        let again = store.write(Blob::new("xy")).await.unwrap();
        assert_eq!(again, hashes[1]);
        assert_eq!(kv.len(), before);
        assert_eq!(store.read_pack(&again).await.unwrap().depth, 2);
    }

    #[tokio::test]
    async fn missing_parent_pack_starts_new_chain() {
        let (_, store) = store();
        let ghost = Hash::of(b"never stored");
        let hash = store
            .write(Blob::new("orphan").with_parent(Some(ghost)))
            .await
            .unwrap();
        let pack = store.read_pack(&hash).await.unwrap();
        assert_eq!(pack.depth, 1);
        assert_eq!(pack.parent, None);
        assert_eq!(store.read(&hash).await.unwrap().text(), Some("orphan"));
    }

    #[tokio::test]
    async fn headers_round_trip() {
        let (_, store) = store();
        let hash = store
            .write(Blob::new("body").with_meta("kind", "note"))
            .await
            .unwrap();
        let blob = store.read(&hash).await.unwrap();
        assert_eq!(blob.meta("kind"), Some("note"));
    }

    #[tokio::test]
    async fn read_many_is_batched_and_ordered() {
        let (_, store) = store();
        let revisions: Vec<String> = (1..=12).map(|n| format!("{}\n", "b".repeat(n))).collect();
        let hashes = write_chain(&store, &revisions).await;

        let wanted = [hashes[10], hashes[2], hashes[6], hashes[2]];
        let blobs = store.read_many(&wanted).await.unwrap();
        let texts: Vec<_> = blobs.iter().map(|(_, b)| b.text().unwrap()).collect();
        assert_eq!(
            texts,
            vec![
                revisions[10].as_str(),
                revisions[2].as_str(),
                revisions[6].as_str(),
                revisions[2].as_str()
            ]
        );

        let err = store
            .read_many(&[hashes[0], Hash::of(b"absent")])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_delta_link_is_not_found() {
        let (kv, store) = store();
        let hashes = write_chain(&store, &["p\n".to_string(), "p\nq\n".to_string(), "p\nq\nr\n".to_string()]).await;
        let pack = store.read_pack(&hashes[2]).await.unwrap();
        let link = pack.delta[0];
        kv.delete(&delta_key(&link)).await.unwrap();

        let err = store.read(&hashes[2]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn resolve_scans_packs() {
        let (kv, store) = store();
        let hash = store.write(Blob::new("resolve me")).await.unwrap();
        assert_eq!(store.resolve(&hash.to_hex()[..12]).await.unwrap(), hash);
        assert!(store.exists(&hash).await.unwrap());
        assert_eq!(kv.count_prefix(&Key::new([PACKS, ""])), 1);
    }

    #[tokio::test]
    async fn empty_blob_is_rejected() {
        let (_, store) = store();
        let err = store.write(Blob::absent()).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyBlob));
    }
}
