//! Canonical tree encoding.
//!
//! A tree is stored as UTF-8 JSON mapping each name (in sorted order) to
//! `{"kind": "blob" | "tree", "hash": "<hex>"}`. Equal trees always encode
//! to the same bytes, so identical subtrees collapse into one object.

use depot_store::{ContentStore, ContentStoreExt};
use depot_types::{Blob, Hash};
use tracing::trace;

use crate::error::{TreeError, TreeResult};
use crate::node::{validate_segment, Tree};

pub struct TreeCodec;

impl TreeCodec {
    /// Encode a tree. `parent` is the prior revision, passed on as a
    /// compression hint only.
    pub fn serialize(tree: &Tree, parent: Option<Hash<Tree>>) -> TreeResult<Blob<Tree>> {
        let data = serde_json::to_vec(tree).map_err(|e| TreeError::Codec(e.to_string()))?;
        Ok(Blob::new(data).with_parent(parent))
    }

    /// Decode a stored tree, rejecting malformed entry names.
    pub fn deserialize(blob: &Blob<Tree>) -> TreeResult<Tree> {
        let body = blob
            .body()
            .ok_or_else(|| TreeError::Codec("tree blob has no body".to_string()))?;
        let tree: Tree =
            serde_json::from_slice(body).map_err(|e| TreeError::Codec(e.to_string()))?;
        for name in tree.names() {
            validate_segment(name)?;
        }
        Ok(tree)
    }
}

/// Read and decode the tree stored under `hash`.
pub async fn read_tree(store: &dyn ContentStore, hash: Hash<Tree>) -> TreeResult<Tree> {
    let blob = store.read_typed(hash).await?;
    TreeCodec::deserialize(&blob)
}

/// Encode and store a tree, returning its hash.
pub async fn write_tree(
    store: &dyn ContentStore,
    tree: &Tree,
    parent: Option<Hash<Tree>>,
) -> TreeResult<Hash<Tree>> {
    let hash = store.write_typed(TreeCodec::serialize(tree, parent)?).await?;
    trace!(hash = %hash.short_hex(), entries = tree.len(), "wrote tree");
    Ok(hash)
}
