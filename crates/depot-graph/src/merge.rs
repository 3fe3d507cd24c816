//! Structural diff between commits.
//!
//! [`VersionGraph::diff`] walks the left, right and common-ancestor trees
//! together, one directory level at a time. Entries changed on one side
//! take that side; entries changed on both sides are merged: subtrees
//! recursively, text files line by line (the merged text, markers and all,
//! is written as a new blob). Only kind clashes and binary files end up in
//! [`Change3::conflict`].

use std::collections::BTreeSet;
use std::sync::Arc;

use depot_merge::merge3_bytes;
use depot_store::{ContentStore, ContentStoreExt};
use depot_tree::{read_tree, Node, Tree};
use depot_types::{Blob, Bytes, Hash};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::change::{Change2, Change3, Conflict};
use crate::commit::Commit;
use crate::error::{GraphError, GraphResult};
use crate::graph::VersionGraph;

impl VersionGraph {
    /// Three-way difference between two commits, relative to their LCA.
    pub async fn diff(
        &self,
        left: Option<Hash<Commit>>,
        right: Option<Hash<Commit>>,
    ) -> GraphResult<Change3> {
        let base = self.lca(left, right).await?;
        let (l, r, o) = (
            self.tree(left).await?,
            self.tree(right).await?,
            self.tree(base).await?,
        );
        diff3_dirs(self.store.clone(), String::new(), l, r, o).await
    }

    /// Two-way difference turning `from` into `to`.
    pub async fn diff2(
        &self,
        from: Option<Hash<Commit>>,
        to: Option<Hash<Commit>>,
    ) -> GraphResult<Change2> {
        let (a, b) = (self.tree(from).await?, self.tree(to).await?);
        diff2_dirs(self.store.clone(), String::new(), a, b).await
    }
}

fn child_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

async fn load(store: &dyn ContentStore, hash: Option<Hash<Tree>>) -> GraphResult<Tree> {
    match hash {
        Some(hash) => Ok(read_tree(store, hash).await?),
        None => Ok(Tree::new()),
    }
}

async fn body(store: &dyn ContentStore, hash: Hash<Bytes>) -> GraphResult<Bytes> {
    store
        .read_typed(hash)
        .await?
        .into_body()
        .ok_or_else(|| GraphError::Corrupt(format!("blob {} has no body", hash.short_hex())))
}

fn names<'a>(trees: &[&'a Tree]) -> BTreeSet<&'a str> {
    trees.iter().flat_map(|t| t.names()).collect()
}

impl Change3 {
    fn absorb(&mut self, other: Change3) {
        self.remove.extend(other.remove);
        self.add.extend(other.add);
        self.conflict.extend(other.conflict);
    }
}

fn diff3_dirs(
    store: Arc<dyn ContentStore>,
    prefix: String,
    left: Option<Hash<Tree>>,
    right: Option<Hash<Tree>>,
    origin: Option<Hash<Tree>>,
) -> BoxFuture<'static, GraphResult<Change3>> {
    async move {
        let mut change = Change3::default();
        if left == right {
            // Same snapshot on both sides, relative to the origin.
            if left != origin {
                let delta = diff2_dirs(store, prefix, origin, left).await?;
                return Ok(delta.into());
            }
            return Ok(change);
        }

        let l = load(&*store, left).await?;
        let r = load(&*store, right).await?;
        let o = load(&*store, origin).await?;

        for name in names(&[&l, &r, &o]) {
            let path = child_path(&prefix, name);
            let (ln, rn, on) = (l.get(name).copied(), r.get(name).copied(), o.get(name).copied());
            match (ln, rn, on) {
                (None, None, Some(o)) => {
                    change.remove.insert(path, o);
                }
                (Some(side), None, None) | (None, Some(side), None) => {
                    change.add.insert(path, side);
                }
                (Some(side), None, Some(o)) | (None, Some(side), Some(o)) => {
                    if side != o {
                        change.remove.insert(path.clone(), o);
                        change.add.insert(path, side);
                    }
                }
                (Some(left_node), Some(right_node), on) => {
                    let merged = merge_nodes(store.clone(), path, left_node, right_node, on).await?;
                    change.absorb(merged);
                }
                (None, None, None) => {}
            }
        }
        Ok(change)
    }
    .boxed()
}

/// Reconcile an entry present on both sides.
async fn merge_nodes(
    store: Arc<dyn ContentStore>,
    path: String,
    left: Node,
    right: Node,
    origin: Option<Node>,
) -> GraphResult<Change3> {
    let mut change = Change3::default();
    if left == right {
        if origin != Some(left) {
            change.add.insert(path, left);
        }
        return Ok(change);
    }
    if origin == Some(left) {
        change.add.insert(path, right);
        return Ok(change);
    }
    if origin == Some(right) {
        change.add.insert(path, left);
        return Ok(change);
    }

    match (left, right) {
        (Node::Blob { hash: lh }, Node::Blob { hash: rh }) => {
            let o_body = match origin {
                Some(Node::Blob { hash }) => body(&*store, hash).await?,
                _ => Bytes::new(),
            };
            let (l_body, r_body) = (body(&*store, lh).await?, body(&*store, rh).await?);
            match merge3_bytes(&l_body, &o_body, &r_body) {
                Ok(result) => {
                    if !result.is_clean() {
                        debug!(%path, "text conflict recorded in merged blob");
                    }
                    let merged = Blob::<Bytes>::new(result.render()).with_parent(Some(lh));
                    let hash = store.write_typed(merged).await?;
                    change.add.insert(path, Node::blob(hash));
                }
                Err(_) => {
                    debug!(%path, "binary conflict");
                    change.conflict.insert(
                        path,
                        Conflict {
                            left: Some(left),
                            right: Some(right),
                        },
                    );
                }
            }
        }
        (Node::Tree { hash: lh }, Node::Tree { hash: rh }) => {
            let o = match origin {
                Some(Node::Tree { hash }) => Some(hash),
                _ => None,
            };
            change = diff3_dirs(store, path, Some(lh), Some(rh), o).await?;
        }
        _ => {
            debug!(%path, "kind conflict");
            change.conflict.insert(
                path,
                Conflict {
                    left: Some(left),
                    right: Some(right),
                },
            );
        }
    }
    Ok(change)
}

fn diff2_dirs(
    store: Arc<dyn ContentStore>,
    prefix: String,
    from: Option<Hash<Tree>>,
    to: Option<Hash<Tree>>,
) -> BoxFuture<'static, GraphResult<Change2>> {
    async move {
        let mut change = Change2::default();
        if from == to {
            return Ok(change);
        }
        let a = load(&*store, from).await?;
        let b = load(&*store, to).await?;

        for name in names(&[&a, &b]) {
            let path = child_path(&prefix, name);
            match (a.get(name).copied(), b.get(name).copied()) {
                (Some(old), None) => {
                    change.remove.insert(path, old);
                }
                (None, Some(new)) => {
                    change.add.insert(path, new);
                }
                (Some(Node::Tree { hash: old }), Some(Node::Tree { hash: new })) if old != new => {
                    let nested = diff2_dirs(store.clone(), path, Some(old), Some(new)).await?;
                    change.remove.extend(nested.remove);
                    change.add.extend(nested.add);
                }
                (Some(old), Some(new)) if old != new => {
                    change.remove.insert(path.clone(), old);
                    change.add.insert(path, new);
                }
                _ => {}
            }
        }
        Ok(change)
    }
    .boxed()
}
