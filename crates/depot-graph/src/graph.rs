//! The commit graph and its branch pointers.
//!
//! Commits are content-addressed JSON records. Each carries a `jump`
//! pointer chosen at creation so that the jump depths form a skew-binary
//! ladder: from any commit, every older depth is reachable in a
//! logarithmic number of jump or parent steps. [`VersionGraph::ancestor`]
//! and [`VersionGraph::lca`] both walk that ladder.
//!
//! Branch pointers are the only mutable state. A forward push compares
//! the stored head against the new one and writes without further
//! coordination, so two writers racing on one branch are the caller's
//! concern.

use std::sync::Arc;

use depot_kv::{KeyValueStore, KvError, ListOptions};
use depot_store::{open_store, ContentStore, ContentStoreExt};
use depot_tree::{write_tree, Tree, TreeError, WorkingTree};
use depot_types::{Blob, Bytes, Hash};
use tracing::{debug, info};

use crate::branch::{BranchName, MergeStrategy, BRANCH_NAMESPACE};
use crate::commit::{Commit, LogEntry};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};

/// Commit graph over a content store and a key-value substrate.
pub struct VersionGraph {
    pub(crate) store: Arc<dyn ContentStore>,
    kv: Arc<dyn KeyValueStore>,
    pub(crate) config: GraphConfig,
}

impl VersionGraph {
    /// Open a graph on `kv`, with the content store `config` selects.
    pub fn new(kv: Arc<dyn KeyValueStore>, config: GraphConfig) -> Self {
        let store = open_store(&config.store, kv.clone());
        Self { store, kv, config }
    }

    /// Open a graph over an existing content store.
    pub fn with_store(
        store: Arc<dyn ContentStore>,
        kv: Arc<dyn KeyValueStore>,
        config: GraphConfig,
    ) -> Self {
        Self { store, kv, config }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------

    /// Read a commit. The empty head has none.
    pub async fn commit(&self, hash: Option<Hash<Commit>>) -> GraphResult<Commit> {
        match hash {
            Some(hash) => self.load(hash).await,
            None => Err(GraphError::Genesis),
        }
    }

    pub(crate) async fn load(&self, hash: Hash<Commit>) -> GraphResult<Commit> {
        let blob = self.store.read_typed(hash).await?;
        blob.parse_json()
            .map_err(|e| GraphError::Corrupt(format!("commit {}: {e}", hash.short_hex())))
    }

    /// Root tree of a commit; `None` for the empty head.
    pub async fn tree(&self, hash: Option<Hash<Commit>>) -> GraphResult<Option<Hash<Tree>>> {
        match hash {
            Some(hash) => Ok(Some(self.load(hash).await?.tree)),
            None => Ok(None),
        }
    }

    /// Parent of a commit; `None` for a root commit or the empty head.
    pub async fn parent(&self, hash: Option<Hash<Commit>>) -> GraphResult<Option<Hash<Commit>>> {
        match hash {
            Some(hash) => Ok(self.load(hash).await?.parent),
            None => Ok(None),
        }
    }

    /// Create a commit of `tree` on top of `parent`.
    pub async fn commit_tree(
        &self,
        parent: Option<Hash<Commit>>,
        tree: Hash<Tree>,
        message: Option<String>,
    ) -> GraphResult<Hash<Commit>> {
        let (depth, jump) = match parent {
            None => (1, None),
            Some(parent) => {
                let p = self.load(parent).await?;
                (p.depth + 1, Some(self.choose_jump(parent, &p).await?))
            }
        };

        let commit = Commit {
            parent,
            jump,
            tree,
            depth,
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        let blob: Blob<Commit> = Blob::json(&commit).map_err(|e| GraphError::Corrupt(e.to_string()))?;
        let hash = self.store.write_typed(blob).await?;
        debug!(commit = %hash.short_hex(), depth, tree = %tree.short_hex(), "created commit");
        Ok(hash)
    }

    /// Skip pointer for a child of `parent`.
    ///
    /// The parent's own jump is reused when the parent and its jump target
    /// span the same number of generations as the target's jump does.
    async fn choose_jump(&self, parent: Hash<Commit>, p: &Commit) -> GraphResult<Hash<Commit>> {
        let Some(sp_hash) = p.jump else {
            return Ok(parent);
        };
        let sp = self.load(sp_hash).await?;
        let Some(sp_jump) = sp.jump else {
            return Ok(parent);
        };
        let gap = sp.depth - self.load(sp_jump).await?.depth;
        if gap == p.depth - sp.depth {
            Ok(sp_jump)
        } else {
            Ok(parent)
        }
    }

    /// Write a working tree and commit it. An empty working tree commits
    /// the empty tree.
    pub async fn commit_working(
        &self,
        parent: Option<Hash<Commit>>,
        working: &WorkingTree,
        message: Option<String>,
    ) -> GraphResult<Hash<Commit>> {
        let tree = match working.push().await {
            Ok(tree) => tree,
            Err(TreeError::EmptyDirectory) => self.empty_tree().await?,
            Err(e) => return Err(e.into()),
        };
        self.commit_tree(parent, tree, message).await
    }

    pub(crate) async fn empty_tree(&self) -> GraphResult<Hash<Tree>> {
        Ok(write_tree(&*self.store, &Tree::new(), None).await?)
    }

    /// Open a working tree on a commit's snapshot.
    pub async fn working(&self, head: Option<Hash<Commit>>) -> GraphResult<WorkingTree> {
        let tree = self.tree(head).await?;
        Ok(WorkingTree::new(self.store.clone(), tree))
    }

    /// Read one file as of `commit`.
    pub async fn read_file(&self, commit: Hash<Commit>, path: &str) -> GraphResult<Bytes> {
        let working = self.working(Some(commit)).await?;
        Ok(working.read(path).await?)
    }

    /// Find the commit whose hash starts with `prefix`.
    pub async fn resolve_commit(&self, prefix: &str) -> GraphResult<Hash<Commit>> {
        Ok(self.store.resolve_typed(prefix).await?)
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Climb from `commit` to its ancestor at depth `target`.
    async fn climb(
        &self,
        mut hash: Hash<Commit>,
        mut commit: Commit,
        target: u64,
    ) -> GraphResult<(Hash<Commit>, Commit)> {
        while commit.depth > target {
            if let Some(jump) = commit.jump {
                let candidate = self.load(jump).await?;
                if candidate.depth >= target {
                    hash = jump;
                    commit = candidate;
                    continue;
                }
            }
            let parent = commit.parent.ok_or_else(|| {
                GraphError::Corrupt(format!(
                    "commit {} at depth {} has no parent",
                    hash.short_hex(),
                    commit.depth
                ))
            })?;
            commit = self.load(parent).await?;
            hash = parent;
        }
        Ok((hash, commit))
    }

    /// The ancestor `level` generations above `hash`, if history is that deep.
    pub async fn ancestor(
        &self,
        hash: Option<Hash<Commit>>,
        level: u64,
    ) -> GraphResult<Option<Hash<Commit>>> {
        let Some(hash) = hash else {
            return Ok(None);
        };
        let commit = self.load(hash).await?;
        if level >= commit.depth {
            return Ok(None);
        }
        let target = commit.depth - level;
        let (found, _) = self.climb(hash, commit, target).await?;
        Ok(Some(found))
    }

    /// Up to `level` entries of history, starting with `hash` itself.
    pub async fn log(&self, hash: Option<Hash<Commit>>, level: usize) -> GraphResult<Vec<LogEntry>> {
        let mut entries = Vec::new();
        let mut cursor = hash;
        while let Some(hash) = cursor {
            if entries.len() >= level {
                break;
            }
            let commit = self.load(hash).await?;
            entries.push(LogEntry {
                hash,
                message: commit.message,
                timestamp: commit.timestamp,
            });
            cursor = commit.parent;
        }
        Ok(entries)
    }

    /// Lowest common ancestor of two commits.
    pub async fn lca(
        &self,
        left: Option<Hash<Commit>>,
        right: Option<Hash<Commit>>,
    ) -> GraphResult<Option<Hash<Commit>>> {
        let (Some(left), Some(right)) = (left, right) else {
            return Ok(None);
        };
        if left == right {
            return Ok(Some(left));
        }

        let l = self.load(left).await?;
        let r = self.load(right).await?;
        let ((mut left, mut l), (mut right, mut r)) = if l.depth > r.depth {
            let depth = r.depth;
            (self.climb(left, l, depth).await?, (right, r))
        } else {
            let depth = l.depth;
            ((left, l), self.climb(right, r, depth).await?)
        };

        while left != right {
            match (l.jump, r.jump) {
                (Some(lj), Some(rj)) if lj != rj => {
                    l = self.load(lj).await?;
                    r = self.load(rj).await?;
                    left = lj;
                    right = rj;
                }
                _ => match (l.parent, r.parent) {
                    (Some(lp), Some(rp)) => {
                        l = self.load(lp).await?;
                        r = self.load(rp).await?;
                        left = lp;
                        right = rp;
                    }
                    _ => return Ok(None),
                },
            }
        }
        Ok(Some(left))
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Current head of `branch`, if it has been pushed.
    pub async fn head(&self, branch: &BranchName) -> GraphResult<Option<Hash<Commit>>> {
        match self.kv.get(&branch.key()).await {
            Ok(blob) => decode_pointer(branch, &blob).map(Some),
            Err(KvError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every branch with its head, in name order.
    pub async fn branches(&self) -> GraphResult<Vec<(BranchName, Hash<Commit>)>> {
        let prefix = depot_kv::Key::new([BRANCH_NAMESPACE, ""]);
        let mut branches = Vec::new();
        for (key, blob) in self.kv.list(&prefix, ListOptions::default()).await? {
            if let Some(name) = BranchName::from_key(&key) {
                let head = decode_pointer(&name, &blob)?;
                branches.push((name, head));
            }
        }
        Ok(branches)
    }

    /// Move `branch` to `head`.
    ///
    /// `Forward` only accepts a descendant of the current head (or any head
    /// for a new branch); `Replace` always overwrites. The remaining
    /// strategies fail with [`GraphError::UnsupportedStrategy`].
    pub async fn push(
        &self,
        branch: &BranchName,
        head: Hash<Commit>,
        strategy: MergeStrategy,
    ) -> GraphResult<()> {
        match strategy {
            MergeStrategy::Forward => {
                if let Some(current) = self.head(branch).await? {
                    let lca = self.lca(Some(current), Some(head)).await?;
                    if lca != Some(current) {
                        return Err(GraphError::Diverged {
                            branch: branch.to_string(),
                            current,
                            attempted: head,
                            lca,
                        });
                    }
                }
            }
            MergeStrategy::Replace => {}
            other => return Err(GraphError::UnsupportedStrategy(other)),
        }

        self.kv.set(&branch.key(), Blob::new(head.to_hex())).await?;
        info!(%branch, head = %head.short_hex(), %strategy, "moved branch");
        Ok(())
    }

    /// Push with the configured default strategy.
    pub async fn advance(&self, branch: &BranchName, head: Hash<Commit>) -> GraphResult<()> {
        self.push(branch, head, self.config.default_strategy).await
    }

    /// Commit `ancestor`'s snapshot on top of `branch` and push it.
    pub async fn revert(
        &self,
        branch: &BranchName,
        ancestor: Hash<Commit>,
    ) -> GraphResult<Hash<Commit>> {
        let head = self
            .head(branch)
            .await?
            .ok_or_else(|| GraphError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        if self.lca(Some(head), Some(ancestor)).await? != Some(ancestor) {
            return Err(GraphError::NotAncestor { ancestor, head });
        }

        let tree = self.load(ancestor).await?.tree;
        let message = format!("{} {}", self.config.revert_message, ancestor.short_hex());
        let commit = self.commit_tree(Some(head), tree, Some(message)).await?;
        self.push(branch, commit, MergeStrategy::Forward).await?;
        info!(%branch, target = %ancestor.short_hex(), "reverted branch");
        Ok(commit)
    }
}

fn decode_pointer(branch: &BranchName, blob: &Blob) -> GraphResult<Hash<Commit>> {
    let text = blob
        .text()
        .ok_or_else(|| GraphError::Corrupt(format!("branch {branch} pointer is not text")))?;
    Hash::from_hex(text.trim())
        .map_err(|e| GraphError::Corrupt(format!("branch {branch} pointer: {e}")))
}
