//! Copy-on-write staging over one tree.
//!
//! A [`WorkingTree`] starts from a stored tree hash (or nothing) and loads
//! directories and file bodies only when a path through them is touched.
//! Every load is single-flight: concurrent callers asking for the same
//! unloaded node share one fetch. Writes and deletes clear the cached hash
//! of every directory on the path and remember the hash each node had on
//! disk, which [`WorkingTree::push`] passes to the content store as a
//! delta-compression hint.
//!
//! Directory state lives behind a short `std::sync::Mutex`; no guard is
//! ever held across an `.await`. That is what makes "create this
//! directory if absent" a plain check-and-insert that concurrent writers
//! cannot interleave.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use depot_store::{ContentStore, ContentStoreExt};
use depot_types::{Blob, Bytes, Hash};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::codec::{read_tree, write_tree};
use crate::error::{TreeError, TreeResult};
use crate::node::{join_path, split_path, Node, NodeKind, Tree};

#[derive(Clone)]
enum WorkingNode {
    Blob(Arc<WorkingBlob>),
    Dir(Arc<WorkingDir>),
}

impl WorkingNode {
    fn from_node(node: &Node) -> Self {
        match *node {
            Node::Blob { hash } => Self::Blob(Arc::new(WorkingBlob::stored(hash))),
            Node::Tree { hash } => Self::Dir(Arc::new(WorkingDir::lazy(hash))),
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Self::Blob(_) => NodeKind::Blob,
            Self::Dir(_) => NodeKind::Tree,
        }
    }
}

/// A file. Its content hash is always known; the body is loaded on demand.
struct WorkingBlob {
    hash: Hash<Bytes>,
    body: OnceCell<Bytes>,
    /// On-disk revision this one replaces.
    parent: Option<Hash<Bytes>>,
    flushed: AtomicBool,
}

impl WorkingBlob {
    fn stored(hash: Hash<Bytes>) -> Self {
        Self {
            hash,
            body: OnceCell::new(),
            parent: None,
            flushed: AtomicBool::new(true),
        }
    }

    fn staged(body: Bytes, parent: Option<Hash<Bytes>>) -> Self {
        Self {
            hash: Hash::of(&body),
            body: OnceCell::new_with(Some(body)),
            parent,
            flushed: AtomicBool::new(false),
        }
    }

    /// The hint a replacement of this blob should carry.
    fn disk_revision(&self) -> Option<Hash<Bytes>> {
        if self.flushed.load(Ordering::Acquire) {
            Some(self.hash)
        } else {
            self.parent
        }
    }

    async fn load(&self, store: &dyn ContentStore) -> TreeResult<Bytes> {
        let body = self
            .body
            .get_or_try_init(|| async {
                let blob = store.read_typed(self.hash).await?;
                blob.into_body().ok_or_else(|| TreeError::NotFound {
                    path: self.hash.to_hex(),
                })
            })
            .await?;
        Ok(body.clone())
    }
}

struct DirState {
    /// Stored hash; `None` while dirty.
    hash: Option<Hash<Tree>>,
    /// On-disk revision, recorded on the first mutation after a flush.
    parent: Option<Hash<Tree>>,
    children: BTreeMap<String, WorkingNode>,
    /// Bumped on every mutation; a push only caches its hash if unchanged.
    version: u64,
}

struct WorkingDir {
    loaded: OnceCell<()>,
    state: Mutex<DirState>,
}

impl WorkingDir {
    fn lazy(hash: Hash<Tree>) -> Self {
        Self {
            loaded: OnceCell::new(),
            state: Mutex::new(DirState {
                hash: Some(hash),
                parent: None,
                children: BTreeMap::new(),
                version: 0,
            }),
        }
    }

    fn empty() -> Self {
        Self {
            loaded: OnceCell::new_with(Some(())),
            state: Mutex::new(DirState {
                hash: None,
                parent: None,
                children: BTreeMap::new(),
                version: 0,
            }),
        }
    }

    fn lock(&self) -> TreeResult<MutexGuard<'_, DirState>> {
        self.state.lock().map_err(|_| TreeError::Poisoned)
    }

    async fn hydrate(&self, store: &dyn ContentStore) -> TreeResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                let hash = self.lock()?.hash;
                if let Some(hash) = hash {
                    let tree = read_tree(store, hash).await?;
                    let mut state = self.lock()?;
                    for (name, node) in tree.iter() {
                        state
                            .children
                            .entry(name.clone())
                            .or_insert_with(|| WorkingNode::from_node(node));
                    }
                }
                Ok::<_, TreeError>(())
            })
            .await?;
        Ok(())
    }

    fn mark_dirty(state: &mut DirState) {
        if let Some(hash) = state.hash.take() {
            state.parent.get_or_insert(hash);
        }
        state.version += 1;
    }
}

/// Mutable staging view over a stored tree.
pub struct WorkingTree {
    store: Arc<dyn ContentStore>,
    base: Option<Hash<Tree>>,
    root: Arc<WorkingDir>,
    push_lock: tokio::sync::Mutex<()>,
}

impl WorkingTree {
    /// Stage on top of `base`, or on an empty tree.
    pub fn new(store: Arc<dyn ContentStore>, base: Option<Hash<Tree>>) -> Self {
        let root = match base {
            Some(hash) => WorkingDir::lazy(hash),
            None => WorkingDir::empty(),
        };
        Self {
            store,
            base,
            root: Arc::new(root),
            push_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The tree this working tree was opened on.
    pub fn base(&self) -> Option<Hash<Tree>> {
        self.base
    }

    /// Returns `true` if there are staged changes not yet pushed.
    pub fn is_dirty(&self) -> TreeResult<bool> {
        let root = self.root.lock()?;
        Ok(root.hash.is_none() && root.version > 0)
    }

    /// Walk to the directory at `segments`, optionally creating missing ones.
    /// Returns every directory on the way, root first.
    async fn walk(&self, segments: &[&str], create: bool) -> TreeResult<Vec<Arc<WorkingDir>>> {
        let mut chain = vec![self.root.clone()];
        for (depth, segment) in segments.iter().enumerate() {
            let dir = chain[chain.len() - 1].clone();
            dir.hydrate(&*self.store).await?;
            let next = {
                let mut state = dir.lock()?;
                match state.children.get(*segment) {
                    Some(WorkingNode::Dir(child)) => child.clone(),
                    Some(WorkingNode::Blob(_)) => {
                        return Err(TreeError::UnexpectedKind {
                            path: join_path(&segments[..=depth]),
                            expected: NodeKind::Tree,
                            found: NodeKind::Blob,
                        })
                    }
                    None if create => {
                        let child = Arc::new(WorkingDir::empty());
                        state
                            .children
                            .insert(segment.to_string(), WorkingNode::Dir(child.clone()));
                        child
                    }
                    None => {
                        return Err(TreeError::NotFound {
                            path: join_path(&segments[..=depth]),
                        })
                    }
                }
            };
            chain.push(next);
        }
        let last = chain[chain.len() - 1].clone();
        last.hydrate(&*self.store).await?;
        Ok(chain)
    }

    async fn child(&self, path: &str) -> TreeResult<Option<WorkingNode>> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Ok(Some(WorkingNode::Dir(self.root.clone())));
        };
        let chain = self.walk(parents, false).await?;
        let dir = &chain[chain.len() - 1];
        let child = dir.lock()?.children.get(*name).cloned();
        Ok(child)
    }

    /// Kind of the node at `path`. The empty path is the root directory.
    pub async fn find(&self, path: &str) -> TreeResult<NodeKind> {
        match self.child(path).await? {
            Some(node) => Ok(node.kind()),
            None => Err(TreeError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Names in the directory at `path`, sorted.
    pub async fn list(&self, path: &str) -> TreeResult<Vec<String>> {
        let segments = split_path(path)?;
        let chain = self.walk(&segments, false).await?;
        let dir = &chain[chain.len() - 1];
        let names = dir.lock()?.children.keys().cloned().collect();
        Ok(names)
    }

    /// Body of the file at `path`.
    pub async fn read(&self, path: &str) -> TreeResult<Bytes> {
        match self.child(path).await? {
            Some(WorkingNode::Blob(blob)) => blob.load(&*self.store).await,
            Some(WorkingNode::Dir(_)) => Err(TreeError::UnexpectedKind {
                path: path.to_string(),
                expected: NodeKind::Blob,
                found: NodeKind::Tree,
            }),
            None => Err(TreeError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Stage `body` at `path`, creating intermediate directories.
    pub async fn write(&self, path: &str, body: impl Into<Bytes>) -> TreeResult<()> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Err(TreeError::InvalidPath("cannot write the root".to_string()));
        };
        let chain = self.walk(parents, true).await?;
        let staged = WorkingBlob::staged(body.into(), None);

        {
            let mut state = chain[chain.len() - 1].lock()?;
            let parent = match state.children.get(*name) {
                Some(WorkingNode::Dir(_)) => {
                    return Err(TreeError::UnexpectedKind {
                        path: path.to_string(),
                        expected: NodeKind::Blob,
                        found: NodeKind::Tree,
                    })
                }
                Some(WorkingNode::Blob(existing)) if existing.hash == staged.hash => return Ok(()),
                Some(WorkingNode::Blob(existing)) => existing.disk_revision(),
                None => None,
            };
            let staged = WorkingBlob { parent, ..staged };
            state
                .children
                .insert(name.to_string(), WorkingNode::Blob(Arc::new(staged)));
            WorkingDir::mark_dirty(&mut state);
        }
        self.dirty_ancestors(&chain)?;
        debug!(path, "staged write");
        Ok(())
    }

    /// Remove the node at `path`. Absent paths are a no-op, including
    /// paths that run through a file.
    pub async fn delete(&self, path: &str) -> TreeResult<()> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Err(TreeError::InvalidPath("cannot delete the root".to_string()));
        };
        let chain = match self.walk(parents, false).await {
            Ok(chain) => chain,
            Err(TreeError::NotFound { .. } | TreeError::UnexpectedKind { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        {
            let mut state = chain[chain.len() - 1].lock()?;
            if state.children.remove(*name).is_none() {
                return Ok(());
            }
            WorkingDir::mark_dirty(&mut state);
        }
        self.dirty_ancestors(&chain)?;
        debug!(path, "staged delete");
        Ok(())
    }

    /// Dirty every directory above the last one in `chain`, bottom up.
    fn dirty_ancestors(&self, chain: &[Arc<WorkingDir>]) -> TreeResult<()> {
        for dir in chain.iter().rev().skip(1) {
            WorkingDir::mark_dirty(&mut *dir.lock()?);
        }
        Ok(())
    }

    /// Write every staged change and return the new root tree hash.
    ///
    /// Pushes run one at a time in call order. Fails with
    /// [`TreeError::EmptyDirectory`] if nothing is left in the tree.
    pub async fn push(&self) -> TreeResult<Hash<Tree>> {
        let _turn = self.push_lock.lock().await;
        let hash = push_dir(self.store.clone(), self.root.clone()).await?;
        debug!(tree = %hash.short_hex(), "pushed working tree");
        Ok(hash)
    }
}

fn push_node(store: Arc<dyn ContentStore>, node: WorkingNode) -> BoxFuture<'static, TreeResult<Node>> {
    async move {
        match node {
            WorkingNode::Blob(blob) => push_blob(&*store, &blob).await.map(Node::blob),
            WorkingNode::Dir(dir) => push_dir(store, dir).await.map(Node::tree),
        }
    }
    .boxed()
}

async fn push_blob(store: &dyn ContentStore, blob: &WorkingBlob) -> TreeResult<Hash<Bytes>> {
    if blob.flushed.load(Ordering::Acquire) {
        return Ok(blob.hash);
    }
    let body = blob.load(store).await?;
    let hash = store
        .write_typed(Blob::<Bytes>::new(body).with_parent(blob.parent))
        .await?;
    blob.flushed.store(true, Ordering::Release);
    Ok(hash)
}

async fn push_dir(store: Arc<dyn ContentStore>, dir: Arc<WorkingDir>) -> TreeResult<Hash<Tree>> {
    let (children, version, parent) = {
        let state = dir.lock()?;
        if let Some(hash) = state.hash {
            return Ok(hash);
        }
        (state.children.clone(), state.version, state.parent)
    };

    let pushed = try_join_all(children.into_iter().map(|(name, node)| {
        let store = store.clone();
        async move {
            match push_node(store, node).await {
                Ok(node) => Ok(Some((name, node))),
                Err(TreeError::EmptyDirectory) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }))
    .await?;

    let mut tree = Tree::new();
    for (name, node) in pushed.into_iter().flatten() {
        tree.insert(name, node)?;
    }
    if tree.is_empty() {
        return Err(TreeError::EmptyDirectory);
    }

    let hash = write_tree(&*store, &tree, parent).await?;
    let mut state = dir.lock()?;
    if state.version == version {
        state.hash = Some(hash);
        state.parent = None;
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use depot_kv::{InMemoryKeyValueStore, Key, KeyValueStore, KvResult, ListOptions};
    use depot_store::{DeltaChainStore, PlainStore};

    fn store() -> Arc<dyn ContentStore> {
        Arc::new(PlainStore::new(Arc::new(InMemoryKeyValueStore::new())))
    }

    /// Substrate that counts reads and yields to the runtime on every call.
    #[derive(Default)]
    struct SlowKv {
        inner: InMemoryKeyValueStore,
        gets: AtomicUsize,
    }

    impl SlowKv {
        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for SlowKv {
        async fn get(&self, key: &Key) -> KvResult<Blob> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &Key, blob: Blob) -> KvResult<()> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.inner.set(key, blob).await
        }

        async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<(Key, Blob)>> {
            self.inner.list(prefix, options).await
        }

        async fn delete(&self, key: &Key) -> KvResult<bool> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn write_read_and_list() {
        let tree = WorkingTree::new(store(), None);
        tree.write("src/lib.rs", "pub fn x() {}").await.unwrap();
        tree.write("README", "hello").await.unwrap();

        assert_eq!(tree.read("src/lib.rs").await.unwrap(), "pub fn x() {}");
        assert_eq!(tree.list("").await.unwrap(), vec!["README", "src"]);
        assert_eq!(tree.find("src").await.unwrap(), NodeKind::Tree);
        assert_eq!(tree.find("README").await.unwrap(), NodeKind::Blob);
        assert!(tree.find("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn kind_mismatches_are_reported() {
        let tree = WorkingTree::new(store(), None);
        tree.write("file", "x").await.unwrap();
        let err = tree.write("file/inner", "y").await.unwrap_err();
        assert!(matches!(
            err,
            TreeError::UnexpectedKind {
                expected: NodeKind::Tree,
                found: NodeKind::Blob,
                ..
            }
        ));
        tree.write("dir/a", "y").await.unwrap();
        assert!(matches!(
            tree.read("dir").await.unwrap_err(),
            TreeError::UnexpectedKind { .. }
        ));
    }

    #[tokio::test]
    async fn push_then_reopen_lazily() {
        let store = store();
        let tree = WorkingTree::new(store.clone(), None);
        tree.write("a/b/c.txt", "deep").await.unwrap();
        tree.write("top.txt", "shallow").await.unwrap();
        assert!(tree.is_dirty().unwrap());
        let hash = tree.push().await.unwrap();
        assert!(!tree.is_dirty().unwrap());

        let reopened = WorkingTree::new(store, Some(hash));
        assert_eq!(reopened.base(), Some(hash));
        assert_eq!(reopened.read("a/b/c.txt").await.unwrap(), "deep");
        assert_eq!(reopened.push().await.unwrap(), hash);
    }

    #[tokio::test]
    async fn identical_write_is_noop() {
        let store = store();
        let tree = WorkingTree::new(store.clone(), None);
        tree.write("f", "same").await.unwrap();
        let hash = tree.push().await.unwrap();

        let reopened = WorkingTree::new(store, Some(hash));
        reopened.write("f", "same").await.unwrap();
        assert!(!reopened.is_dirty().unwrap());
    }

    #[tokio::test]
    async fn insertion_order_does_not_change_hash() {
        let store = store();
        let first = WorkingTree::new(store.clone(), None);
        let second = WorkingTree::new(store, None);
        for (path, body) in [("x/1", "one"), ("y", "two"), ("x/2", "three")] {
            first.write(path, body).await.unwrap();
        }
        for (path, body) in [("x/2", "three"), ("x/1", "one"), ("y", "two")] {
            second.write(path, body).await.unwrap();
        }
        assert_eq!(first.push().await.unwrap(), second.push().await.unwrap());
    }

    #[tokio::test]
    async fn deleting_last_file_prunes_directory() {
        let store = store();
        let tree = WorkingTree::new(store.clone(), None);
        tree.write("keep", "k").await.unwrap();
        tree.write("gone/only", "x").await.unwrap();
        tree.push().await.unwrap();

        tree.delete("gone/only").await.unwrap();
        tree.delete("never/was").await.unwrap();
        let hash = tree.push().await.unwrap();

        let reopened = WorkingTree::new(store, Some(hash));
        assert_eq!(reopened.list("").await.unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn empty_root_push_fails() {
        let tree = WorkingTree::new(store(), None);
        assert!(matches!(tree.push().await, Err(TreeError::EmptyDirectory)));
        tree.write("a/b", "x").await.unwrap();
        tree.delete("a/b").await.unwrap();
        assert!(matches!(tree.push().await, Err(TreeError::EmptyDirectory)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_directory_creation_loses_nothing() {
        let tree = Arc::new(WorkingTree::new(store(), None));
        let writes = (0..50).map(|i| {
            let tree = tree.clone();
            tokio::spawn(async move { tree.write(&format!("fresh/file{i:02}"), format!("{i}")).await })
        });
        for handle in futures::future::join_all(writes).await {
            handle.unwrap().unwrap();
        }
        assert_eq!(tree.list("fresh").await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn overlapping_pushes_run_in_call_order() {
        let store: Arc<dyn ContentStore> = Arc::new(PlainStore::new(Arc::new(SlowKv::default())));
        let tree = WorkingTree::new(store.clone(), None);
        tree.write("one", "1").await.unwrap();

        // The first push is still writing when "two" is staged and the
        // second push is issued.
        let (first, (), second) = tokio::join!(
            tree.push(),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                tree.write("two", "2").await.unwrap();
            },
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                tree.push().await
            }
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        let listed = |hash| {
            let reopened = WorkingTree::new(store.clone(), Some(hash));
            async move { reopened.list("").await.unwrap() }
        };
        assert_eq!(listed(first).await, vec!["one"]);
        assert_eq!(listed(second).await, vec!["one", "two"]);
        assert!(!tree.is_dirty().unwrap());
    }

    #[tokio::test]
    async fn concurrent_readers_share_hydration() {
        let kv = Arc::new(SlowKv::default());
        let store: Arc<dyn ContentStore> = Arc::new(PlainStore::new(kv.clone()));
        let tree = WorkingTree::new(store.clone(), None);
        tree.write("d/f", "body").await.unwrap();
        tree.write("d/g", "other").await.unwrap();
        let hash = tree.push().await.unwrap();

        let reopened = WorkingTree::new(store, Some(hash));
        let before = kv.gets();
        let reads = (0..20).map(|_| reopened.read("d/f"));
        for body in futures::future::join_all(reads).await {
            assert_eq!(body.unwrap(), "body");
        }
        // Root tree, `d`, and the file itself: one fetch each.
        assert_eq!(kv.gets() - before, 3);
    }

    #[tokio::test]
    async fn fresh_tree_is_clean_until_written() {
        let tree = WorkingTree::new(store(), None);
        assert!(!tree.is_dirty().unwrap());
        tree.write("a", "x").await.unwrap();
        assert!(tree.is_dirty().unwrap());
    }

    #[tokio::test]
    async fn deleting_through_a_file_is_a_noop() {
        let tree = WorkingTree::new(store(), None);
        tree.write("file", "x").await.unwrap();
        tree.delete("file/inner").await.unwrap();
        assert_eq!(tree.read("file").await.unwrap(), "x");
    }

    #[tokio::test]
    async fn rewrites_chain_against_previous_revision() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let chain = Arc::new(DeltaChainStore::new(kv));
        let tree = WorkingTree::new(chain.clone(), None);

        tree.write("log.txt", "line 1\n").await.unwrap();
        tree.push().await.unwrap();
        tree.write("log.txt", "line 1\nline 2\n").await.unwrap();
        tree.write("log.txt", "line 1\nline 2\nline 3\n").await.unwrap();
        let root = tree.push().await.unwrap();

        let hash: Hash = Hash::of(b"line 1\nline 2\nline 3\n");
        let pack = chain.read_pack(&hash).await.unwrap();
        assert_eq!(pack.depth, 2);
        assert_eq!(pack.parent, Some(Hash::of(b"line 1\n")));
        assert_eq!(chain.read_pack(&root).await.unwrap().depth, 2);
    }
}
