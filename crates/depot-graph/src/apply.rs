//! Applying a change set on top of a commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use depot_store::ContentStore;
use depot_tree::{read_tree, split_path, write_tree, Node, Tree, TreeError};
use depot_types::Hash;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::change::Change3;
use crate::commit::Commit;
use crate::error::{GraphError, GraphResult};
use crate::graph::VersionGraph;

impl VersionGraph {
    /// Commit the result of applying `change` to `head`'s snapshot.
    ///
    /// Fails with [`GraphError::Conflict`] before writing anything if the
    /// change carries a conflict. Directories left empty are pruned; if
    /// nothing remains the commit gets the empty tree.
    pub async fn apply(
        &self,
        head: Option<Hash<Commit>>,
        change: &Change3,
        message: Option<String>,
    ) -> GraphResult<Hash<Commit>> {
        if let Some(path) = change.conflict.keys().next() {
            return Err(GraphError::Conflict { path: path.clone() });
        }

        let mut ops = DirOps::default();
        for path in change.remove.keys() {
            let (dir, name) = ops.locate(path)?;
            dir.remove.insert(name);
        }
        for (path, node) in &change.add {
            let (dir, name) = ops.locate(path)?;
            dir.add.insert(name, *node);
        }

        let base = self.tree(head).await?;
        let tree = match apply_dir(self.store.clone(), base, ops).await {
            Ok(tree) => tree,
            Err(GraphError::Tree(TreeError::EmptyDirectory)) => self.empty_tree().await?,
            Err(e) => return Err(e),
        };
        debug!(
            removed = change.remove.len(),
            added = change.add.len(),
            tree = %tree.short_hex(),
            "applied change"
        );
        self.commit_tree(head, tree, message).await
    }
}

/// Edits for one directory, plus those for its subdirectories.
#[derive(Default)]
struct DirOps {
    remove: BTreeSet<String>,
    add: BTreeMap<String, Node>,
    nested: BTreeMap<String, DirOps>,
}

impl DirOps {
    /// The directory holding `path`'s last segment, and that segment.
    fn locate(&mut self, path: &str) -> GraphResult<(&mut DirOps, String)> {
        let segments = split_path(path)?;
        let Some((last, dirs)) = segments.split_last() else {
            return Err(TreeError::InvalidPath(format!("cannot edit the root: {path:?}")).into());
        };
        let mut dir = self;
        for segment in dirs {
            dir = dir.nested.entry(segment.to_string()).or_default();
        }
        Ok((dir, last.to_string()))
    }

    fn adds_anything(&self) -> bool {
        !self.add.is_empty() || self.nested.values().any(DirOps::adds_anything)
    }
}

fn apply_dir(
    store: Arc<dyn ContentStore>,
    base: Option<Hash<Tree>>,
    ops: DirOps,
) -> BoxFuture<'static, GraphResult<Hash<Tree>>> {
    async move {
        let mut tree = match base {
            Some(hash) => read_tree(&*store, hash).await?,
            None => Tree::new(),
        };
        for name in &ops.remove {
            tree.remove(name);
        }
        for (name, node) in ops.add {
            tree.insert(name, node)?;
        }

        for (name, sub) in ops.nested {
            let child = match tree.get(&name) {
                Some(Node::Tree { hash }) => Some(*hash),
                _ => None,
            };
            if child.is_none() && !sub.adds_anything() {
                continue;
            }
            match apply_dir(store.clone(), child, sub).await {
                Ok(hash) => {
                    tree.insert(name, Node::tree(hash))?;
                }
                Err(GraphError::Tree(TreeError::EmptyDirectory)) => {
                    tree.remove(&name);
                }
                Err(e) => return Err(e),
            }
        }

        if tree.is_empty() {
            return Err(TreeError::EmptyDirectory.into());
        }
        Ok(write_tree(&*store, &tree, base).await?)
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use depot_kv::InMemoryKeyValueStore;

    fn graph() -> VersionGraph {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        VersionGraph::new(Arc::new(InMemoryKeyValueStore::new()), GraphConfig::default())
    }

    async fn snapshot(
        graph: &VersionGraph,
        parent: Option<Hash<Commit>>,
        writes: &[(&str, &str)],
        deletes: &[&str],
    ) -> Hash<Commit> {
        let working = graph.working(parent).await.unwrap();
        for (path, body) in writes {
            working.write(path, body.to_string()).await.unwrap();
        }
        for path in deletes {
            working.delete(path).await.unwrap();
        }
        graph.commit_working(parent, &working, None).await.unwrap()
    }

    async fn text(graph: &VersionGraph, commit: Hash<Commit>, path: &str) -> String {
        let bytes = graph.read_file(commit, path).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn applying_a_diff_reproduces_the_target() {
        let graph = graph();
        let one = snapshot(&graph, None, &[("a.txt", "hello\n"), ("dir/b.txt", "b\n")], &[]).await;
        let two = snapshot(
            &graph,
            Some(one),
            &[("a.txt", "hello world\n"), ("dir/c.txt", "c\n"), ("new/deep/d", "d")],
            &[],
        )
        .await;

        let change = graph.diff(Some(one), Some(two)).await.unwrap();
        let applied = graph
            .apply(Some(one), &change, Some("replay".into()))
            .await
            .unwrap();

        assert_eq!(graph.tree(Some(applied)).await.unwrap(), graph.tree(Some(two)).await.unwrap());
        assert_eq!(text(&graph, applied, "a.txt").await, "hello world\n");
        assert_eq!(text(&graph, applied, "new/deep/d").await, "d");
        let commit = graph.commit(Some(applied)).await.unwrap();
        assert_eq!(commit.parent, Some(one));
        assert_eq!(commit.message.as_deref(), Some("replay"));
    }

    #[tokio::test]
    async fn two_way_changes_apply_with_deletions() {
        let graph = graph();
        let one = snapshot(
            &graph,
            None,
            &[("keep", "k"), ("old/x", "x"), ("src/a", "a"), ("src/b", "b")],
            &[],
        )
        .await;
        let two = snapshot(&graph, Some(one), &[("src/a", "A")], &["old/x", "src/b"]).await;

        let change = graph.diff2(Some(one), Some(two)).await.unwrap();
        let applied = graph.apply(Some(one), &change.into(), None).await.unwrap();

        assert_eq!(graph.tree(Some(applied)).await.unwrap(), graph.tree(Some(two)).await.unwrap());
        let working = graph.working(Some(applied)).await.unwrap();
        assert_eq!(working.list("").await.unwrap(), vec!["keep", "src"]);
        assert_eq!(working.list("src").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn merged_text_lands_in_the_commit() {
        let graph = graph();
        let base = snapshot(&graph, None, &[("f", "shared\nline\n")], &[]).await;
        let left = snapshot(&graph, Some(base), &[("f", "shared\nleft\n")], &[]).await;
        let right = snapshot(&graph, Some(base), &[("f", "shared\nright\n"), ("g", "g")], &[]).await;

        let change = graph.diff(Some(left), Some(right)).await.unwrap();
        let merged = graph.apply(Some(left), &change, None).await.unwrap();

        assert_eq!(
            text(&graph, merged, "f").await,
            "shared\n<<<<<<<\nleft\n=======\nright\n>>>>>>>\n"
        );
        assert_eq!(text(&graph, merged, "g").await, "g");
    }

    #[tokio::test]
    async fn conflicts_abort_before_writing() {
        let graph = graph();
        let base = snapshot(&graph, None, &[("keep", "k")], &[]).await;
        let left = snapshot(&graph, Some(base), &[("x", "file")], &[]).await;
        let right = snapshot(&graph, Some(base), &[("x/y", "nested")], &[]).await;

        let change = graph.diff(Some(left), Some(right)).await.unwrap();
        let err = graph.apply(Some(left), &change, None).await.unwrap_err();
        assert!(matches!(err, GraphError::Conflict { ref path } if path == "x"));
    }

    #[tokio::test]
    async fn removing_everything_commits_the_empty_tree() {
        let graph = graph();
        let one = snapshot(&graph, None, &[("a/b/c", "c"), ("d", "d")], &[]).await;
        let mut change = Change3::default();
        let tree = graph.tree(Some(one)).await.unwrap().unwrap();
        let root = read_tree(&**graph.store(), tree).await.unwrap();
        for (name, node) in root.iter() {
            change.remove.insert(name.clone(), *node);
        }

        let applied = graph.apply(Some(one), &change, None).await.unwrap();
        assert_eq!(
            graph.tree(Some(applied)).await.unwrap(),
            Some(graph.empty_tree().await.unwrap())
        );
    }

    #[tokio::test]
    async fn adds_create_missing_directories_and_reject_the_root() {
        let graph = graph();
        let one = snapshot(&graph, None, &[("seed", "s")], &[]).await;
        let seed = graph.tree(Some(one)).await.unwrap().unwrap();
        let node = *read_tree(&**graph.store(), seed).await.unwrap().get("seed").unwrap();

        let mut change = Change3::default();
        change.add.insert("x/y/z".into(), node);
        let applied = graph.apply(Some(one), &change, None).await.unwrap();
        assert_eq!(text(&graph, applied, "x/y/z").await, "s");

        let mut root = Change3::default();
        root.add.insert("/".into(), node);
        assert!(matches!(
            graph.apply(Some(one), &root, None).await,
            Err(GraphError::Tree(TreeError::InvalidPath(_)))
        ));
    }
}
