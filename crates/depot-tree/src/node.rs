//! Tree entries and their path rules.

use std::collections::BTreeMap;
use std::fmt;

use depot_types::{Bytes, Hash};
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// The two kinds of tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Blob,
    Tree,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// Reference to a child object. The kind is not derivable from the hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Blob { hash: Hash<Bytes> },
    Tree { hash: Hash<Tree> },
}

impl Node {
    pub fn blob(hash: Hash<Bytes>) -> Self {
        Self::Blob { hash }
    }

    pub fn tree(hash: Hash<Tree>) -> Self {
        Self::Tree { hash }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Blob { .. } => NodeKind::Blob,
            Self::Tree { .. } => NodeKind::Tree,
        }
    }

    /// The referenced object's hash, untyped.
    pub fn hash(&self) -> Hash {
        match self {
            Self::Blob { hash } => hash.erase(),
            Self::Tree { hash } => hash.erase(),
        }
    }
}

/// A directory: single path segments mapped to child nodes.
///
/// Entries are kept sorted, so the serialized form (and hash) of a tree
/// depends only on its contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    entries: BTreeMap<String, Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, node: Node) -> TreeResult<Option<Node>> {
        let name = name.into();
        validate_segment(&name)?;
        Ok(self.entries.insert(name, node))
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check a single entry name.
pub fn validate_segment(name: &str) -> TreeResult<()> {
    if name.is_empty() {
        return Err(TreeError::InvalidPath("empty segment".to_string()));
    }
    if name.contains(SEPARATOR) {
        return Err(TreeError::InvalidPath(format!(
            "segment {name:?} contains '{SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Split a `/`-separated path into segments. The empty path is the root.
pub fn split_path(path: &str) -> TreeResult<Vec<&str>> {
    let trimmed = path.trim_matches(SEPARATOR);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(SEPARATOR)
        .map(|segment| validate_segment(segment).map(|()| segment))
        .collect()
}

/// Join segments back into a path.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_with_kind_tag() {
        let node = Node::blob(Hash::of(b"x"));
        let json = serde_json::to_value(node).unwrap();
        assert_eq!(json["kind"], "blob");
        assert_eq!(json["hash"], Hash::<Bytes>::of(b"x").to_hex());
        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn segments_are_validated() {
        let mut tree = Tree::new();
        assert!(tree.insert("a/b", Node::blob(Hash::of(b"x"))).is_err());
        assert!(tree.insert("", Node::blob(Hash::of(b"x"))).is_err());
        assert!(tree.insert("ok", Node::blob(Hash::of(b"x"))).unwrap().is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn paths_split_and_join() {
        assert_eq!(split_path("src/lib.rs").unwrap(), vec!["src", "lib.rs"]);
        assert!(split_path("").unwrap().is_empty());
        assert!(split_path("/").unwrap().is_empty());
        assert!(split_path("a//b").is_err());
        assert_eq!(join_path(&["a", "b"]), "a/b");
    }
}
