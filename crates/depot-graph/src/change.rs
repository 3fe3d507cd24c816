//! Structural change sets between trees.
//!
//! Both change types are keyed by full `/`-separated paths. A `remove`
//! entry names the node that was there before; an `add` entry the node to
//! place there (replacing whatever is present).

use std::collections::BTreeMap;

use depot_tree::Node;

/// Two-way difference between two trees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Change2 {
    pub remove: BTreeMap<String, Node>,
    pub add: BTreeMap<String, Node>,
}

impl Change2 {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Both sides' nodes at a path that could not be merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub left: Option<Node>,
    pub right: Option<Node>,
}

/// Three-way difference, relative to the common ancestor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Change3 {
    pub remove: BTreeMap<String, Node>,
    pub add: BTreeMap<String, Node>,
    pub conflict: BTreeMap<String, Conflict>,
}

impl Change3 {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty() && self.conflict.is_empty()
    }

    /// Returns `true` if [`apply`](crate::VersionGraph::apply) can use it.
    pub fn is_clean(&self) -> bool {
        self.conflict.is_empty()
    }
}

impl From<Change2> for Change3 {
    fn from(change: Change2) -> Self {
        Self {
            remove: change.remove,
            add: change.add,
            conflict: BTreeMap::new(),
        }
    }
}
