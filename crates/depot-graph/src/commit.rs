use depot_tree::Tree;
use depot_types::Hash;
use serde::{Deserialize, Serialize};

/// An immutable snapshot in history.
///
/// `depth` is 1 for a root commit and grows by one per generation. `jump`
/// is a skip pointer to an older ancestor, fixed when the commit is
/// created, that lets ancestry walks cover long histories in logarithmic
/// steps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub parent: Option<Hash<Commit>>,
    pub jump: Option<Hash<Commit>>,
    pub tree: Hash<Tree>,
    pub depth: u64,
    pub message: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// One entry of [`VersionGraph::log`](crate::VersionGraph::log).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub hash: Hash<Commit>,
    pub message: Option<String>,
    pub timestamp: i64,
}
