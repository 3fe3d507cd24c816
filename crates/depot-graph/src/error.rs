use depot_kv::KvError;
use depot_store::StoreError;
use depot_tree::TreeError;
use depot_types::Hash;
use thiserror::Error;

use crate::branch::MergeStrategy;
use crate::commit::Commit;

/// Errors from version graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Commit metadata was requested for the empty head.
    #[error("no commit before the beginning of history")]
    Genesis,

    /// The branch name is empty, malformed, or has no pointer.
    #[error("branch not found: {branch}")]
    BranchNotFound { branch: String },

    /// A forward push would drop commits from the branch.
    #[error(
        "cannot fast-forward {branch} from {current} to {attempted} (common ancestor: {})",
        describe_lca(.lca)
    )]
    Diverged {
        branch: String,
        current: Hash<Commit>,
        attempted: Hash<Commit>,
        lca: Option<Hash<Commit>>,
    },

    /// The merge strategy is declared but not implemented.
    #[error("unsupported merge strategy: {0}")]
    UnsupportedStrategy(MergeStrategy),

    /// Revert target is not an ancestor of the branch head.
    #[error("{ancestor} is not an ancestor of {head}")]
    NotAncestor {
        ancestor: Hash<Commit>,
        head: Hash<Commit>,
    },

    /// A change set still carries a conflict.
    #[error("unresolved conflict at {path}")]
    Conflict { path: String },

    /// A stored commit or branch pointer could not be decoded.
    #[error("corrupt graph data: {0}")]
    Corrupt(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl GraphError {
    /// Returns `true` if the failure means "absent".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::BranchNotFound { .. } => true,
            Self::Tree(e) => e.is_not_found(),
            Self::Store(e) => e.is_not_found(),
            Self::Kv(e) => e.is_not_found(),
            _ => false,
        }
    }
}

fn describe_lca(lca: &Option<Hash<Commit>>) -> String {
    match lca {
        Some(hash) => hash.short_hex(),
        None => "none".to_string(),
    }
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
