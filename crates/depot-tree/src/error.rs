use depot_store::StoreError;

use crate::node::NodeKind;

/// Errors from tree and working-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A path component is absent.
    #[error("path not found: {path}")]
    NotFound { path: String },

    /// A path component has the wrong kind.
    #[error("expected {expected} at {path}, found {found}")]
    UnexpectedKind {
        path: String,
        expected: NodeKind,
        found: NodeKind,
    },

    /// A directory has no children left. Callers prune it from the parent.
    #[error("empty directory")]
    EmptyDirectory,

    /// Malformed path or entry name.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A stored tree could not be decoded.
    #[error("tree codec error: {0}")]
    Codec(String),

    /// In-memory state lock was poisoned.
    #[error("working tree lock poisoned")]
    Poisoned,

    /// Error from the content store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TreeError {
    /// Returns `true` if the failure means "absent".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
