use depot_kv::KvError;
use depot_types::{Hash, TypeError};

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object (or no object matching a prefix) is stored.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A short-hash prefix matched more than one stored object.
    #[error("ambiguous prefix {prefix}: matches multiple objects")]
    Multiple { prefix: String },

    /// Attempted to write a blob without a body.
    #[error("cannot store a blob without a body")]
    EmptyBlob,

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    /// A stored pack record is inconsistent.
    #[error("corrupt pack for {hash}: {reason}")]
    CorruptPack { hash: String, reason: String },

    /// A patch could not be decoded or does not fit its base.
    #[error("corrupt delta: {0}")]
    CorruptDelta(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Error from the key-value substrate.
    #[error("substrate error: {0}")]
    Kv(#[from] KvError),
}

impl StoreError {
    /// Not-found error naming a hash.
    pub fn not_found<T>(hash: &Hash<T>) -> Self {
        Self::NotFound(hash.to_hex())
    }

    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
