//! Error types for key-value substrate operations.

use thiserror::Error;

use crate::key::Key;

/// Errors that can occur while talking to the key-value substrate.
#[derive(Debug, Error)]
pub enum KvError {
    /// No value is stored under the key.
    #[error("key not found: {key}")]
    NotFound { key: Key },

    /// Attempted to store a blob without a body.
    #[error("cannot store empty blob at {key}")]
    EmptyBlob { key: Key },

    /// The backend failed (I/O, poisoned lock, remote error).
    #[error("backend error: {0}")]
    Backend(String),
}

impl KvError {
    /// Returns `true` for [`KvError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience type alias for substrate operations.
pub type KvResult<T> = std::result::Result<T, KvError>;
