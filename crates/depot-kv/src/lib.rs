//! Key-value substrate for depot.
//!
//! The content store and the branch pointers persist onto an ordered
//! key-value store addressed by path-of-strings [`Key`]s. This crate holds
//! the narrow interface depot consumes and an in-memory backend.
//!
//! # Modules
//!
//! - [`error`] -- Error types for substrate operations
//! - [`key`] -- [`Key`] and [`ListOptions`]
//! - [`traits`] -- The [`KeyValueStore`] trait
//! - [`memory`] -- In-memory [`InMemoryKeyValueStore`] for tests and embedding

pub mod error;
pub mod key;
pub mod memory;
pub mod traits;

pub use error::{KvError, KvResult};
pub use key::{Key, ListOptions};
pub use memory::InMemoryKeyValueStore;
pub use traits::KeyValueStore;
