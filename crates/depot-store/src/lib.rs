//! Content-addressed object storage for depot.
//!
//! Objects are immutable [`Blob`](depot_types::Blob)s addressed by the hash
//! of their body. Two interchangeable [`ContentStore`] strategies persist
//! them onto a [`KeyValueStore`](depot_kv::KeyValueStore):
//!
//! - [`PlainStore`] keeps every body in full.
//! - [`DeltaChainStore`] keeps revisions of the same object as patch
//!   chains whose replay cost is logarithmic in the number of revisions.
//!
//! # Modules
//!
//! - [`error`] -- Error types for store operations
//! - [`traits`] -- [`ContentStore`] and the typed [`ContentStoreExt`]
//! - [`plain`] -- The naive strategy
//! - [`chain`] -- The delta-chain strategy and its [`Pack`] records
//! - [`delta`] -- Line patches used by the chain
//! - [`config`] -- [`StoreConfig`] and [`open_store`]

pub mod chain;
pub mod config;
pub mod delta;
pub mod error;
pub mod layout;
pub mod plain;
pub mod traits;

pub use chain::{DeltaChainStore, Pack};
pub use config::{open_store, StoreConfig, StoreStrategy};
pub use delta::{Delta, DeltaHunk};
pub use error::{StoreError, StoreResult};
pub use plain::PlainStore;
pub use traits::{ContentStore, ContentStoreExt};
