//! Merkle trees for depot.
//!
//! - [`node`] -- [`Node`], [`Tree`] and path helpers
//! - [`codec`] -- [`TreeCodec`], the canonical (sorted JSON) tree encoding
//! - [`working`] -- [`WorkingTree`], a lazily loaded copy-on-write staging area
//! - [`error`] -- [`TreeError`]

pub mod codec;
pub mod error;
pub mod node;
pub mod working;

pub use codec::{read_tree, write_tree, TreeCodec};
pub use error::{TreeError, TreeResult};
pub use node::{join_path, split_path, Node, NodeKind, Tree};
pub use working::WorkingTree;
