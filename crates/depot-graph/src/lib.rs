//! Version graph for depot.
//!
//! Commits point at root trees in a [`depot_store::ContentStore`] and at
//! their parent. Each also carries a skip pointer so that ancestor lookups
//! and lowest-common-ancestor queries take a logarithmic number of steps.
//! Branches are named pointers kept in a [`depot_kv::KeyValueStore`].
//!
//! - [`VersionGraph::push`] moves a branch forward or replaces it.
//! - [`VersionGraph::diff`] compares two commits against their common
//!   ancestor; [`VersionGraph::apply`] commits the result.
//! - [`VersionGraph::revert`] re-commits an older snapshot on a branch.

pub mod apply;
pub mod branch;
pub mod change;
pub mod commit;
pub mod config;
pub mod error;
pub mod graph;
pub mod merge;

pub use branch::{BranchName, MergeStrategy, BRANCH_NAMESPACE};
pub use change::{Change2, Change3, Conflict};
pub use commit::{Commit, LogEntry};
pub use config::GraphConfig;
pub use error::{GraphError, GraphResult};
pub use graph::VersionGraph;
