//! Foundation types for depot.
//!
//! Every other depot crate depends on `depot-types`.
//!
//! # Key Types
//!
//! - [`Hash`] -- BLAKE3 digest of a body, tagged with the logical type it addresses
//! - [`Blob`] -- a body (or its absence) plus string metadata headers
//! - [`Raw`] -- marker for untyped content

pub mod blob;
pub mod error;
pub mod hash;

pub use blob::{Blob, PARENT_HEADER};
pub use bytes::Bytes;
pub use error::TypeError;
pub use hash::{Hash, Raw};
