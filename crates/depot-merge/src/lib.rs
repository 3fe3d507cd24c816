//! Three-way text merge for depot.
//!
//! - [`diff`] -- minimal line diff as replacement [`Hunk`]s
//! - [`diff3`] -- [`diff3_merge`] over arbitrary line sequences
//! - [`text`] -- [`merge3`] / [`merge3_diff`] on strings, with conflict markers

pub mod diff;
pub mod diff3;
pub mod error;
pub mod text;

pub use diff::{diff, Hunk, Span};
pub use diff3::{diff3_merge, MergeRegion};
pub use error::MergeError;
pub use text::{merge3, merge3_bytes, merge3_diff, MergeResult};
