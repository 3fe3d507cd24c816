//! Line-oriented patches between two revisions of a body.
//!
//! A [`Delta`] records, against the line structure of a source body, which
//! runs of lines to drop and what bytes to splice in instead. Lines are
//! split after every `\n`, so bodies round-trip byte for byte (including a
//! missing trailing newline, or no newlines at all). The line diff itself
//! comes from [`depot_merge::diff`], whose hunks always ascend.
//!
//! Patches are persisted as opaque `bincode` blobs.

use depot_merge::diff;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A patch transforming one body into the next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Number of lines the source body must have.
    pub source_lines: u64,
    /// Replacements in ascending, non-overlapping source order.
    pub hunks: Vec<DeltaHunk>,
}

/// One replacement: drop `remove` source lines at `start`, insert `insert`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaHunk {
    pub start: u64,
    pub remove: u64,
    pub insert: Vec<u8>,
}

/// Split a body into lines, each keeping its trailing `\n`.
pub fn split_lines(body: &[u8]) -> Vec<&[u8]> {
    body.split_inclusive(|b| *b == b'\n').collect()
}

impl Delta {
    /// Compute the patch that turns `source` into `target`.
    pub fn compute(source: &[u8], target: &[u8]) -> Self {
        let old = split_lines(source);
        let new = split_lines(target);
        let hunks = diff(&old, &new)
            .into_iter()
            .map(|h| DeltaHunk {
                start: h.file1.start as u64,
                remove: h.file1.len as u64,
                insert: new[h.file2.start..h.file2.end()].concat(),
            })
            .collect();
        Self {
            source_lines: old.len() as u64,
            hunks,
        }
    }

    /// Returns `true` if the patch changes nothing.
    pub fn is_identity(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Apply the patch to `source`.
    pub fn apply(&self, source: &[u8]) -> StoreResult<Vec<u8>> {
        let lines = split_lines(source);
        if lines.len() as u64 != self.source_lines {
            return Err(StoreError::CorruptDelta(format!(
                "expected a {}-line source, got {} lines",
                self.source_lines,
                lines.len()
            )));
        }

        let mut out = Vec::with_capacity(source.len());
        let mut cursor = 0usize;
        for hunk in &self.hunks {
            let start = hunk.start as usize;
            let end = start + hunk.remove as usize;
            if start < cursor || end > lines.len() {
                return Err(StoreError::CorruptDelta(format!(
                    "hunk {start}..{end} out of order or out of range"
                )));
            }
            out.extend(lines[cursor..start].iter().flat_map(|l| l.iter()));
            out.extend_from_slice(&hunk.insert);
            cursor = end;
        }
        out.extend(lines[cursor..].iter().flat_map(|l| l.iter()));
        Ok(out)
    }

    /// Encode for storage.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a stored patch.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        bincode::deserialize(data).map_err(|e| StoreError::CorruptDelta(e.to_string()))
    }
}
