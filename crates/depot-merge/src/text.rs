//! Text front end for the three-way merge.
//!
//! Texts are split on `\n` (so a trailing newline survives as a final
//! empty line) and merged with [`diff3_merge`]. Conflicts render in the
//! two-way style: `<<<<<<<`, the `a` lines, `=======`, the `b` lines,
//! `>>>>>>>`. The origin's lines are not shown.

use crate::diff3::{diff3_merge, MergeRegion};
use crate::error::MergeError;

pub const MARKER_START: &str = "<<<<<<<";
pub const MARKER_SEPARATOR: &str = "=======";
pub const MARKER_END: &str = ">>>>>>>";

/// Outcome of merging three texts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeResult {
    pub regions: Vec<MergeRegion<String>>,
}

impl MergeResult {
    /// Returns `true` if no region conflicts.
    pub fn is_clean(&self) -> bool {
        self.regions
            .iter()
            .all(|r| matches!(r, MergeRegion::Ok(_)))
    }

    /// The conflicting regions, in order.
    pub fn conflicts(&self) -> impl Iterator<Item = &MergeRegion<String>> {
        self.regions
            .iter()
            .filter(|r| matches!(r, MergeRegion::Conflict { .. }))
    }

    /// Render the merged text, wrapping conflicts in markers.
    pub fn render(&self) -> String {
        let mut out: Vec<&str> = Vec::new();
        for region in &self.regions {
            match region {
                MergeRegion::Ok(lines) => out.extend(lines.iter().map(String::as_str)),
                MergeRegion::Conflict { a, b, .. } => {
                    out.push(MARKER_START);
                    out.extend(a.iter().map(String::as_str));
                    out.push(MARKER_SEPARATOR);
                    out.extend(b.iter().map(String::as_str));
                    out.push(MARKER_END);
                }
            }
        }
        out.join("\n")
    }
}

fn split(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Merge texts `a` and `b` that both derive from `o`.
pub fn merge3(a: &str, o: &str, b: &str) -> MergeResult {
    MergeResult {
        regions: diff3_merge(&split(a), &split(o), &split(b)),
    }
}

/// Merge and render in one step.
pub fn merge3_diff(a: &str, o: &str, b: &str) -> String {
    merge3(a, o, b).render()
}

/// Merge raw bodies. Non-UTF-8 input cannot be merged.
pub fn merge3_bytes(a: &[u8], o: &[u8], b: &[u8]) -> Result<MergeResult, MergeError> {
    Ok(merge3(utf8("a", a)?, utf8("o", o)?, utf8("b", b)?))
}

fn utf8<'a>(side: &'static str, bytes: &'a [u8]) -> Result<&'a str, MergeError> {
    std::str::from_utf8(bytes).map_err(|_| MergeError::Binary { side })
}
