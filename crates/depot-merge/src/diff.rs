//! Line-level diff producing replacement hunks.
//!
//! Uses `similar`'s Myers implementation driven through a `Replace`
//! hook, which reports operations strictly in sequence order. Adjacent
//! delete and insert operations are folded so every hunk is a single
//! replacement of a span of the old sequence with a span of the new one.

use similar::algorithms::{myers, Capture, Replace};
use similar::DiffOp;

/// A half-open span `start..start + len` of one side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last index.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Replace `file1` in the old sequence with `file2` from the new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub file1: Span,
    pub file2: Span,
}

fn edit_ops<T: Eq>(a: &[T], b: &[T]) -> Vec<DiffOp> {
    let mut hook = Replace::new(Capture::new());
    if let Err(never) = myers::diff(&mut hook, a, 0..a.len(), b, 0..b.len()) {
        match never {}
    }
    hook.into_inner().into_ops()
}

/// Minimal list of replacement hunks turning `a` into `b`, in order.
///
/// Hunks never overlap and both their spans ascend. Should the edit
/// script ever violate that, the whole sequence becomes a single hunk.
pub fn diff<T: Eq>(a: &[T], b: &[T]) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let (mut old_cursor, mut new_cursor) = (0, 0);
    for op in edit_ops(a, b) {
        let (old, new) = match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => (Span::new(old_index, len), Span::new(new_index, len)),
            DiffOp::Delete {
                old_index,
                old_len,
                new_index,
            } => (Span::new(old_index, old_len), Span::new(new_index, 0)),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => (Span::new(old_index, 0), Span::new(new_index, new_len)),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => (Span::new(old_index, old_len), Span::new(new_index, new_len)),
        };
        if old.start != old_cursor || new.start != new_cursor {
            return whole(a, b);
        }
        old_cursor = old.end();
        new_cursor = new.end();
        if matches!(op, DiffOp::Equal { .. }) {
            continue;
        }

        if let Some(last) = hunks.last_mut() {
            if last.file1.end() == old.start && last.file2.end() == new.start {
                last.file1.len += old.len;
                last.file2.len += new.len;
                continue;
            }
        }
        hunks.push(Hunk {
            file1: old,
            file2: new,
        });
    }
    if old_cursor != a.len() || new_cursor != b.len() {
        return whole(a, b);
    }
    hunks
}

/// One hunk replacing all of `a` with all of `b`.
fn whole<T: Eq>(a: &[T], b: &[T]) -> Vec<Hunk> {
    if a == b {
        return Vec::new();
    }
    vec![Hunk {
        file1: Span::new(0, a.len()),
        file2: Span::new(0, b.len()),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<&str> {
        s.split('\n').collect()
    }

    #[test]
    fn identical_sequences_have_no_hunks() {
        assert!(diff(&lines("a\nb\nc"), &lines("a\nb\nc")).is_empty());
    }

    #[test]
    fn replacement_is_one_hunk() {
        let hunks = diff(&lines("a\nb\nc"), &lines("a\nx\ny\nc"));
        assert_eq!(
            hunks,
            vec![Hunk {
                file1: Span::new(1, 1),
                file2: Span::new(1, 2),
            }]
        );
    }

    #[test]
    fn pure_insertion_and_deletion() {
        let hunks = diff(&lines("a\nc"), &lines("a\nb\nc"));
        assert_eq!(hunks[0].file1, Span::new(1, 0));
        assert_eq!(hunks[0].file2, Span::new(1, 1));

        let hunks = diff(&lines("a\nb\nc"), &lines("c"));
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].file1, Span::new(0, 2));
        assert_eq!(hunks[0].file2.len, 0);
    }

    #[test]
    fn separate_edits_stay_separate() {
        let hunks = diff(&lines("1\n2\n3\n4\n5"), &lines("1\nX\n3\n4\nY"));
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].file1, Span::new(1, 1));
        assert_eq!(hunks[1].file1, Span::new(4, 1));
    }

    #[test]
    fn hunks_ascend_on_both_sides() {
        let old = lines("b\nb\nb\nb\nd\na\na\na\na\na");
        let new = lines("d\nc\nd\na\nc\nb");
        let hunks = diff(&old, &new);
        let (mut old_end, mut new_end) = (0, 0);
        for hunk in &hunks {
            assert!(hunk.file1.start >= old_end, "{hunks:?}");
            assert!(hunk.file2.start >= new_end, "{hunks:?}");
            old_end = hunk.file1.end();
            new_end = hunk.file2.end();
        }
        assert!(old_end <= old.len() && new_end <= new.len());

        // Replaying the hunks rebuilds the new sequence.
        let mut rebuilt = Vec::new();
        let mut cursor = 0;
        for hunk in &hunks {
            rebuilt.extend_from_slice(&old[cursor..hunk.file1.start]);
            rebuilt.extend_from_slice(&new[hunk.file2.start..hunk.file2.end()]);
            cursor = hunk.file1.end();
        }
        rebuilt.extend_from_slice(&old[cursor..]);
        assert_eq!(rebuilt, new);
    }
}
