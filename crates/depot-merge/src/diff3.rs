//! Three-way merge of line sequences.
//!
//! Both sides are diffed against the common origin `o`. Hunks are laid out
//! on `o`'s coordinates; hunks from different sides that touch or overlap
//! form one region. A region changed by only one side takes that side's
//! lines. A region changed by both is a conflict unless both sides ended up
//! with the same lines.

use crate::diff::{diff, Span};

/// One region of a merge result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeRegion<T> {
    /// Lines that merged cleanly.
    Ok(Vec<T>),
    /// Both sides changed the same origin lines differently.
    Conflict { a: Vec<T>, o: Vec<T>, b: Vec<T> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

#[derive(Clone, Copy)]
struct SideHunk {
    side: Side,
    origin: Span,
    changed: Span,
}

/// Merge `a` and `b`, both derived from `o`.
pub fn diff3_merge<T: Clone + Eq>(a: &[T], o: &[T], b: &[T]) -> Vec<MergeRegion<T>> {
    let mut hunks: Vec<SideHunk> = diff(o, a)
        .into_iter()
        .map(|h| SideHunk {
            side: Side::A,
            origin: h.file1,
            changed: h.file2,
        })
        .chain(diff(o, b).into_iter().map(|h| SideHunk {
            side: Side::B,
            origin: h.file1,
            changed: h.file2,
        }))
        .collect();
    // Stable: on equal origin starts, A stays ahead of B.
    hunks.sort_by_key(|h| h.origin.start);

    let mut regions = Vec::new();
    let mut emitted = 0;
    let mut i = 0;
    while i < hunks.len() {
        let start = hunks[i].origin.start;
        let mut end = hunks[i].origin.end();
        let mut j = i + 1;
        while j < hunks.len() && hunks[j].origin.start <= end {
            end = end.max(hunks[j].origin.end());
            j += 1;
        }
        let group = &hunks[i..j];

        push_ok(&mut regions, &o[emitted..start]);
        let a_lines = side_slice(a, o, group, Side::A, start, end);
        let b_lines = side_slice(b, o, group, Side::B, start, end);
        if group.iter().all(|h| h.side == Side::A) {
            push_ok(&mut regions, a_lines);
        } else if group.iter().all(|h| h.side == Side::B) {
            push_ok(&mut regions, b_lines);
        } else if a_lines == b_lines {
            push_ok(&mut regions, a_lines);
        } else {
            regions.push(MergeRegion::Conflict {
                a: a_lines.to_vec(),
                o: o[start..end].to_vec(),
                b: b_lines.to_vec(),
            });
        }
        emitted = end;
        i = j;
    }
    push_ok(&mut regions, &o[emitted..]);
    regions
}

/// The lines `side` holds for origin region `start..end`.
fn side_slice<'a, T>(
    lines: &'a [T],
    o: &'a [T],
    group: &[SideHunk],
    side: Side,
    start: usize,
    end: usize,
) -> &'a [T] {
    let mut own = group.iter().filter(|h| h.side == side);
    let Some(first) = own.next() else {
        return &o[start..end];
    };
    let last = own.last().unwrap_or(first);
    // Outside its own hunks a side matches the origin line for line.
    let from = first.changed.start - (first.origin.start - start);
    let to = last.changed.end() + (end - last.origin.end());
    &lines[from..to]
}

fn push_ok<T: Clone>(regions: &mut Vec<MergeRegion<T>>, lines: &[T]) {
    if lines.is_empty() {
        return;
    }
    if let Some(MergeRegion::Ok(prev)) = regions.last_mut() {
        prev.extend_from_slice(lines);
    } else {
        regions.push(MergeRegion::Ok(lines.to_vec()));
    }
}
