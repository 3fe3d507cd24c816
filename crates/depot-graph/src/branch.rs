//! Branch names and push strategies.
//!
//! A branch name is a `/`-separated path such as `feature/auth`. Each
//! segment must be non-empty and may not:
//! - contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - contain `..` or `@{`
//! - start with `.` or end with `.lock`
//!
//! Pointers live in the substrate under `["branch", ...segments]`.

use std::fmt;
use std::str::FromStr;

use depot_kv::Key;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Root segment of every branch pointer key.
pub const BRANCH_NAMESPACE: &str = "branch";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// A validated branch name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName {
    segments: Vec<String>,
}

impl BranchName {
    /// Parse and validate a branch name.
    pub fn new(name: &str) -> Result<Self, GraphError> {
        let invalid = || GraphError::BranchNotFound {
            branch: name.to_string(),
        };
        if name.is_empty() || name.contains("..") || name.contains("@{") {
            return Err(invalid());
        }
        let mut segments = Vec::new();
        for segment in name.split('/') {
            if segment.is_empty()
                || segment.starts_with('.')
                || segment.ends_with(".lock")
                || segment.contains(FORBIDDEN_CHARS)
            {
                return Err(invalid());
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Substrate key holding this branch's pointer.
    pub fn key(&self) -> Key {
        Key::new(std::iter::once(BRANCH_NAMESPACE.to_string()).chain(self.segments.iter().cloned()))
    }

    /// Recover a branch name from a pointer key.
    pub fn from_key(key: &Key) -> Option<Self> {
        match key.segments() {
            [namespace, rest @ ..] if namespace == BRANCH_NAMESPACE && !rest.is_empty() => {
                Self::new(&rest.join("/")).ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for BranchName {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// How [`VersionGraph::push`](crate::VersionGraph::push) moves a pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Only move to a descendant of the current head.
    #[default]
    Forward,
    /// Overwrite unconditionally.
    Replace,
    Merge,
    Rebase,
    Force,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Forward => "forward",
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Rebase => "rebase",
            Self::Force => "force",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["main", "my-branch", "v1.0", "feature/auth", "user/alice/fix-123"] {
            assert!(BranchName::new(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names_are_not_found() {
        for name in ["", "/", "a//b", "bad..name", "has space", "a~b", ".hidden", "x/.y", "b.lock", "a@{1}", "trailing/"] {
            let err = BranchName::new(name).unwrap_err();
            assert!(matches!(err, GraphError::BranchNotFound { .. }), "{name}");
        }
    }

    #[test]
    fn key_round_trip() {
        let name: BranchName = "feature/auth".parse().unwrap();
        let key = name.key();
        assert_eq!(key.encode(), "branch/feature/auth");
        assert_eq!(BranchName::from_key(&key), Some(name));
        assert_eq!(BranchName::from_key(&Key::new(["packs", "x"])), None);
    }

    #[test]
    fn strategy_parses_lowercase() {
        let s: MergeStrategy = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(s, MergeStrategy::Replace);
        assert_eq!(MergeStrategy::default().to_string(), "forward");
    }
}
