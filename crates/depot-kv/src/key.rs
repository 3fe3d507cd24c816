//! Hierarchical keys for the substrate.
//!
//! A [`Key`] is a path of string segments such as `["packs", "<hex>"]` or
//! `["branch", "feature", "auth"]`. Keys order and prefix-match on their
//! encoded form, the segments joined with [`Key::SEPARATOR`], so a prefix
//! key whose last segment is partial (a short hash) selects every key whose
//! final segment begins with it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A path-of-strings key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<String>);

impl Key {
    /// Separator used by the encoded form.
    pub const SEPARATOR: char = '/';

    /// Build a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Append one segment, returning the extended key.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// The key's segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns `true` if the key has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encoded form: segments joined by [`Key::SEPARATOR`].
    pub fn encode(&self) -> String {
        self.0.join("/")
    }

    /// Decode an encoded key.
    pub fn decode(encoded: &str) -> Self {
        Self::new(encoded.split(Self::SEPARATOR))
    }

    /// Returns `true` if this key falls inside the range selected by `prefix`.
    pub fn matches_prefix(&self, prefix: &Key) -> bool {
        self.encode().starts_with(&prefix.encode())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Range options for [`KeyValueStore::list`](crate::KeyValueStore::list).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only return keys strictly after this one.
    pub after: Option<Key>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl ListOptions {
    /// Options with only a limit.
    pub fn limit(limit: usize) -> Self {
        Self {
            after: None,
            limit: Some(limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let key = Key::new(["branch", "feature", "auth"]);
        assert_eq!(key.encode(), "branch/feature/auth");
        assert_eq!(Key::decode("branch/feature/auth"), key);
        assert_eq!(key.to_string(), "branch/feature/auth");
    }

    #[test]
    fn partial_last_segment_matches() {
        let key = Key::new(["packs", "abcdef"]);
        assert!(key.matches_prefix(&Key::new(["packs", "abc"])));
        assert!(key.matches_prefix(&Key::new(["packs", ""])));
        assert!(!key.matches_prefix(&Key::new(["packs", "abd"])));
        assert!(!key.matches_prefix(&Key::new(["blobs", "abc"])));
    }

    #[test]
    fn child_extends() {
        let base = Key::new(["branch"]);
        let key = base.child("main");
        assert_eq!(key.segments(), &["branch".to_string(), "main".to_string()]);
        assert_eq!(key.last(), Some("main"));
        assert!(!key.is_empty());
    }
}
