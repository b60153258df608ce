//! Hierarchical scope paths for effect registration.
//!
//! A [`ScopePath`] records where in an application's nesting hierarchy an
//! effect was created (e.g. the position of a pushed screen in a navigation
//! stack). Cancellation is requested at any granularity along that path:
//! registrations fan out over every prefix of the path, so cancelling at an
//! ancestor reaches all work started in deeper scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One level of nesting within a scope hierarchy.
///
/// Markers are opaque to this crate; hosts typically use a stack index or a
/// stable per-screen counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeMarker(pub u64);

impl ScopeMarker {
    /// Create a marker from its raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw marker value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ScopeMarker {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ScopeMarker> for u64 {
    fn from(marker: ScopeMarker) -> Self {
        marker.0
    }
}

/// Ordered sequence of scope markers, captured when an effect is created.
///
/// Immutable once constructed. The root path is empty and is an ancestor of
/// every other path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath(Vec<ScopeMarker>);

impl ScopePath {
    /// The empty root path.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from a marker sequence.
    pub fn new(markers: impl IntoIterator<Item = ScopeMarker>) -> Self {
        Self(markers.into_iter().collect())
    }

    /// The path of a scope nested one level below `self`.
    pub fn child(&self, marker: impl Into<ScopeMarker>) -> Self {
        let mut markers = self.0.clone();
        markers.push(marker.into());
        Self(markers)
    }

    /// The immediately enclosing path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Nesting depth; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// True for the empty root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The markers of this path, outermost first.
    pub fn markers(&self) -> &[ScopeMarker] {
        &self.0
    }

    /// True iff `other` is `self` or an ancestor of `self`.
    pub fn starts_with(&self, other: &ScopePath) -> bool {
        self.0.len() >= other.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Every prefix of this path, longest first, ending with the root.
    ///
    /// Each prefix is an independent registration key: inserting a
    /// cancellation handle under all of them makes the registration
    /// reachable from any ancestor scope.
    pub fn prefixes(&self) -> impl Iterator<Item = ScopePath> + '_ {
        (0..=self.0.len())
            .rev()
            .map(move |len| Self(self.0[..len].to_vec()))
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for marker in &self.0 {
            write!(f, "/{marker}")?;
        }
        Ok(())
    }
}

impl FromIterator<ScopeMarker> for ScopePath {
    fn from_iter<I: IntoIterator<Item = ScopeMarker>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<u64>> for ScopePath {
    fn from(markers: Vec<u64>) -> Self {
        Self(markers.into_iter().map(ScopeMarker).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(markers: &[u64]) -> ScopePath {
        ScopePath::from(markers.to_vec())
    }

    #[test]
    fn prefixes_include_self_and_root() {
        let p = path(&[1, 2, 3]);
        let prefixes: Vec<ScopePath> = p.prefixes().collect();
        assert_eq!(
            prefixes,
            vec![path(&[1, 2, 3]), path(&[1, 2]), path(&[1]), ScopePath::root()]
        );
    }

    #[test]
    fn root_has_single_prefix() {
        let prefixes: Vec<ScopePath> = ScopePath::root().prefixes().collect();
        assert_eq!(prefixes, vec![ScopePath::root()]);
    }

    #[test]
    fn starts_with_ancestor_but_not_sibling() {
        let p = path(&[1, 2, 3]);
        assert!(p.starts_with(&path(&[1])));
        assert!(p.starts_with(&p));
        assert!(p.starts_with(&ScopePath::root()));
        assert!(!p.starts_with(&path(&[1, 2, 4])));
        assert!(!path(&[1]).starts_with(&p));
    }

    #[test]
    fn child_and_parent_round_trip() {
        let p = path(&[4, 7]);
        let c = p.child(9);
        assert_eq!(c.depth(), 3);
        assert_eq!(c.parent(), Some(p));
        assert_eq!(ScopePath::root().parent(), None);
    }

    #[test]
    fn display_renders_slash_separated() {
        assert_eq!(ScopePath::root().to_string(), "/");
        assert_eq!(path(&[0, 3, 1]).to_string(), "/0/3/1");
    }

    proptest! {
        #[test]
        fn every_prefix_is_an_ancestor(markers in proptest::collection::vec(0u64..16, 0..8)) {
            let p = ScopePath::from(markers);
            for prefix in p.prefixes() {
                prop_assert!(p.starts_with(&prefix));
            }
            prop_assert_eq!(p.prefixes().count(), p.depth() + 1);
        }
    }
}
