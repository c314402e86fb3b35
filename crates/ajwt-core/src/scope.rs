//! Capability scopes.
//!
//! A [`Scope`] is a single capability string such as `read:docs`. A
//! [`ScopeSet`] is an ordered set of them; delegation narrows sets by
//! subset, never widens them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A single capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    /// Validate and wrap a scope string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidScope`] if the value is empty or contains
    /// whitespace or control characters.
    pub fn new(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CoreError::InvalidScope(value));
        }
        Ok(Self(value))
    }

    /// The scope as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Scope {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.0
    }
}

/// An ordered set of scopes.
///
/// Serializes as a sorted array, so equal sets have equal encodings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// The empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a whitespace-separated list, e.g. `"read:docs write:docs"`.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::InvalidScope`] from any element.
    pub fn parse(s: &str) -> CoreResult<Self> {
        s.split_whitespace().map(Scope::new).collect()
    }

    /// Build from string slices.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::InvalidScope`] from any element.
    pub fn from_strs<'a>(items: impl IntoIterator<Item = &'a str>) -> CoreResult<Self> {
        items.into_iter().map(Scope::new).collect()
    }

    /// Add a scope. Returns `false` if it was already present.
    pub fn insert(&mut self, scope: Scope) -> bool {
        self.0.insert(scope)
    }

    /// Whether the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: &Scope) -> bool {
        self.0.contains(scope)
    }

    /// Whether every scope in `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Scopes in `self` that are absent from `other`.
    #[must_use]
    pub fn missing_from(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Number of scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a Scope;
    type IntoIter = std::collections::btree_set::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_sorted() {
        let set = ScopeSet::parse("write:docs  read:docs read:docs").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "read:docs write:docs");
    }

    #[test]
    fn test_subset() {
        let full = ScopeSet::parse("read write admin").unwrap();
        let narrow = ScopeSet::parse("read").unwrap();
        assert!(narrow.is_subset_of(&full));
        assert!(!full.is_subset_of(&narrow));
        assert!(ScopeSet::new().is_subset_of(&narrow));
        assert!(full.is_subset_of(&full));
    }

    #[test]
    fn test_missing_from() {
        let wanted = ScopeSet::parse("read write").unwrap();
        let held = ScopeSet::parse("read").unwrap();
        assert_eq!(wanted.missing_from(&held).to_string(), "write");
        assert!(held.missing_from(&wanted).is_empty());
    }

    #[test]
    fn test_rejects_invalid_scope() {
        assert!(Scope::new("").is_err());
        assert!(Scope::new("has space").is_err());
        assert!(ScopeSet::from_strs(["ok", "not ok"]).is_err());
    }

    #[test]
    fn test_serde_sorted_array() {
        let set = ScopeSet::from_strs(["b", "a"]).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["a","b"]"#);
        assert!(serde_json::from_str::<ScopeSet>(r#"["a", ""]"#).is_err());
    }
}
