//! Tag sets and tag diffs
//!
//! Labels are compared as exact, case-sensitive strings. No whitespace or case
//! normalization happens anywhere; "Beach" and "beach" are two tags.

use std::collections::BTreeSet;
use std::fmt;

/// Sorted, deduplicated set of non-empty tag labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label. Empty labels are ignored and return `false`.
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label.is_empty() {
            return false;
        }
        self.0.insert(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Set difference between what a store has and what it should have.
    pub fn diff(current: &TagSet, desired: &TagSet) -> TagDiff {
        TagDiff {
            to_add: desired.0.difference(&current.0).cloned().collect(),
            to_remove: current.0.difference(&desired.0).cloned().collect(),
        }
    }

    /// Returns a new set with `diff` applied: additions first, then removals.
    pub fn apply(&self, diff: &TagDiff) -> TagSet {
        let mut out = self.clone();
        for label in diff.to_add.iter() {
            out.insert(label);
        }
        for label in diff.to_remove.iter() {
            out.0.remove(label);
        }
        out
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for label in iter {
            set.insert(label);
        }
        set
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TagSet {
    /// Space-separated labels, in sorted order
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for label in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(label)?;
            first = false;
        }
        Ok(())
    }
}

/// Labels to add and labels to remove, as produced by `TagSet::diff`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub to_add: TagSet,
    pub to_remove: TagSet,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}
