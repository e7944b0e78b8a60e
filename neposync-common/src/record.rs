//! Per-file metadata snapshots and write operations

use std::fmt;

use crate::rating::Rating;
use crate::tags::TagSet;

/// Snapshot of one file's rating and tags as seen by one store.
///
/// Both fields are tri-state: `None` means the store has no entry at all,
/// which is distinct from `Some(Rating::ZERO)` or `Some(TagSet::new())`.
/// Records are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    identity: String,
    rating: Option<Rating>,
    tags: Option<TagSet>,
}

impl MetadataRecord {
    pub fn new(identity: impl Into<String>, rating: Option<Rating>, tags: Option<TagSet>) -> Self {
        Self {
            identity: identity.into(),
            rating,
            tags,
        }
    }

    /// Record with neither rating nor tags
    pub fn empty(identity: impl Into<String>) -> Self {
        Self::new(identity, None, None)
    }

    /// Opaque store-independent file identifier
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn rating(&self) -> Option<Rating> {
        self.rating
    }

    pub fn tags(&self) -> Option<&TagSet> {
        self.tags.as_ref()
    }

    /// Tags present and non-empty
    pub fn has_tags(&self) -> bool {
        self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// A single change to apply to a target store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    SetRating(Rating),
    ClearRating,
    SetTags { to_add: TagSet, to_remove: TagSet },
    ClearAllTags,
}

impl WriteOp {
    pub fn touches_rating(&self) -> bool {
        matches!(self, WriteOp::SetRating(_) | WriteOp::ClearRating)
    }

    pub fn touches_tags(&self) -> bool {
        !self.touches_rating()
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::SetRating(rating) => write!(f, "set rating {rating}/10"),
            WriteOp::ClearRating => write!(f, "clear rating"),
            WriteOp::SetTags { to_add, to_remove } => match (to_add.is_empty(), to_remove.is_empty()) {
                (false, true) => write!(f, "add tags {to_add}"),
                (true, false) => write!(f, "remove tags {to_remove}"),
                _ => write!(f, "add tags {to_add}; remove tags {to_remove}"),
            },
            WriteOp::ClearAllTags => write!(f, "clear all tags"),
        }
    }
}
