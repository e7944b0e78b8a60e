//! In-memory reference store
//!
//! Behaves like a real backend (native scale, optional tag support, the
//! "must already be known" write precondition, connection loss) without any
//! I/O. Used by the engine and driver tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{StoreError, StoreResult};
use crate::rating::RatingScale;
use crate::record::{MetadataRecord, WriteOp};
use crate::store::{is_under, StoreAdapter};
use crate::tags::TagSet;

#[derive(Debug, Clone, Default)]
struct Entry {
    /// Native-scale rating
    rating: Option<u32>,
    tags: Option<TagSet>,
}

/// Mutex-guarded map from identity to metadata.
pub struct MemoryStore {
    name: &'static str,
    scale: RatingScale,
    tags: bool,
    require_known: bool,
    unavailable: bool,
    entries: Mutex<BTreeMap<String, Entry>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            scale: RatingScale::CANONICAL,
            tags: true,
            require_known: false,
            unavailable: false,
            entries: Mutex::new(BTreeMap::new()),
            writes: Mutex::new(0),
        }
    }

    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    /// Store that cannot hold tags (like ID3 ratings or the collection database)
    pub fn without_tags(mut self) -> Self {
        self.tags = false;
        self
    }

    /// Writes to identities not yet known fail with `WriteRejected`
    pub fn require_known(mut self) -> Self {
        self.require_known = true;
        self
    }

    /// Every call fails with `BackendUnavailable`
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Seed an entry. `rating` is on the store's native scale.
    pub fn insert(&self, identity: &str, rating: Option<u32>, tags: Option<TagSet>) {
        let tags = if self.tags { tags } else { None };
        self.lock_entries()
            .insert(identity.to_string(), Entry { rating, tags });
    }

    /// Native rating and tags currently held for `identity`
    pub fn snapshot(&self, identity: &str) -> Option<(Option<u32>, Option<TagSet>)> {
        self.lock_entries()
            .get(identity)
            .map(|e| (e.rating, e.tags.clone()))
    }

    /// Number of successful `write` calls
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::BackendUnavailable(format!("{} is offline", self.name)));
        }
        Ok(())
    }

    fn validate(&self, identity: &str, known: bool, ops: &[WriteOp]) -> StoreResult<()> {
        if self.require_known && !known {
            return Err(StoreError::WriteRejected(format!(
                "{identity} is not known to {}",
                self.name
            )));
        }
        if !self.tags && ops.iter().any(WriteOp::touches_tags) {
            return Err(StoreError::WriteRejected(format!("{} does not hold tags", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn rating_scale(&self) -> RatingScale {
        self.scale
    }

    fn supports_tags(&self) -> bool {
        self.tags
    }

    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord> {
        self.check_available()?;
        let entries = self.lock_entries();
        let entry = entries
            .get(identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
        Ok(MetadataRecord::new(
            identity,
            entry.rating.map(|native| self.scale.to_canonical(native)),
            entry.tags.clone(),
        ))
    }

    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()> {
        self.check_available()?;
        let mut entries = self.lock_entries();
        self.validate(identity, entries.contains_key(identity), ops)?;

        let entry = entries.entry(identity.to_string()).or_default();
        for op in ops {
            match op {
                WriteOp::SetRating(rating) => entry.rating = Some(self.scale.from_canonical(*rating)),
                WriteOp::ClearRating => entry.rating = None,
                WriteOp::SetTags { to_add, to_remove } => {
                    let current = entry.tags.clone().unwrap_or_default();
                    let diff = crate::tags::TagDiff {
                        to_add: to_add.clone(),
                        to_remove: to_remove.clone(),
                    };
                    entry.tags = Some(current.apply(&diff));
                }
                WriteOp::ClearAllTags => entry.tags = Some(TagSet::new()),
            }
        }
        drop(entries);

        *self.writes.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        Ok(())
    }

    fn list_known_under<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StoreResult<String>> {
        if let Err(e) = self.check_available() {
            return stream::once(async move { Err(e) }).boxed();
        }
        let known: Vec<StoreResult<String>> = self
            .lock_entries()
            .iter()
            .filter(|(_, e)| e.rating.is_some() || e.tags.as_ref().is_some_and(|t| !t.is_empty()))
            .filter(|(id, _)| is_under(id, prefix, recursive))
            .map(|(id, _)| Ok(id.clone()))
            .collect();
        stream::iter(known).boxed()
    }
}
