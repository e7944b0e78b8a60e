//! Store adapter capability trait
//!
//! One implementation per backend (semantic index, collection database,
//! embedded file metadata). The reconciliation engine only ever talks to this
//! trait.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreResult;
use crate::rating::RatingScale;
use crate::record::{MetadataRecord, WriteOp};

/// Uniform read/write contract over one metadata store.
///
/// `identity` is the absolute logical path of a file. Adapters translate it to
/// their own key and never leak native-scale ratings: records coming out of
/// `read` and ops going into `write` are canonical.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Short store name for reports and logs
    fn name(&self) -> &'static str;

    /// Native rating range of this store
    fn rating_scale(&self) -> RatingScale;

    /// Whether this store can hold tags at all
    fn supports_tags(&self) -> bool;

    /// Current record for `identity`.
    ///
    /// Fails with `NotFound` when the store does not know the identity; an
    /// identity that is known but carries nothing returns an empty record.
    /// Must not mutate state.
    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord>;

    /// Apply `ops` to `identity`, all or nothing.
    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()>;

    /// Identities under `prefix` that carry any metadata in this store.
    ///
    /// Non-recursive mode yields direct children of `prefix` only. Used by the
    /// display reports, never by reconciliation.
    fn list_known_under<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StoreResult<String>>;
}

/// True when `identity` lies under directory `prefix`, honouring `recursive`.
///
/// Shared by adapters whose backends can only do a plain prefix match.
pub fn is_under(identity: &str, prefix: &str, recursive: bool) -> bool {
    let prefix = prefix.trim_end_matches('/');
    let Some(rest) = identity.strip_prefix(prefix) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty() && (recursive || !rest.contains('/'))
}
