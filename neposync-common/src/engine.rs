//! Reconciliation engine
//!
//! For one file and one (source, target) pair of stores, decide whether the
//! target already matches the source and, if not, which minimal writes make it
//! match. The direction is always explicit: the source wins.
//!
//! The decision itself (`plan_writes`) is a pure function of the two records
//! and the policy. `reconcile` wraps it with the reads and the single write,
//! and keeps no state between files.
//!
//! Absence policy:
//! - A source rating of 0 and a missing source rating both mean "nothing worth
//!   copying". Without `force` the target is left alone; with `force` an
//!   existing target rating is cleared.
//! - Missing or empty source tags likewise leave target tags alone unless
//!   `force` is set, in which case target tags are emptied.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::rating::RatingScale;
use crate::record::{MetadataRecord, WriteOp};
use crate::store::StoreAdapter;
use crate::tags::TagSet;

/// Caller-selected policy for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Treat absence of data on the source side as "clear the target"
    pub force: bool,
}

/// Inputs of the pure planning step besides the two records.
#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub force: bool,
    /// Both stores hold tags
    pub reconcile_tags: bool,
    /// Native rating scale of the target
    pub target_scale: RatingScale,
}

/// Outcome of reconciling one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The source store does not know the file; nothing to copy
    NotTracked { store: &'static str },
    /// Target already matches
    Unchanged,
    /// Writes were applied to the target
    Applied(Vec<WriteOp>),
    /// Reading or writing failed for this file only
    Failed {
        reason: StoreError,
        attempted: Vec<WriteOp>,
    },
}

impl ReconcileOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Compute the writes that bring `target` in line with `source`.
pub fn plan_writes(source: &MetadataRecord, target: &MetadataRecord, options: PlanOptions) -> Vec<WriteOp> {
    let mut ops = Vec::new();

    match source.rating().filter(|r| !r.is_zero()) {
        Some(rating) => {
            // Compare against what the target will actually read back
            let expected = options.target_scale.quantize(rating);
            if target.rating() != Some(expected) {
                ops.push(WriteOp::SetRating(rating));
            }
        }
        None => {
            if options.force && target.rating().is_some() {
                ops.push(WriteOp::ClearRating);
            }
        }
    }

    if options.reconcile_tags {
        let desired = if source.has_tags() {
            source.tags().cloned()
        } else if options.force {
            Some(TagSet::new())
        } else {
            None
        };

        if let Some(desired) = desired {
            let current = target.tags().cloned().unwrap_or_default();
            let diff = TagSet::diff(&current, &desired);
            if !diff.is_empty() {
                ops.push(WriteOp::SetTags {
                    to_add: diff.to_add,
                    to_remove: diff.to_remove,
                });
            }
        }
    }

    ops
}

/// Reconcile one file from `source` into `target`.
///
/// Per-file failures come back as `ReconcileOutcome::Failed`; only fatal
/// errors (`BackendUnavailable`) are returned as `Err`. No retry, no rollback
/// beyond what the target's own `write` guarantees.
pub async fn reconcile(
    source: &dyn StoreAdapter,
    target: &dyn StoreAdapter,
    identity: &str,
    policy: SyncPolicy,
) -> StoreResult<ReconcileOutcome> {
    let source_record = match source.read(identity).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => {
            debug!(identity, store = source.name(), "Not tracked in source");
            return Ok(ReconcileOutcome::NotTracked { store: source.name() });
        }
        Err(e) => return fail_or_abort(e, Vec::new()),
    };

    let target_record = match target.read(identity).await {
        Ok(record) => record,
        // Writes may still be refused later by stores that require presence
        Err(StoreError::NotFound(_)) => MetadataRecord::empty(identity),
        Err(e) => return fail_or_abort(e, Vec::new()),
    };

    let options = PlanOptions {
        force: policy.force,
        reconcile_tags: source.supports_tags() && target.supports_tags(),
        target_scale: target.rating_scale(),
    };
    let ops = plan_writes(&source_record, &target_record, options);

    if ops.is_empty() {
        debug!(identity, "Target already matches source");
        return Ok(ReconcileOutcome::Unchanged);
    }

    debug!(identity, target = target.name(), ops = ops.len(), "Applying writes");
    match target.write(identity, &ops).await {
        Ok(()) => Ok(ReconcileOutcome::Applied(ops)),
        Err(e) => fail_or_abort(e, ops),
    }
}

fn fail_or_abort(reason: StoreError, attempted: Vec<WriteOp>) -> StoreResult<ReconcileOutcome> {
    if reason.is_fatal() {
        return Err(reason);
    }
    Ok(ReconcileOutcome::Failed { reason, attempted })
}
