//! Read-only and maintenance actions
//!
//! These never reconcile. They inspect the semantic index or the collection
//! database, or wipe the semantic index's data for a tree.

use std::io::Write;
use std::path::Path;

use futures::StreamExt;
use neposync_common::{ReconcileOutcome, StoreAdapter, StoreError, WriteOp};
use tracing::{debug, warn};

use crate::driver::identity_of;
use crate::error::RunResult;
use crate::report::{FileReport, RunSummary};
use crate::scanner::{Classifier, FileScanner};
use crate::stores::CollectionStore;

/// Print what the semantic index holds for every supported file under `root`.
pub async fn display_semantic<W: Write>(
    semantic: &dyn StoreAdapter,
    root: &Path,
    classifier: &Classifier,
    recursive: bool,
    verbose: bool,
    out: &mut W,
) -> RunResult<RunSummary> {
    let files = FileScanner::new(recursive).scan_classified(root, classifier)?;
    let mut summary = RunSummary::default();

    for (path, _) in files {
        let Some(identity) = identity_of(&path) else {
            continue;
        };
        let mut report = FileReport::new(out, identity);

        let record = match semantic.read(identity).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                let outcome = ReconcileOutcome::NotTracked { store: semantic.name() };
                report.outcome(&outcome, verbose)?;
                summary.record(&outcome);
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.line(format_args!("Failed: {e}"))?;
                summary.record(&ReconcileOutcome::Failed {
                    reason: e,
                    attempted: Vec::new(),
                });
                continue;
            }
        };

        if let Some(tags) = record.tags().filter(|t| !t.is_empty()) {
            report.line(format_args!("Tags: {tags}"))?;
        }
        if let Some(rating) = record.rating() {
            report.line(format_args!("Rating: {rating}"))?;
        }
        if !report.has_output() && verbose {
            report.line("No rating or tags")?;
        }
        summary.record(&ReconcileOutcome::Unchanged);
    }

    out.flush()?;
    summary.log("display-semantic");
    Ok(summary)
}

/// Remove the rating and all tags of every supported file under `root` from
/// the semantic index.
pub async fn clear_semantic<W: Write>(
    semantic: &dyn StoreAdapter,
    root: &Path,
    classifier: &Classifier,
    recursive: bool,
    verbose: bool,
    out: &mut W,
) -> RunResult<RunSummary> {
    let files = FileScanner::new(recursive).scan_classified(root, classifier)?;
    let mut summary = RunSummary::default();

    for (path, _) in files {
        let Some(identity) = identity_of(&path) else {
            continue;
        };
        let mut report = FileReport::new(out, identity);

        let record = match semantic.read(identity).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                let outcome = ReconcileOutcome::NotTracked { store: semantic.name() };
                report.outcome(&outcome, verbose)?;
                summary.record(&outcome);
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.line(format_args!("Failed: {e}"))?;
                summary.record(&ReconcileOutcome::Failed {
                    reason: e,
                    attempted: Vec::new(),
                });
                continue;
            }
        };

        let mut ops = Vec::new();
        if let Some(tags) = record.tags().filter(|t| !t.is_empty()) {
            report.line(format_args!("Remove tags: {tags}"))?;
            ops.push(WriteOp::ClearAllTags);
        }
        if record.rating().is_some() {
            report.line("Clear rating")?;
            ops.push(WriteOp::ClearRating);
        }

        if ops.is_empty() {
            let outcome = ReconcileOutcome::Unchanged;
            report.outcome(&outcome, verbose)?;
            summary.record(&outcome);
            continue;
        }

        let outcome = match semantic.write(identity, &ops).await {
            Ok(()) => ReconcileOutcome::Applied(ops),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.line(format_args!("Failed: {e}"))?;
                ReconcileOutcome::Failed {
                    reason: e,
                    attempted: ops,
                }
            }
        };
        summary.record(&outcome);
    }

    out.flush()?;
    summary.log("clear-semantic");
    Ok(summary)
}

/// Print `<path>: <rating>` for every rated collection entry under `root`.
pub async fn display_collection<W: Write>(
    collection: &dyn StoreAdapter,
    root: &Path,
    recursive: bool,
    out: &mut W,
) -> RunResult<RunSummary> {
    let prefix = root.to_string_lossy();
    let mut summary = RunSummary::default();
    let mut known = collection.list_known_under(&prefix, recursive);

    while let Some(item) = known.next().await {
        let identity = match item {
            Ok(identity) => identity,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Skipping collection entry: {e}");
                summary.record(&ReconcileOutcome::Failed {
                    reason: e,
                    attempted: Vec::new(),
                });
                continue;
            }
        };
        match collection.read(&identity).await {
            Ok(record) => {
                if let Some(rating) = record.rating() {
                    writeln!(out, "{identity}: {rating}")?;
                }
                summary.record(&ReconcileOutcome::Unchanged);
            }
            // Listed but gone again: skip it
            Err(StoreError::NotFound(_)) => debug!(identity, "Entry vanished while listing"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("{identity}: {e}");
                summary.record(&ReconcileOutcome::Failed {
                    reason: e,
                    attempted: Vec::new(),
                });
            }
        }
    }

    out.flush()?;
    summary.log("display-collection");
    Ok(summary)
}

/// Run `sql` against the collection and print the result rows.
pub async fn query_collection<W: Write>(collection: &CollectionStore, sql: &str, out: &mut W) -> RunResult<()> {
    let rows = collection.query(sql).await?;
    for row in &rows {
        writeln!(out, "{row}")?;
    }
    out.flush()?;
    Ok(())
}
