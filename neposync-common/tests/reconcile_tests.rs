//! Reconciliation engine tests against the in-memory reference store
//!
//! Covers the rating tri-state policy, tag diffing, idempotence and per-file
//! failure isolation.

use neposync_common::{
    reconcile, MemoryStore, Rating, RatingScale, ReconcileOutcome, StoreAdapter, StoreError,
    SyncPolicy, TagSet, WriteOp,
};

const FILE: &str = "/photos/beach.jpg";

fn tags(labels: &[&str]) -> Option<TagSet> {
    Some(labels.iter().copied().collect())
}

fn policy(force: bool) -> SyncPolicy {
    SyncPolicy { force }
}

#[tokio::test]
async fn copies_rating_into_empty_target() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");
    source.insert(FILE, Some(7), None);
    target.insert(FILE, None, None);

    let outcome = reconcile(&source, &target, FILE, policy(false)).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Applied(vec![WriteOp::SetRating(Rating::new(7).unwrap())])
    );
    assert_eq!(target.snapshot(FILE).unwrap().0, Some(7));
}

#[tokio::test]
async fn absent_source_rating_leaves_target_without_force() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");
    source.insert(FILE, None, None);
    target.insert(FILE, Some(5), None);

    let outcome = reconcile(&source, &target, FILE, policy(false)).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(target.snapshot(FILE).unwrap().0, Some(5));
}

#[tokio::test]
async fn absent_source_rating_clears_target_with_force() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");
    source.insert(FILE, None, None);
    target.insert(FILE, Some(5), None);

    let outcome = reconcile(&source, &target, FILE, policy(true)).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied(vec![WriteOp::ClearRating]));
    assert_eq!(target.snapshot(FILE).unwrap().0, None);
}

#[tokio::test]
async fn tag_diff_is_independent_of_force() {
    for force in [false, true] {
        let source = MemoryStore::new("source");
        let target = MemoryStore::new("target");
        source.insert(FILE, None, tags(&["a", "b"]));
        target.insert(FILE, None, tags(&["b", "c"]));

        let outcome = reconcile(&source, &target, FILE, policy(force)).await.unwrap();

        let ReconcileOutcome::Applied(ops) = outcome else {
            panic!("expected applied writes, got {outcome:?}");
        };
        assert_eq!(
            ops,
            vec![WriteOp::SetTags {
                to_add: ["a"].into_iter().collect(),
                to_remove: ["c"].into_iter().collect(),
            }]
        );
        assert_eq!(target.snapshot(FILE).unwrap().1, tags(&["a", "b"]));
    }
}

#[tokio::test]
async fn second_run_is_unchanged() {
    for force in [false, true] {
        let source = MemoryStore::new("source");
        let target = MemoryStore::new("target").with_scale(RatingScale::POPM);
        source.insert(FILE, Some(3), tags(&["sea", "sun"]));
        target.insert(FILE, Some(200), tags(&["rain"]));

        let first = reconcile(&source, &target, FILE, policy(force)).await.unwrap();
        assert!(first.is_changed());

        let second = reconcile(&source, &target, FILE, policy(force)).await.unwrap();
        assert_eq!(second, ReconcileOutcome::Unchanged);
    }
}

#[tokio::test]
async fn forced_clear_is_idempotent() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");
    source.insert(FILE, Some(0), tags(&[]));
    target.insert(FILE, Some(4), tags(&["x"]));

    let first = reconcile(&source, &target, FILE, policy(true)).await.unwrap();
    assert!(first.is_changed());
    let second = reconcile(&source, &target, FILE, policy(true)).await.unwrap();
    assert_eq!(second, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn untracked_source_file_is_skipped() {
    let source = MemoryStore::new("semantic");
    let target = MemoryStore::new("target");
    target.insert(FILE, Some(5), None);

    let outcome = reconcile(&source, &target, FILE, policy(true)).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::NotTracked { store: "semantic" });
    assert_eq!(target.write_count(), 0);
}

#[tokio::test]
async fn unknown_target_is_read_as_empty() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target");
    source.insert(FILE, Some(9), tags(&["a"]));

    let outcome = reconcile(&source, &target, FILE, policy(false)).await.unwrap();

    assert!(outcome.is_changed());
    assert_eq!(target.snapshot(FILE), Some((Some(9), tags(&["a"]))));
}

#[tokio::test]
async fn rejected_write_fails_one_file_and_processing_continues() {
    let source = MemoryStore::new("files").without_tags();
    let target = MemoryStore::new("collection").without_tags().require_known();
    source.insert("/m/unknown.mp3", Some(8), None);
    source.insert("/m/known.mp3", Some(6), None);
    target.insert("/m/known.mp3", None, None);

    let first = reconcile(&source, &target, "/m/unknown.mp3", policy(false))
        .await
        .unwrap();
    match first {
        ReconcileOutcome::Failed { reason, attempted } => {
            assert!(matches!(reason, StoreError::WriteRejected(_)));
            assert_eq!(attempted, vec![WriteOp::SetRating(Rating::new(8).unwrap())]);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let second = reconcile(&source, &target, "/m/known.mp3", policy(false))
        .await
        .unwrap();
    assert!(second.is_changed());
    assert_eq!(target.snapshot("/m/known.mp3").unwrap().0, Some(6));
}

#[tokio::test]
async fn unavailable_backend_is_fatal() {
    let source = MemoryStore::new("source");
    let target = MemoryStore::new("target").unavailable();
    source.insert(FILE, Some(2), None);

    let err = reconcile(&source, &target, FILE, policy(false)).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn tags_are_left_alone_when_target_cannot_hold_them() {
    let source = MemoryStore::new("semantic");
    let target = MemoryStore::new("id3").without_tags().with_scale(RatingScale::POPM);
    source.insert(FILE, Some(10), tags(&["a"]));

    let outcome = reconcile(&source, &target, FILE, policy(true)).await.unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Applied(vec![WriteOp::SetRating(Rating::new(10).unwrap())])
    );
    assert!(!target.supports_tags());
    assert_eq!(target.snapshot(FILE).unwrap().0, Some(255));
}
