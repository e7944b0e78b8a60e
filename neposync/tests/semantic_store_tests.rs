//! Semantic index adapter against a real SQLite file

use futures::TryStreamExt;
use neposync::stores::SemanticStore;
use neposync_common::{reconcile, MemoryStore, Rating, ReconcileOutcome, StoreAdapter, SyncPolicy, TagSet, WriteOp};

fn tags(labels: &[&str]) -> TagSet {
    labels.iter().copied().collect()
}

async fn open(dir: &tempfile::TempDir) -> SemanticStore {
    SemanticStore::open(&dir.path().join("index").join("semantic.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn unknown_resource_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    let err = store.read("/photos/a.jpg").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn write_creates_resource_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    store
        .write(
            "/photos/a.jpg",
            &[
                WriteOp::SetRating(Rating::new(6).unwrap()),
                WriteOp::SetTags {
                    to_add: tags(&["Beach", "beach"]),
                    to_remove: TagSet::new(),
                },
            ],
        )
        .await
        .unwrap();

    let record = store.read("/photos/a.jpg").await.unwrap();
    assert_eq!(record.rating(), Rating::new(6));
    assert_eq!(record.tags(), Some(&tags(&["Beach", "beach"])));
}

#[tokio::test]
async fn cleared_resource_is_known_but_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let set = [
        WriteOp::SetRating(Rating::new(2).unwrap()),
        WriteOp::SetTags {
            to_add: tags(&["x", "y"]),
            to_remove: TagSet::new(),
        },
    ];
    store.write("/a.jpg", &set).await.unwrap();
    store
        .write("/a.jpg", &[WriteOp::ClearRating, WriteOp::ClearAllTags])
        .await
        .unwrap();

    let record = store.read("/a.jpg").await.unwrap();
    assert_eq!(record.rating(), None);
    assert_eq!(record.tags(), Some(&TagSet::new()));
}

#[tokio::test]
async fn index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(&dir).await;
        store
            .write("/a.jpg", &[WriteOp::SetRating(Rating::new(9).unwrap())])
            .await
            .unwrap();
    }
    let store = open(&dir).await;
    assert_eq!(store.read("/a.jpg").await.unwrap().rating(), Rating::new(9));
}

#[tokio::test]
async fn listing_honours_recursion_and_skips_empty_resources() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let rate = |n| [WriteOp::SetRating(Rating::new(n).unwrap())];

    store.write("/m/a.jpg", &rate(1)).await.unwrap();
    store.write("/m/sub/b.jpg", &rate(2)).await.unwrap();
    store.write("/m_other/c.jpg", &rate(3)).await.unwrap();
    store.write("/m/empty.jpg", &rate(4)).await.unwrap();
    store.write("/m/empty.jpg", &[WriteOp::ClearRating]).await.unwrap();

    let direct: Vec<String> = store.list_known_under("/m", false).try_collect().await.unwrap();
    assert_eq!(direct, vec!["/m/a.jpg"]);

    let all: Vec<String> = store.list_known_under("/m/", true).try_collect().await.unwrap();
    assert_eq!(all, vec!["/m/a.jpg", "/m/sub/b.jpg"]);
}

#[tokio::test]
async fn reconcile_into_index_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let index = open(&dir).await;
    let files = MemoryStore::new("image");
    files.insert("/p/a.jpg", Some(7), Some(tags(&["sea", "sun"])));

    let policy = SyncPolicy { force: false };
    let first = reconcile(&files, &index, "/p/a.jpg", policy).await.unwrap();
    assert!(first.is_changed());

    let second = reconcile(&files, &index, "/p/a.jpg", policy).await.unwrap();
    assert_eq!(second, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn read_only_open_never_creates_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index").join("semantic.db");

    let err = SemanticStore::open_read_only(&path).await.err().unwrap();
    assert!(err.is_fatal());
    assert!(!dir.path().join("index").exists());
}

#[tokio::test]
async fn read_only_open_reads_but_refuses_writes() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(&dir).await;
        store
            .write("/a.jpg", &[WriteOp::SetRating(Rating::new(4).unwrap())])
            .await
            .unwrap();
    }

    let store = SemanticStore::open_read_only(&dir.path().join("index").join("semantic.db"))
        .await
        .unwrap();
    assert_eq!(store.read("/a.jpg").await.unwrap().rating(), Rating::new(4));
    assert!(store.write("/a.jpg", &[WriteOp::ClearRating]).await.is_err());
    assert_eq!(store.read("/a.jpg").await.unwrap().rating(), Rating::new(4));
}

