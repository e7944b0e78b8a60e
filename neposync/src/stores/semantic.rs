//! Semantic desktop index
//!
//! Resources are files keyed by absolute path, each with an optional 0-10
//! rating and any number of labelled tags. The index is created on first use
//! and resources are created on demand when written, so writing never fails
//! for an unknown file.

use std::path::Path;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use neposync_common::store::is_under;
use neposync_common::{
    MetadataRecord, RatingScale, StoreAdapter, StoreError, StoreResult, TagSet, WriteOp,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use super::like_under;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS resources (
        id INTEGER PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        rating INTEGER CHECK (rating IS NULL OR rating BETWEEN 0 AND 10)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resource_tags (
        resource_id INTEGER NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (resource_id, tag_id)
    )
    "#,
];

pub struct SemanticStore {
    pool: SqlitePool,
}

impl SemanticStore {
    /// Open the index at `db_path`, creating file and schema if needed.
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::BackendUnavailable(format!("{}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = connect(db_path, options).await?;

        let store = Self::from_pool(pool).await?;
        info!("Semantic index: {}", db_path.display());
        Ok(store)
    }

    /// Open an existing index for reading; nothing is created or modified.
    pub async fn open_read_only(db_path: &Path) -> StoreResult<Self> {
        if !db_path.is_file() {
            return Err(StoreError::BackendUnavailable(format!(
                "semantic index not found: {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(false)
            .read_only(true);
        let pool = connect(db_path, options).await?;

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('resources', 'tags', 'resource_tags')",
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| StoreError::BackendUnavailable(format!("semantic index: {e}")))?;
        if tables != 3 {
            return Err(StoreError::BackendUnavailable(format!(
                "{} is not a semantic index",
                db_path.display()
            )));
        }

        info!("Semantic index: {} (read-only)", db_path.display());
        Ok(Self { pool })
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::BackendUnavailable(format!("semantic index schema: {e}")))?;
        }
        Ok(Self { pool })
    }

    async fn ensure_resource(tx: &mut Transaction<'_, Sqlite>, path: &str) -> StoreResult<i64> {
        sqlx::query("INSERT INTO resources (path) VALUES (?) ON CONFLICT(path) DO NOTHING")
            .bind(path)
            .execute(&mut **tx)
            .await?;
        let id = sqlx::query_scalar("SELECT id FROM resources WHERE path = ?")
            .bind(path)
            .fetch_one(&mut **tx)
            .await?;
        Ok(id)
    }

    async fn add_tag(tx: &mut Transaction<'_, Sqlite>, resource_id: i64, label: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO tags (label) VALUES (?) ON CONFLICT(label) DO NOTHING")
            .bind(label)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO resource_tags (resource_id, tag_id) SELECT ?, id FROM tags WHERE label = ?",
        )
        .bind(resource_id)
        .bind(label)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn remove_tag(tx: &mut Transaction<'_, Sqlite>, resource_id: i64, label: &str) -> StoreResult<()> {
        sqlx::query(
            "DELETE FROM resource_tags WHERE resource_id = ? AND tag_id IN (SELECT id FROM tags WHERE label = ?)",
        )
        .bind(resource_id)
        .bind(label)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

async fn connect(db_path: &Path, options: SqliteConnectOptions) -> StoreResult<SqlitePool> {
    // One connection: the index is never used from more than one task
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::BackendUnavailable(format!("semantic index {}: {e}", db_path.display())))
}

#[async_trait]
impl StoreAdapter for SemanticStore {
    fn name(&self) -> &'static str {
        "semantic index"
    }

    fn rating_scale(&self) -> RatingScale {
        RatingScale::CANONICAL
    }

    fn supports_tags(&self) -> bool {
        true
    }

    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord> {
        let row: Option<(i64, Option<i64>)> =
            sqlx::query_as("SELECT id, rating FROM resources WHERE path = ?")
                .bind(identity)
                .fetch_optional(&self.pool)
                .await?;
        let Some((id, rating)) = row else {
            return Err(StoreError::NotFound(identity.to_string()));
        };

        let labels: Vec<String> = sqlx::query_scalar(
            "SELECT t.label FROM tags t JOIN resource_tags rt ON rt.tag_id = t.id WHERE rt.resource_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let rating = rating.map(|n| self.rating_scale().to_canonical(u32::try_from(n).unwrap_or(0)));
        Ok(MetadataRecord::new(identity, rating, Some(labels.into_iter().collect::<TagSet>())))
    }

    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let resource_id = Self::ensure_resource(&mut tx, identity).await?;

        for op in ops {
            match op {
                WriteOp::SetRating(rating) => {
                    let native = i64::from(self.rating_scale().from_canonical(*rating));
                    sqlx::query("UPDATE resources SET rating = ? WHERE id = ?")
                        .bind(native)
                        .bind(resource_id)
                        .execute(&mut *tx)
                        .await?;
                }
                WriteOp::ClearRating => {
                    sqlx::query("UPDATE resources SET rating = NULL WHERE id = ?")
                        .bind(resource_id)
                        .execute(&mut *tx)
                        .await?;
                }
                WriteOp::SetTags { to_add, to_remove } => {
                    for label in to_remove.iter() {
                        Self::remove_tag(&mut tx, resource_id, label).await?;
                    }
                    for label in to_add.iter() {
                        Self::add_tag(&mut tx, resource_id, label).await?;
                    }
                }
                WriteOp::ClearAllTags => {
                    sqlx::query("DELETE FROM resource_tags WHERE resource_id = ?")
                        .bind(resource_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        debug!(identity, ops = ops.len(), "Semantic index updated");
        Ok(())
    }

    fn list_known_under<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StoreResult<String>> {
        Box::pin(try_stream! {
            let mut rows = sqlx::query_scalar::<_, String>(
                r#"
                SELECT r.path FROM resources r
                WHERE r.path LIKE ? ESCAPE '\'
                  AND (r.rating IS NOT NULL
                       OR EXISTS (SELECT 1 FROM resource_tags rt WHERE rt.resource_id = r.id))
                ORDER BY r.path
                "#,
            )
            .bind(like_under(prefix))
            .fetch(&self.pool);

            while let Some(path) = rows.try_next().await.map_err(StoreError::from)? {
                if is_under(&path, prefix, recursive) {
                    yield path;
                }
            }
        })
    }
}
