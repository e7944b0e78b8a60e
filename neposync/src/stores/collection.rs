//! Media-collection database
//!
//! Works on the subset of the collection schema holding user statistics:
//!
//! ```sql
//! urls(id INTEGER PRIMARY KEY, rpath TEXT UNIQUE)
//! statistics(url INTEGER UNIQUE, rating INTEGER)
//! ```
//!
//! `rpath` is the file's absolute path with a leading `.`. Ratings are 0-10;
//! 0 means unrated. The collection never learns about files from us, so
//! writing to a file it has not scanned is rejected.

use std::path::Path;

use async_stream::stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use neposync_common::store::is_under;
use neposync_common::{MetadataRecord, RatingScale, StoreAdapter, StoreError, StoreResult, WriteOp};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, SqlitePool, Statement};
use tracing::{debug, info};

use super::like_under;

/// How the collection database is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    /// Display and query actions; the database file is never modified
    ReadOnly,
}

pub struct CollectionStore {
    pool: SqlitePool,
}

/// Collection key of a file
fn rpath(identity: &str) -> String {
    format!(".{identity}")
}

impl CollectionStore {
    /// Open an existing collection database.
    pub async fn open(db_path: &Path, mode: AccessMode) -> StoreResult<Self> {
        if !db_path.is_file() {
            return Err(StoreError::BackendUnavailable(format!(
                "collection database not found: {}",
                db_path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(false)
            .read_only(mode == AccessMode::ReadOnly);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::BackendUnavailable(format!("collection database {}: {e}", db_path.display()))
            })?;

        let store = Self::from_pool(pool).await?;
        info!("Collection database: {} ({:?})", db_path.display(), mode);
        Ok(store)
    }

    /// Wrap a pool, checking that it holds a collection schema.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('urls', 'statistics')",
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| StoreError::BackendUnavailable(format!("collection database: {e}")))?;

        if tables != 2 {
            return Err(StoreError::BackendUnavailable(
                "not a collection database (missing urls/statistics tables)".to_string(),
            ));
        }
        Ok(Self { pool })
    }

    /// Run an arbitrary statement and render the result as text rows.
    ///
    /// The first row is the column names. Fields are joined with `,`; NULL
    /// renders as an empty field.
    pub async fn query(&self, sql: &str) -> StoreResult<Vec<String>> {
        let statement = (&self.pool)
            .prepare(sql)
            .await
            .map_err(|e| StoreError::Unreadable(format!("query: {e}")))?;
        let header = statement
            .columns()
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(",");

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Unreadable(format!("query: {e}")))?;

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(header);
        for row in &rows {
            let fields: Vec<String> = (0..row.len()).map(|i| render_field(row, i)).collect();
            lines.push(fields.join(","));
        }
        debug!(rows = rows.len(), "Collection query finished");
        Ok(lines)
    }
}

fn render_field(row: &SqliteRow, index: usize) -> String {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(|v| v.to_string()).unwrap_or_default();
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return value.map(|v| v.to_string()).unwrap_or_default();
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return value.unwrap_or_default();
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    String::new()
}

#[async_trait]
impl StoreAdapter for CollectionStore {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn rating_scale(&self) -> RatingScale {
        RatingScale::CANONICAL
    }

    fn supports_tags(&self) -> bool {
        false
    }

    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord> {
        let row: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT s.rating FROM urls u LEFT OUTER JOIN statistics s ON s.url = u.id WHERE u.rpath = ?",
        )
        .bind(rpath(identity))
        .fetch_optional(&self.pool)
        .await?;

        let Some((rating,)) = row else {
            return Err(StoreError::NotFound(identity.to_string()));
        };
        let rating = rating
            .filter(|n| *n > 0)
            .map(|n| self.rating_scale().to_canonical(u32::try_from(n).unwrap_or(0)));
        Ok(MetadataRecord::new(identity, rating, None))
    }

    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()> {
        let mut native = None;
        for op in ops {
            match op {
                WriteOp::SetRating(rating) => {
                    native = Some(i64::from(self.rating_scale().from_canonical(*rating)));
                }
                WriteOp::ClearRating => native = Some(0),
                WriteOp::SetTags { .. } | WriteOp::ClearAllTags => {
                    return Err(StoreError::WriteRejected(
                        "the collection does not store tags".to_string(),
                    ));
                }
            }
        }
        let Some(native) = native else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let url: Option<i64> = sqlx::query_scalar("SELECT id FROM urls WHERE rpath = ?")
            .bind(rpath(identity))
            .fetch_optional(&mut *tx)
            .await?;
        let Some(url) = url else {
            return Err(StoreError::WriteRejected(format!("{identity} is not in the collection")));
        };

        let updated = sqlx::query("UPDATE statistics SET rating = ? WHERE url = ?")
            .bind(native)
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            sqlx::query("INSERT INTO statistics (url, rating) VALUES (?, ?)")
                .bind(url)
                .bind(native)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(identity, rating = native, "Collection rating updated");
        Ok(())
    }

    fn list_known_under<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, StoreResult<String>> {
        Box::pin(stream! {
            let mut rows = sqlx::query_scalar::<_, String>(
                r#"
                SELECT u.rpath FROM statistics s JOIN urls u ON s.url = u.id
                WHERE u.rpath LIKE ? ESCAPE '\'
                  AND s.rating > 0
                ORDER BY u.rpath
                "#,
            )
            .bind(rpath(&like_under(prefix)))
            .fetch(&self.pool);

            // A row that fails to decode is reported and the listing goes on
            loop {
                match rows.try_next().await {
                    Ok(Some(key)) => {
                        let Some(path) = key.strip_prefix('.') else {
                            continue;
                        };
                        if is_under(path, prefix, recursive) {
                            yield Ok(path.to_string());
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let e = StoreError::from(e);
                        let fatal = e.is_fatal();
                        yield Err(e);
                        if fatal {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::rpath;

    #[test]
    fn collection_key_prefixes_a_dot() {
        assert_eq!(rpath("/music/a.mp3"), "./music/a.mp3");
    }
}
