//! Concrete store adapters
//!
//! - `SemanticStore`: desktop semantic index (ratings + tags), SQLite
//! - `CollectionStore`: media-collection database (ratings only), SQLite
//! - `Id3FileStore`: ID3v2 POPM ratings embedded in MP3 files
//! - `ImageFileStore`: XMP rating and IPTC keywords embedded in JPEG files

pub mod collection;
pub mod id3_file;
pub mod image;
pub mod semantic;

pub use collection::{AccessMode, CollectionStore};
pub use id3_file::Id3FileStore;
pub use image::ImageFileStore;
pub use semantic::SemanticStore;

use neposync_common::{StoreError, StoreResult};

/// `LIKE` pattern matching everything below directory `prefix`.
///
/// Use with `ESCAPE '\'`.
pub(crate) fn like_under(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.trim_end_matches('/').chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str("/%");
    pattern
}

/// Run a blocking file codec off the async executor and wait for it.
pub(crate) async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Unreadable(format!("metadata task failed: {e}")))?
}
