//! JPEG embedded metadata
//!
//! Rating comes from the XMP packet (APP1), tags from IPTC keywords (APP13).
//! A write rewrites the header segments in memory and replaces the file
//! through a temporary file in the same directory, so a failed write leaves
//! the original untouched.

pub mod iptc;
pub mod jpeg;
pub mod xmp;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use neposync_common::{
    MetadataRecord, RatingScale, StoreAdapter, StoreError, StoreResult, TagDiff, TagSet,
    WriteOp,
};
use thiserror::Error;
use tracing::debug;

use self::jpeg::{JpegFile, APP1, APP13};
use super::run_blocking;

/// Image metadata codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not a JPEG file")]
    NotJpeg,

    #[error("truncated data")]
    Truncated,

    #[error("invalid marker at offset {0}")]
    BadMarker(usize),

    #[error("unsupported IPTC length field of {0} bytes")]
    LengthField(usize),

    #[error("segment of {0} bytes does not fit in a JPEG marker segment")]
    SegmentTooLarge(usize),

    #[error("XMP: {0}")]
    Xml(String),
}

impl From<CodecError> for StoreError {
    fn from(err: CodecError) -> Self {
        StoreError::Unreadable(err.to_string())
    }
}

/// What an image file currently holds, in native units
#[derive(Debug, Default, PartialEq)]
struct ImageMetadata {
    rating: Option<u32>,
    keywords: Option<TagSet>,
}

fn decode(jpeg: &JpegFile) -> Result<ImageMetadata, CodecError> {
    let rating = match jpeg.app_payload(APP1, xmp::SIGNATURE) {
        Some(packet) => xmp::read_rating(packet)?,
        None => None,
    };
    let keywords = match jpeg.app_payload(APP13, iptc::SIGNATURE) {
        Some(payload) => iptc::read_keywords(payload)?,
        None => None,
    };
    Ok(ImageMetadata { rating, keywords })
}

fn load(path: &Path) -> StoreResult<JpegFile> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.display().to_string()));
    }
    let bytes =
        fs::read(path).map_err(|e| StoreError::Unreadable(format!("{}: {e}", path.display())))?;
    JpegFile::parse(&bytes).map_err(|e| StoreError::Unreadable(format!("{}: {e}", path.display())))
}

/// Replace `path` with `bytes`, keeping its permissions.
fn persist(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), fs::metadata(path)?.permissions())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn apply(path: &Path, ops: &[WriteOp], scale: RatingScale) -> StoreResult<()> {
    let mut jpeg = load(path)?;
    let current = decode(&jpeg).map_err(|e| StoreError::Unreadable(format!("{}: {e}", path.display())))?;

    let mut rating = None;
    let mut keywords = None;
    for op in ops {
        match op {
            WriteOp::SetRating(r) => rating = Some(Some(scale.from_canonical(*r))),
            WriteOp::ClearRating => rating = Some(None),
            WriteOp::SetTags { to_add, to_remove } => {
                let base = keywords
                    .take()
                    .or_else(|| current.keywords.clone())
                    .unwrap_or_default();
                let diff = TagDiff {
                    to_add: to_add.clone(),
                    to_remove: to_remove.clone(),
                };
                keywords = Some(base.apply(&diff));
            }
            WriteOp::ClearAllTags => keywords = Some(TagSet::new()),
        }
    }

    if let Some(rating) = rating {
        let packet = xmp::write_rating(jpeg.app_payload(APP1, xmp::SIGNATURE), rating)?;
        if let Some(packet) = packet {
            jpeg.set_app_payload(APP1, xmp::SIGNATURE, Some(packet));
        }
    }
    if let Some(keywords) = keywords {
        let payload = iptc::write_keywords(jpeg.app_payload(APP13, iptc::SIGNATURE), &keywords)?;
        jpeg.set_app_payload(APP13, iptc::SIGNATURE, Some(payload));
    }

    let bytes = jpeg.to_bytes()?;
    persist(path, &bytes).map_err(|e| StoreError::WriteRejected(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), ops = ops.len(), "Image metadata rewritten");
    Ok(())
}

pub struct ImageFileStore {
    scale: RatingScale,
}

impl ImageFileStore {
    /// `scale` is the native range of `xmp:Rating` in the files.
    pub fn new(scale: RatingScale) -> Self {
        Self { scale }
    }
}

#[async_trait]
impl StoreAdapter for ImageFileStore {
    fn name(&self) -> &'static str {
        "image"
    }

    fn rating_scale(&self) -> RatingScale {
        self.scale
    }

    fn supports_tags(&self) -> bool {
        true
    }

    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord> {
        let path = PathBuf::from(identity);
        let metadata = run_blocking(move || {
            let jpeg = load(&path)?;
            decode(&jpeg).map_err(|e| StoreError::Unreadable(format!("{}: {e}", path.display())))
        })
        .await?;

        let rating = metadata.rating.map(|n| self.scale.to_canonical(n));
        Ok(MetadataRecord::new(identity, rating, metadata.keywords))
    }

    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()> {
        let path = PathBuf::from(identity);
        let ops = ops.to_vec();
        let scale = self.scale;
        run_blocking(move || apply(&path, &ops, scale)).await
    }

    fn list_known_under<'a>(
        &'a self,
        _prefix: &'a str,
        _recursive: bool,
    ) -> BoxStream<'a, StoreResult<String>> {
        // Files are discovered by the driver's directory walk
        Box::pin(stream::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neposync_common::Rating;

    fn write_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("photo.jpg");
        fs::write(&path, jpeg::tests::tiny_jpeg()).unwrap();
        path
    }

    fn tags(labels: &[&str]) -> TagSet {
        labels.iter().copied().collect()
    }

    #[tokio::test]
    async fn bare_jpeg_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let store = ImageFileStore::new(RatingScale::CANONICAL);

        let record = store.read(path.to_str().unwrap()).await.unwrap();
        assert_eq!(record.rating(), None);
        assert_eq!(record.tags(), None);
    }

    #[tokio::test]
    async fn rating_and_tags_are_written_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let identity = path.to_str().unwrap();
        let store = ImageFileStore::new(RatingScale::new(5).unwrap());

        store
            .write(
                identity,
                &[
                    WriteOp::SetRating(Rating::new(8).unwrap()),
                    WriteOp::SetTags {
                        to_add: tags(&["beach", "sea"]),
                        to_remove: TagSet::new(),
                    },
                ],
            )
            .await
            .unwrap();

        let record = store.read(identity).await.unwrap();
        assert_eq!(record.rating(), Rating::new(8));
        assert_eq!(record.tags(), Some(&tags(&["beach", "sea"])));

        // Scan data untouched
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.ends_with(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0xFF, 0xD9]));
    }

    #[tokio::test]
    async fn clearing_leaves_absent_rating_and_empty_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let identity = path.to_str().unwrap();
        let store = ImageFileStore::new(RatingScale::CANONICAL);

        store
            .write(
                identity,
                &[
                    WriteOp::SetRating(Rating::new(3).unwrap()),
                    WriteOp::SetTags {
                        to_add: tags(&["x"]),
                        to_remove: TagSet::new(),
                    },
                ],
            )
            .await
            .unwrap();
        store
            .write(identity, &[WriteOp::ClearRating, WriteOp::ClearAllTags])
            .await
            .unwrap();

        let record = store.read(identity).await.unwrap();
        assert_eq!(record.rating(), None);
        assert_eq!(record.tags(), Some(&TagSet::new()));
    }

    #[tokio::test]
    async fn keyword_whitespace_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let identity = path.to_str().unwrap();
        let store = ImageFileStore::new(RatingScale::CANONICAL);

        let labels = tags(&["beach ", "beach", " sea"]);
        store
            .write(
                identity,
                &[WriteOp::SetTags {
                    to_add: labels.clone(),
                    to_remove: TagSet::new(),
                }],
            )
            .await
            .unwrap();

        let record = store.read(identity).await.unwrap();
        assert_eq!(record.tags(), Some(&labels));
    }

    #[tokio::test]
    async fn tag_diff_applies_to_existing_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let identity = path.to_str().unwrap();
        let store = ImageFileStore::new(RatingScale::CANONICAL);

        let set = |to_add: &[&str], to_remove: &[&str]| WriteOp::SetTags {
            to_add: tags(to_add),
            to_remove: tags(to_remove),
        };
        store.write(identity, &[set(&["b", "c"], &[])]).await.unwrap();
        store.write(identity, &[set(&["a"], &["c"])]).await.unwrap();

        let record = store.read(identity).await.unwrap();
        assert_eq!(record.tags(), Some(&tags(&["a", "b"])));
    }

    #[tokio::test]
    async fn non_jpeg_is_unreadable_and_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.jpg");
        fs::write(&path, b"not an image").unwrap();
        let identity = path.to_str().unwrap();
        let store = ImageFileStore::new(RatingScale::CANONICAL);

        let err = store.read(identity).await.unwrap_err();
        assert!(matches!(err, StoreError::Unreadable(_)));

        let err = store
            .write(identity, &[WriteOp::SetRating(Rating::new(1).unwrap())])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreadable(_)));
        assert_eq!(fs::read(&path).unwrap(), b"not an image");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageFileStore::new(RatingScale::CANONICAL);
        let missing = dir.path().join("nope.jpg");
        let err = store.read(missing.to_str().unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
