//! ID3v2 embedded ratings
//!
//! The rating lives in a POPM (popularimeter) frame on a 0-255 scale. Audio
//! files carry no tags as far as synchronization is concerned.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use id3::frame::{Content, Popularimeter};
use id3::{ErrorKind, Frame, Tag, TagLike, Version};
use neposync_common::{MetadataRecord, RatingScale, StoreAdapter, StoreError, StoreResult, WriteOp};
use tracing::debug;

use super::run_blocking;

pub struct Id3FileStore {
    popm_user: String,
}

impl Id3FileStore {
    /// `popm_user` is the e-mail field written into new POPM frames.
    pub fn new(popm_user: impl Into<String>) -> Self {
        Self {
            popm_user: popm_user.into(),
        }
    }
}

/// First POPM frame's (rating, play counter)
fn popm(tag: &Tag) -> Option<(u8, u64)> {
    tag.frames().find_map(|frame| match frame.content() {
        Content::Popularimeter(p) if frame.id() == "POPM" => Some((p.rating, p.counter)),
        _ => None,
    })
}

/// Tag of `path`, `None` if the file has no ID3v2 tag.
fn read_tag(path: &Path) -> StoreResult<Option<Tag>> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.display().to_string()));
    }
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(Some(tag)),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(None),
        Err(e) => Err(StoreError::Unreadable(format!("{}: {e}", path.display()))),
    }
}

fn read_rating(path: &Path) -> StoreResult<Option<u8>> {
    Ok(read_tag(path)?.and_then(|tag| popm(&tag)).map(|(rating, _)| rating))
}

fn write_rating(path: &Path, ops: &[WriteOp], user: &str) -> StoreResult<()> {
    let mut rating: Option<Option<u8>> = None;
    for op in ops {
        match op {
            WriteOp::SetRating(r) => {
                let native = RatingScale::POPM.from_canonical(*r);
                rating = Some(Some(u8::try_from(native).unwrap_or(u8::MAX)));
            }
            WriteOp::ClearRating => rating = Some(None),
            WriteOp::SetTags { .. } | WriteOp::ClearAllTags => {
                return Err(StoreError::WriteRejected(
                    "audio files do not carry tags".to_string(),
                ));
            }
        }
    }
    let Some(rating) = rating else {
        return Ok(());
    };

    let (mut tag, version) = match read_tag(path)? {
        Some(tag) => {
            // id3 cannot write v2.2
            let version = match tag.version() {
                Version::Id3v22 => Version::Id3v24,
                v => v,
            };
            (tag, version)
        }
        None => (Tag::new(), Version::Id3v24),
    };

    let counter = popm(&tag).map(|(_, counter)| counter).unwrap_or(0);
    let _ = tag.remove("POPM");
    if let Some(rating) = rating {
        let _ = tag.add_frame(Frame::with_content(
            "POPM",
            Content::Popularimeter(Popularimeter {
                user: user.to_string(),
                rating,
                counter,
            }),
        ));
    }

    tag.write_to_path(path, version)
        .map_err(|e| StoreError::Unreadable(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), ?rating, "POPM frame written");
    Ok(())
}

#[async_trait]
impl StoreAdapter for Id3FileStore {
    fn name(&self) -> &'static str {
        "id3"
    }

    fn rating_scale(&self) -> RatingScale {
        RatingScale::POPM
    }

    fn supports_tags(&self) -> bool {
        false
    }

    async fn read(&self, identity: &str) -> StoreResult<MetadataRecord> {
        let path = PathBuf::from(identity);
        let native = run_blocking(move || read_rating(&path)).await?;
        let rating = native.map(|n| self.rating_scale().to_canonical(u32::from(n)));
        Ok(MetadataRecord::new(identity, rating, None))
    }

    async fn write(&self, identity: &str, ops: &[WriteOp]) -> StoreResult<()> {
        let path = PathBuf::from(identity);
        let ops = ops.to_vec();
        let user = self.popm_user.clone();
        run_blocking(move || write_rating(&path, &ops, &user)).await
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

    fn mp3_without_tag(dir: &Path) -> PathBuf {
        let path = dir.join("song.mp3");
        // MPEG-1 layer III frame header followed by silence
        let mut bytes = vec![0xFF, 0xFB, 0x90, 0x64];
        bytes.resize(417, 0);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn untagged_file_has_no_rating() {
        let dir = tempfile::tempdir().unwrap();
        let path = mp3_without_tag(dir.path());
        assert_eq!(read_rating(&path).unwrap(), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_rating(&dir.path().join("gone.mp3")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn set_then_clear_popm() {
        let dir = tempfile::tempdir().unwrap();
        let path = mp3_without_tag(dir.path());

        let seven = Rating::new(7).unwrap();
        write_rating(&path, &[WriteOp::SetRating(seven)], "me@example.org").unwrap();
        assert_eq!(read_rating(&path).unwrap(), Some(179));

        let tag = Tag::read_from_path(&path).unwrap();
        let frames: Vec<_> = tag.frames().filter(|f| f.id() == "POPM").collect();
        assert_eq!(frames.len(), 1);

        write_rating(&path, &[WriteOp::ClearRating], "me@example.org").unwrap();
        assert_eq!(read_rating(&path).unwrap(), None);
    }

    #[test]
    fn play_counter_survives_rating_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = mp3_without_tag(dir.path());

        let mut tag = Tag::new();
        let _ = tag.add_frame(Frame::with_content(
            "POPM",
            Content::Popularimeter(Popularimeter {
                user: "player".to_string(),
                rating: 64,
                counter: 42,
            }),
        ));
        tag.write_to_path(&path, Version::Id3v23).unwrap();

        write_rating(&path, &[WriteOp::SetRating(Rating::new(10).unwrap())], "").unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(popm(&tag), Some((255, 42)));
        assert_eq!(tag.version(), Version::Id3v23);
    }

    #[test]
    fn tag_ops_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = mp3_without_tag(dir.path());
        let err = write_rating(&path, &[WriteOp::ClearAllTags], "").unwrap_err();
        assert!(matches!(err, StoreError::WriteRejected(_)));
    }
}
