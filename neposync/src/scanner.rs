//! Media file discovery
//!
//! Walks a directory tree (or a single level of it) and classifies files by
//! extension. Paths are reported as walked: the root is never canonicalized
//! and symlinked files keep their link path, so the identities handed to the
//! stores are stable between runs.

use std::path::{Path, PathBuf};

use neposync_common::config::Config;
use thiserror::Error;
use walkdir::WalkDir;

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// What a file is, as far as synchronization goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// JPEG with XMP rating and IPTC keywords
    Image,
    /// MP3 with an ID3v2 POPM rating
    Audio,
}

/// Extension-based classification
#[derive(Debug, Clone)]
pub struct Classifier {
    image_extensions: Vec<String>,
    audio_extensions: Vec<String>,
}

impl Classifier {
    /// Extensions are expected lowercase and without the dot.
    pub fn new(image_extensions: Vec<String>, audio_extensions: Vec<String>) -> Self {
        Self {
            image_extensions,
            audio_extensions,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.image_extensions.clone(), config.audio_extensions.clone())
    }

    /// `None` for unsupported files
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if self.image_extensions.iter().any(|e| *e == ext) {
            Some(FileKind::Image)
        } else if self.audio_extensions.iter().any(|e| *e == ext) {
            Some(FileKind::Audio)
        } else {
            None
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            vec!["jpg".to_string(), "jpeg".to_string()],
            vec!["mp3".to_string()],
        )
    }
}

/// Directory walker
pub struct FileScanner {
    recursive: bool,
}

impl FileScanner {
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    /// Files under `root`, sorted by name within each directory.
    ///
    /// Unreadable entries are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .follow_links(false)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    // Symlinked files count, symlinked directories are not entered
                    let is_file = entry.file_type().is_file()
                        || (entry.path_is_symlink() && entry.path().is_file());
                    if is_file {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        tracing::debug!("Scan complete: {} files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Classified files under `root`; unsupported files are dropped.
    pub fn scan_classified(
        &self,
        root: &Path,
        classifier: &Classifier,
    ) -> Result<Vec<(PathBuf, FileKind)>, ScanError> {
        Ok(self
            .scan(root)?
            .into_iter()
            .filter_map(|path| classifier.classify(&path).map(|kind| (path, kind)))
            .collect())
    }
}
