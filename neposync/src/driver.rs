//! Traversal driver for the synchronization actions
//!
//! Walks the root, picks the (source, target) stores for each file kind and
//! runs the reconciliation engine once per file, strictly one file after the
//! other. Per-file failures are reported and skipped; a fatal store error
//! stops the run.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use neposync_common::{reconcile, StoreAdapter, SyncPolicy};
use tracing::{debug, warn};

use crate::error::RunResult;
use crate::report::{FileReport, RunSummary};
use crate::scanner::{Classifier, FileKind, FileScanner};

/// Synchronization direction selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Semantic index into image and audio files
    SemanticToFiles,
    /// Image and audio files into the semantic index
    FilesToSemantic,
    /// Collection database into audio files
    CollectionToFiles,
    /// Audio files into the collection database
    FilesToCollection,
}

impl Direction {
    pub fn uses_semantic(self) -> bool {
        matches!(self, Direction::SemanticToFiles | Direction::FilesToSemantic)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::SemanticToFiles => "semantic-to-files",
            Direction::FilesToSemantic => "files-to-semantic",
            Direction::CollectionToFiles => "collection-to-files",
            Direction::FilesToCollection => "files-to-collection",
        }
    }
}

/// One source/target pairing
#[derive(Clone, Copy)]
pub struct Route<'a> {
    pub source: &'a dyn StoreAdapter,
    pub target: &'a dyn StoreAdapter,
}

/// Stores opened for a run. `image`/`audio` are the embedded-metadata stores;
/// `index` is the semantic index or the collection, depending on direction.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub index: &'a dyn StoreAdapter,
    pub image: &'a dyn StoreAdapter,
    pub audio: &'a dyn StoreAdapter,
}

impl<'a> Stores<'a> {
    /// Route for `kind` in `direction`, `None` when that kind is not synced.
    pub fn route(&self, direction: Direction, kind: FileKind) -> Option<Route<'a>> {
        let files = match kind {
            FileKind::Image => self.image,
            FileKind::Audio => self.audio,
        };
        match (direction, kind) {
            (Direction::SemanticToFiles, _) | (Direction::CollectionToFiles, FileKind::Audio) => Some(Route {
                source: self.index,
                target: files,
            }),
            (Direction::FilesToSemantic, _) | (Direction::FilesToCollection, FileKind::Audio) => Some(Route {
                source: files,
                target: self.index,
            }),
            // The collection only knows audio
            (Direction::CollectionToFiles | Direction::FilesToCollection, FileKind::Image) => None,
        }
    }
}

/// Options of one traversal
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub recursive: bool,
    pub policy: SyncPolicy,
    pub verbose: bool,
}

/// Identity of a walked file, `None` for paths that are not valid UTF-8
pub fn identity_of(path: &Path) -> Option<&str> {
    let identity = path.to_str();
    if identity.is_none() {
        warn!("Skipping non UTF-8 path: {}", path.display());
    }
    identity
}

/// Absolute root for `dir`, relative paths resolved against `cwd`.
///
/// Purely lexical: `.` is dropped and `..` pops a component, the way a shell
/// tracks its logical working directory. Symlinks are never resolved.
pub fn resolve_root(dir: Option<&Path>, cwd: &Path) -> PathBuf {
    let joined = match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    };

    let mut root = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                root.pop();
            }
            other => root.push(other),
        }
    }
    root
}

/// Reconcile every supported file under `root` in `direction`.
pub async fn sync_tree<W: Write>(
    root: &Path,
    direction: Direction,
    stores: Stores<'_>,
    classifier: &Classifier,
    options: RunOptions,
    out: &mut W,
) -> RunResult<RunSummary> {
    let files = FileScanner::new(options.recursive).scan_classified(root, classifier)?;
    let mut summary = RunSummary::default();

    for (path, kind) in files {
        let Some(route) = stores.route(direction, kind) else {
            debug!("No {} route for {}", direction.label(), path.display());
            continue;
        };
        let Some(identity) = identity_of(&path) else {
            continue;
        };

        let outcome = reconcile(route.source, route.target, identity, options.policy).await?;
        FileReport::new(out, identity).outcome(&outcome, options.verbose)?;
        summary.record(&outcome);
    }

    out.flush()?;
    summary.log(direction.label());
    Ok(summary)
}
