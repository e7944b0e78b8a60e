//! # neposync
//!
//! Keeps ratings and tags of a media tree consistent between:
//! - the semantic desktop index
//! - the media-collection database
//! - metadata embedded in the files (JPEG XMP/IPTC, MP3 ID3v2)
//!
//! The reconciliation rules live in `neposync_common`; this crate provides
//! the concrete stores, the traversal driver, the report and the CLI.

pub mod actions;
pub mod cli;
pub mod driver;
pub mod error;
pub mod exit_codes;
pub mod report;
pub mod scanner;
pub mod stores;

pub use driver::{sync_tree, Direction, RunOptions, Stores};
pub use error::{RunError, RunResult};
pub use report::{FileReport, RunSummary};
pub use scanner::{Classifier, FileKind, FileScanner};
