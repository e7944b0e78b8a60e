//! Command-line interface
//!
//! Exactly one action per invocation. No action at all prints the help and
//! succeeds; more than one is a usage error.

use std::env;
use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, Parser};
use neposync_common::config::Overrides;
use thiserror::Error;

use crate::driver::{resolve_root, Direction};

/// Command-line arguments for neposync
#[derive(Parser, Debug)]
#[command(name = "neposync")]
#[command(about = "Synchronize ratings and tags between the semantic index, the media collection and file metadata")]
#[command(version, disable_version_flag = true)]
pub struct Args {
    /// Copy ratings and tags from the semantic index into files
    #[arg(long)]
    pub semantic_to_files: bool,

    /// Copy ratings and tags from files into the semantic index
    #[arg(long)]
    pub files_to_semantic: bool,

    /// Show ratings and tags held by the semantic index
    #[arg(long)]
    pub display_semantic: bool,

    /// Remove all ratings and tags from the semantic index
    #[arg(long)]
    pub clear_semantic: bool,

    /// Copy ratings from the collection database into audio files
    #[arg(long)]
    pub collection_to_files: bool,

    /// Copy ratings from audio files into the collection database
    #[arg(long)]
    pub files_to_collection: bool,

    /// Show ratings held by the collection database
    #[arg(long)]
    pub display_collection: bool,

    /// Run a read-only SQL query against the collection database
    #[arg(long, value_name = "SQL")]
    pub query_collection: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Clear target data when the source has none
    #[arg(short, long)]
    pub force: bool,

    /// Report unchanged and untracked files, enable debug logging
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Semantic index database
    #[arg(long, value_name = "FILE")]
    pub semantic_db: Option<PathBuf>,

    /// Collection database
    #[arg(long, value_name = "FILE")]
    pub collection_db: Option<PathBuf>,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Directory to process (default: current directory)
    pub directory: Option<PathBuf>,
}

/// The action selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Sync(Direction),
    DisplaySemantic,
    ClearSemantic,
    DisplayCollection,
    QueryCollection(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Sync(direction) => direction.label(),
            Action::DisplaySemantic => "display-semantic",
            Action::ClearSemantic => "clear-semantic",
            Action::DisplayCollection => "display-collection",
            Action::QueryCollection(_) => "query-collection",
        }
    }

    /// Actions on which `--force` means something
    pub fn honours_force(&self) -> bool {
        matches!(self, Action::Sync(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Only one action may be given, got: {}", .0.join(", "))]
    ConflictingActions(Vec<&'static str>),
}

impl Args {
    /// The single requested action, `None` when no action was given.
    pub fn action(&self) -> Result<Option<Action>, UsageError> {
        let candidates = [
            (self.semantic_to_files, Action::Sync(Direction::SemanticToFiles)),
            (self.files_to_semantic, Action::Sync(Direction::FilesToSemantic)),
            (self.display_semantic, Action::DisplaySemantic),
            (self.clear_semantic, Action::ClearSemantic),
            (self.collection_to_files, Action::Sync(Direction::CollectionToFiles)),
            (self.files_to_collection, Action::Sync(Direction::FilesToCollection)),
            (self.display_collection, Action::DisplayCollection),
        ];
        let mut selected: Vec<Action> = candidates
            .into_iter()
            .filter_map(|(set, action)| set.then_some(action))
            .collect();
        if let Some(sql) = &self.query_collection {
            selected.push(Action::QueryCollection(sql.clone()));
        }

        match selected.len() {
            0 => Ok(None),
            1 => Ok(selected.pop()),
            _ => Err(UsageError::ConflictingActions(
                selected.iter().map(Action::name).collect(),
            )),
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            semantic_db: self.semantic_db.clone(),
            collection_db: self.collection_db.clone(),
        }
    }

    /// Root directory of the run.
    pub fn root(&self) -> std::io::Result<PathBuf> {
        Ok(resolve_root(self.directory.as_deref(), &logical_cwd()?))
    }

    pub fn print_help() {
        // Nothing useful to do if stdout is gone
        let _ = Args::command().print_help();
    }
}

/// Working directory as the shell sees it.
///
/// `$PWD` keeps symlinked path components that `current_dir` resolves away;
/// it is used when it names the same directory.
pub fn logical_cwd() -> std::io::Result<PathBuf> {
    let physical = env::current_dir()?;
    if let Some(pwd) = env::var_os("PWD").map(PathBuf::from) {
        if pwd.is_absolute() && same_dir(&pwd, &physical) {
            return Ok(pwd);
        }
    }
    Ok(physical)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
