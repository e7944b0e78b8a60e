//! Run-level errors
//!
//! Anything here stops the run. Per-file problems never become a `RunError`;
//! they are reported as `Failed` lines and the run moves on.

use neposync_common::StoreError;
use thiserror::Error;

use crate::scanner::ScanError;

#[derive(Debug, Error)]
pub enum RunError {
    /// The root directory cannot be walked
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A store became unusable (always `BackendUnavailable`)
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Report output failed
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunResult<T> = std::result::Result<T, RunError>;
