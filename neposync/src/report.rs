//! Operator report
//!
//! The report is plain text on stdout, one `File: <path>` header per file
//! followed by indented sub-lines. A file that produces no sub-line produces
//! no header either.

use std::fmt::Display;
use std::io::{self, Write};

use neposync_common::{ReconcileOutcome, WriteOp};
use tracing::info;

/// Output context for one file: writes the header lazily, at most once.
pub struct FileReport<'a, W: Write> {
    out: &'a mut W,
    path: &'a str,
    header_written: bool,
}

impl<'a, W: Write> FileReport<'a, W> {
    pub fn new(out: &'a mut W, path: &'a str) -> Self {
        Self {
            out,
            path,
            header_written: false,
        }
    }

    pub fn line(&mut self, text: impl Display) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "File: {}", self.path)?;
            self.header_written = true;
        }
        writeln!(self.out, "  {text}")
    }

    pub fn has_output(&self) -> bool {
        self.header_written
    }

    /// Lines describing the writes a reconciliation needed.
    pub fn needs(&mut self, ops: &[WriteOp]) -> io::Result<()> {
        for op in ops {
            match op {
                WriteOp::SetRating(rating) => self.line(format_args!("Needs to copy rating: {rating}/10"))?,
                WriteOp::ClearRating => self.line("Needs to clear rating")?,
                WriteOp::SetTags { to_add, to_remove } => {
                    if !to_add.is_empty() {
                        self.line(format_args!("Needs to add tags: {to_add}"))?;
                    }
                    if !to_remove.is_empty() {
                        self.line(format_args!("Needs to remove tags: {to_remove}"))?;
                    }
                }
                WriteOp::ClearAllTags => self.line("Needs to clear all tags")?,
            }
        }
        Ok(())
    }

    /// Report a reconciliation outcome. Quiet outcomes only show when verbose.
    pub fn outcome(&mut self, outcome: &ReconcileOutcome, verbose: bool) -> io::Result<()> {
        match outcome {
            ReconcileOutcome::Applied(ops) => self.needs(ops),
            ReconcileOutcome::Failed { reason, attempted } => {
                self.needs(attempted)?;
                self.line(format_args!("Failed: {reason}"))
            }
            ReconcileOutcome::Unchanged if verbose => self.line("Unchanged"),
            ReconcileOutcome::NotTracked { store } if verbose => {
                self.line(format_args!("Not tracked in {store}"))
            }
            ReconcileOutcome::Unchanged | ReconcileOutcome::NotTracked { .. } => Ok(()),
        }
    }
}

/// Per-run tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub visited: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub not_tracked: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ReconcileOutcome) {
        self.visited += 1;
        match outcome {
            ReconcileOutcome::Applied(_) => self.changed += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::NotTracked { .. } => self.not_tracked += 1,
            ReconcileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn log(&self, action: &str) {
        info!(
            "{action}: {} files visited, {} changed, {} unchanged, {} not tracked, {} failed",
            self.visited, self.changed, self.unchanged, self.not_tracked, self.failed
        );
    }
}
