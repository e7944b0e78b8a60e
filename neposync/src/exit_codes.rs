//! Process exit codes
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success, help, version, or no action given                     |
//! | 1    | Usage error, or a required store/config could not be used     |
//!
//! Per-file failures during a run do not change the exit code.

/// Success, including help/version output and the no-action case.
pub const EXIT_SUCCESS: u8 = 0;

/// Bad invocation: unknown flag, missing value, conflicting actions.
pub const EXIT_USAGE: u8 = 1;

/// Fatal run error: unusable store, bad configuration, missing root.
pub const EXIT_ERROR: u8 = 1;
