//! Stable exit codes for the labtool CLI.

/// The action completed.
pub const OK: i32 = 0;
/// The action failed, or the tool could not start (bad config, log file).
pub const FAILED: i32 = 1;
