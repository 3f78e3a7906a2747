//! Stable exit codes for looper CLI commands.

/// Command succeeded, or the planned iterations all ran.
pub const OK: i32 = 0;
/// Command failed: bad layout/config, preflight failure, or other errors.
pub const INVALID: i32 = 1;
/// The task document reports no remaining work.
pub const COMPLETE: i32 = 2;
/// A cost ceiling halted the loop.
pub const LIMIT: i32 = 3;
/// The loop was interrupted between iterations.
pub const INTERRUPTED: i32 = 4;
