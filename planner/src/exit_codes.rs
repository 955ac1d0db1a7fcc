//! Stable exit codes for planner CLI commands.

/// Command succeeded; for `run`/`resume` the mission completed.
pub const OK: i32 = 0;
/// Invalid input, config or storage error.
pub const INVALID: i32 = 1;
/// `run`/`resume` finished with the mission `FAILED`.
pub const MISSION_FAILED: i32 = 2;
/// `probe` could not reach the reasoning service.
pub const UNAVAILABLE: i32 = 3;
