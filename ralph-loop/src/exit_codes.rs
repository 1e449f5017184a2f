//! Stable exit codes for the loop controller.

/// Loop stopped normally (including agent failure and user interrupt).
pub const OK: i32 = 0;
/// Missing plugin descriptor, agent definition, or agent binary.
pub const INVALID: i32 = 1;
