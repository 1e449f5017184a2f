//! External loop controller for the ralph-agent plugin.
//!
//! Repeatedly spawns the `claude` CLI with a plugin agent, checkpoints the
//! repository between runs (commit, annotated tag, push), and decides when
//! to stop. The architecture keeps a strict separation:
//!
//! - **Pure logic** ([`config`], [`version`]): deterministic types and the
//!   version-tag allocator. No I/O, fully testable in isolation.
//! - **[`io`]**: side-effecting seams (git, the agent subprocess, plugin
//!   files), behind traits so tests can script them.
//!
//! Orchestration modules ([`looping`], [`checkpoint`]) coordinate core
//! logic with I/O to implement the controller state machine.

pub mod checkpoint;
pub mod config;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod version;
