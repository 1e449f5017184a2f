//! Side-effecting seams: git, the agent subprocess, plugin files.

pub mod git;
pub mod invoker;
pub mod plugin;
