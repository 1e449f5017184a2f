//! Immutable per-run configuration threaded through every component.
//!
//! Built once from the CLI at startup. Components never read ambient
//! environment, which keeps the controller deterministic under test.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

/// Closed set of agents the controller knows how to drive.
///
/// Each kind carries its own looping policy: ralph loops until the cap,
/// gbuild loops until the cap and tags every iteration, gplan runs exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    /// Unbounded worker; loops until the iteration cap (if any).
    Ralph,
    /// Builder; loops until the cap and version-tags each checkpoint.
    Gbuild,
    /// Planner; one-shot, stops after a single full iteration.
    Gplan,
}

impl AgentKind {
    /// Lowercase agent name as it appears in the plugin.
    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Ralph => "ralph",
            AgentKind::Gbuild => "gbuild",
            AgentKind::Gplan => "gplan",
        }
    }

    /// Slash-command token that invokes the agent inside the `claude` CLI.
    pub fn command_token(self) -> &'static str {
        match self {
            AgentKind::Ralph => "/ralph",
            AgentKind::Gbuild => "/gbuild",
            AgentKind::Gplan => "/gplan",
        }
    }

    /// One-shot agents stop after a single invoke-then-checkpoint cycle.
    pub fn one_shot(self) -> bool {
        matches!(self, AgentKind::Gplan)
    }

    /// Only gbuild checkpoints get an annotated version tag.
    pub fn creates_tags(self) -> bool {
        matches!(self, AgentKind::Gbuild)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Claude model identity forwarded to the agent subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Model {
    Opus,
    Sonnet,
    Haiku,
}

impl Model {
    pub fn name(self) -> &'static str {
        match self {
            Model::Opus => "opus",
            Model::Sonnet => "sonnet",
            Model::Haiku => "haiku",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of one controller invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub agent: AgentKind,
    /// Iteration cap; 0 means unbounded.
    pub max_iterations: u32,
    /// Opaque fan-out hint forwarded to the agent subprocess.
    pub parallel: u32,
    pub model: Model,
    /// Commit and tag only, never push.
    pub skip_push: bool,
    /// Show constructed commands without spawning anything.
    pub dry_run: bool,
    /// Resolved plugin directory containing `plugin.json` and `agents/`.
    pub plugin_dir: PathBuf,
}
