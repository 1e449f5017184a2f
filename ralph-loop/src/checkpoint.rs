//! Repository checkpointing between agent runs.
//!
//! Each iteration ends with stage-all, commit-if-dirty, tag (builder only),
//! push. Every step is independently fault-tolerant: a failed commit still
//! attempts the push, and nothing here ever stops the loop. Forward
//! progress of the agent matters more than bookkeeping completeness.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument, warn};

use crate::config::RunConfig;
use crate::io::git::GitOps;
use crate::version::next_version;

/// What one checkpoint sequence actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointOutcome {
    /// A commit object was created (false also covers the clean-tree case).
    pub committed: bool,
    /// Annotated tag created for this iteration, if any.
    pub tag: Option<String>,
    pub pushed: bool,
    /// An interrupt stopped later steps from starting.
    pub interrupted: bool,
}

/// Run the commit/tag/push sequence for `iteration`.
///
/// The interrupt flag is consulted before each step; a step already
/// completed stands, a step not yet started is skipped.
#[instrument(skip_all, fields(iteration = iteration))]
pub fn run_checkpoint<G: GitOps>(
    git: &G,
    config: &RunConfig,
    iteration: u32,
    interrupt: &AtomicBool,
) -> CheckpointOutcome {
    let mut outcome = CheckpointOutcome::default();

    if config.dry_run {
        println!("  [DRY RUN] Would commit, tag and push here.");
        return outcome;
    }

    if check_interrupt(interrupt, &mut outcome) {
        return outcome;
    }
    outcome.committed = commit_step(git, config, iteration);

    if check_interrupt(interrupt, &mut outcome) {
        return outcome;
    }
    if config.agent.creates_tags() {
        outcome.tag = tag_step(git, config, iteration);
    }

    if check_interrupt(interrupt, &mut outcome) {
        return outcome;
    }
    outcome.pushed = push_step(git, config);

    outcome
}

fn check_interrupt(flag: &AtomicBool, outcome: &mut CheckpointOutcome) -> bool {
    if flag.load(Ordering::SeqCst) {
        debug!("interrupt observed, skipping remaining checkpoint steps");
        outcome.interrupted = true;
        return true;
    }
    false
}

fn commit_step<G: GitOps>(git: &G, config: &RunConfig, iteration: u32) -> bool {
    let message = format!(
        "[{}] Iteration {}",
        config.agent.name().to_uppercase(),
        iteration
    );
    let result = (|| -> anyhow::Result<bool> {
        git.add_all()?;
        git.commit_staged(&message)
    })();
    match result {
        Ok(true) => {
            println!("  Committed: {message}");
            true
        }
        Ok(false) => {
            println!("  No changes to commit.");
            false
        }
        Err(err) => {
            warn!(err = %err, "commit step failed");
            println!("  Warning: commit failed: {err:#}");
            false
        }
    }
}

fn tag_step<G: GitOps>(git: &G, config: &RunConfig, iteration: u32) -> Option<String> {
    // A listing failure just means no known tags.
    let tags = git.list_tags().unwrap_or_default();
    let name = next_version(&tags, iteration).to_string();
    let message = format!(
        "{} iteration {}",
        config.agent.name().to_uppercase(),
        iteration
    );
    match git.tag_annotated(&name, &message) {
        Ok(()) => {
            println!("  Tagged: {name}");
            Some(name)
        }
        Err(err) => {
            warn!(tag = %name, err = %err, "tag step failed");
            println!("  Warning: tag creation failed: {err:#}");
            None
        }
    }
}

fn push_step<G: GitOps>(git: &G, config: &RunConfig) -> bool {
    if config.skip_push {
        println!("  Push skipped (--skip-push)");
        return false;
    }
    let result = (|| -> anyhow::Result<()> {
        if let Err(err) = git.push() {
            // Unset upstream is the common first-push case; retry with tracking.
            debug!(err = %err, "plain push failed, retrying with upstream");
            let branch = git
                .current_branch()
                .unwrap_or_else(|_| "unknown".to_string());
            git.push_set_upstream(&branch)?;
        }
        if let Err(err) = git.push_tags() {
            warn!(err = %err, "tag push failed");
        }
        Ok(())
    })();
    match result {
        Ok(()) => {
            println!("  Pushed to remote");
            true
        }
        Err(err) => {
            warn!(err = %err, "push step failed");
            println!("  Warning: push failed: {err:#}");
            false
        }
    }
}
