//! The iteration state machine driving agent runs and checkpoints.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, info};

use crate::checkpoint::run_checkpoint;
use crate::config::RunConfig;
use crate::io::git::GitOps;
use crate::io::invoker::AgentInvoker;

/// Reason why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The configured iteration cap was reached.
    MaxIterationsReached,
    /// The agent exited nonzero; the loop fails fast, no retry.
    AgentRunFailed { iteration: u32 },
    /// A one-shot agent finished its single pass.
    OneShotComplete,
    /// The user interrupted; treated as clean shutdown.
    Interrupted { iteration: u32 },
}

/// Per-iteration outcome, handed to the reporting callback then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationResult {
    pub iteration: u32,
    pub agent_succeeded: bool,
    pub committed: bool,
    pub tag: Option<String>,
    pub pushed: bool,
}

/// Summary of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Number of agent invocations performed.
    pub invocations: u32,
    pub stop: LoopStop,
}

/// Drive invoke-then-checkpoint cycles until a stop condition holds.
///
/// Strictly sequential: one agent subprocess, then one checkpoint sequence,
/// never overlapping. The interrupt flag is observed between blocking
/// calls only; steps already completed stand. Fatal precondition failures
/// (missing agent definition or binary) propagate as errors; every other
/// condition becomes a [`LoopStop`].
pub fn run_loop<I, G, F>(
    config: &RunConfig,
    invoker: &I,
    git: &G,
    interrupt: &AtomicBool,
    mut on_iteration: F,
) -> Result<LoopOutcome>
where
    I: AgentInvoker,
    G: GitOps,
    F: FnMut(&IterationResult),
{
    let mut invocations = 0u32;
    let mut iteration = 1u32;

    loop {
        if interrupt.load(Ordering::SeqCst) {
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::Interrupted { iteration },
            });
        }
        if config.max_iterations > 0 && iteration > config.max_iterations {
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::MaxIterationsReached,
            });
        }

        print_heading(config, iteration);
        let outcome = invoker.invoke(config, iteration)?;
        invocations += 1;
        let agent_succeeded = outcome.is_success();

        if interrupt.load(Ordering::SeqCst) {
            // The checkpoint for this iteration never starts once the user
            // has interrupted; anything the agent wrote stays uncommitted.
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::Interrupted { iteration },
            });
        }

        // Checkpoint even after a failed run: the partial state the agent
        // produced is worth keeping before we stop.
        println!("\nGit workflow...");
        let checkpoint = run_checkpoint(git, config, iteration, interrupt);
        let result = IterationResult {
            iteration,
            agent_succeeded,
            committed: checkpoint.committed,
            tag: checkpoint.tag.clone(),
            pushed: checkpoint.pushed,
        };
        debug!(?result, "iteration finished");
        on_iteration(&result);

        if checkpoint.interrupted || interrupt.load(Ordering::SeqCst) {
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::Interrupted { iteration },
            });
        }
        if !agent_succeeded {
            info!(iteration, "agent run failed, stopping");
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::AgentRunFailed { iteration },
            });
        }
        if config.agent.one_shot() {
            return Ok(LoopOutcome {
                invocations,
                stop: LoopStop::OneShotComplete,
            });
        }

        iteration += 1;
    }
}

fn print_heading(config: &RunConfig, iteration: u32) {
    let cap = if config.max_iterations > 0 {
        format!("/{}", config.max_iterations)
    } else {
        String::new()
    };
    let rule = "\u{2500}".repeat(80);
    println!("\n{rule}");
    println!("ITERATION {iteration}{cap}");
    println!("{rule}\n");
}
