//! Command-line entry point for the loop controller.
//!
//! Spawns `claude` with a plugin agent in a loop, committing (and for
//! gbuild, tagging) between iterations and pushing the results.
//!
//! ```text
//! ralph-loop ralph                # ralph, unlimited
//! ralph-loop ralph 10             # ralph, max 10 iterations
//! ralph-loop gbuild 50 -p 200     # builder, custom parallelism
//! ralph-loop gplan                # planner (one-shot)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;

use ralph_loop::config::{AgentKind, Model, RunConfig};
use ralph_loop::exit_codes;
use ralph_loop::io::git::{Git, GitOps};
use ralph_loop::io::invoker::ClaudeInvoker;
use ralph_loop::io::plugin::{agent_definition_path, resolve_plugin_dir, verify_plugin};
use ralph_loop::logging;
use ralph_loop::looping::{LoopOutcome, LoopStop, run_loop};

#[derive(Parser)]
#[command(
    name = "ralph-loop",
    version,
    about = "External loop controller for the ralph-agent plugin"
)]
struct Cli {
    /// Agent to run.
    #[arg(value_enum)]
    agent: AgentKind,

    /// Maximum iterations (0 = unlimited).
    #[arg(default_value_t = 0)]
    max_iterations: u32,

    /// Parallel subagents (forwarded to gbuild/gplan).
    #[arg(short, long, default_value_t = 10)]
    parallel: u32,

    /// Path to the ralph-agent plugin (default: auto-detected).
    #[arg(short = 'd', long)]
    plugin_dir: Option<PathBuf>,

    /// Claude model to use.
    #[arg(short, long, value_enum, default_value_t = Model::Opus)]
    model: Model,

    /// Skip git push (commit only).
    #[arg(long)]
    skip_push: bool,

    /// Show commands without executing.
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("determine working directory")?;

    let plugin_dir = resolve_plugin_dir(&cwd, cli.plugin_dir.as_deref());
    let manifest = verify_plugin(&plugin_dir)?;
    if let Some(manifest) = manifest {
        println!(
            "Plugin: {} v{}",
            manifest.name.as_deref().unwrap_or("unknown"),
            manifest.version.as_deref().unwrap_or("unknown")
        );
        println!("Agents: {}", manifest.agents.join(", "));
        println!("Commands: {}", manifest.commands.join(", "));
    }

    let config = RunConfig {
        agent: cli.agent,
        max_iterations: cli.max_iterations,
        parallel: cli.parallel,
        model: cli.model,
        skip_push: cli.skip_push,
        dry_run: cli.dry_run,
        plugin_dir,
    };

    // The missing definition file is the fatal precondition; fail before
    // any repository state moves.
    let agent_file = agent_definition_path(&config.plugin_dir, config.agent);
    if !agent_file.is_file() {
        eprintln!("Error: agent definition not found: {}", agent_file.display());
        return Ok(exit_codes::INVALID);
    }

    let git = Git::new(&cwd);
    print_banner(&config, &git);
    if config.dry_run {
        println!("[DRY RUN MODE] - Commands will be shown but not executed.\n");
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupt);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("install interrupt handler")?;
    }

    let outcome = run_loop(&config, &ClaudeInvoker, &git, &interrupt, |_result| {})?;
    report_stop(&config, &outcome);
    Ok(exit_codes::OK)
}

fn print_banner(config: &RunConfig, git: &Git) {
    let branch = git
        .current_branch()
        .unwrap_or_else(|_| "unknown".to_string());
    let tags = git.list_tags().unwrap_or_default();
    let iterations = if config.max_iterations == 0 {
        "unlimited".to_string()
    } else {
        config.max_iterations.to_string()
    };

    let rule = "=".repeat(80);
    println!("\n{rule}");
    println!("RALPH-AGENT LOOP CONTROLLER");
    println!("{rule}");
    println!("Agent:             {}", config.agent);
    println!("Max iterations:    {iterations}");
    println!("Parallel agents:   {}", config.parallel);
    println!("Plugin path:       {}", config.plugin_dir.display());
    println!("Model:             {}", config.model);
    println!("Git branch:        {branch}");
    if !tags.is_empty() {
        let recent: Vec<&str> = tags
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(String::as_str)
            .collect();
        println!("Current tags:      {}", recent.join(", "));
    }
    println!("{rule}\n");
}

fn report_stop(config: &RunConfig, outcome: &LoopOutcome) {
    let rule = "=".repeat(80);
    match &outcome.stop {
        LoopStop::MaxIterationsReached => {
            println!("\n{rule}");
            println!("MAX ITERATIONS REACHED ({})", config.max_iterations);
            println!("{rule}\n");
        }
        LoopStop::AgentRunFailed { iteration } => {
            println!("\nAgent failed at iteration {iteration}. Stopping.");
        }
        LoopStop::OneShotComplete => {
            println!("\nPlanning complete ({} is one-shot).", config.agent);
        }
        LoopStop::Interrupted { iteration } => {
            println!("\n\n{rule}");
            println!("INTERRUPTED by user at iteration {iteration}");
            println!("{rule}\n");
        }
    }
}
