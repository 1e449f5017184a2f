//! Agent invocation seam.
//!
//! The [`AgentInvoker`] trait decouples the iteration controller from the
//! actual agent backend (the `claude` CLI). Tests use scripted invokers
//! that return predetermined outcomes without spawning processes.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::config::{AgentKind, RunConfig};
use crate::io::plugin::agent_definition_path;

/// Program name of the external agent CLI.
pub const AGENT_PROGRAM: &str = "claude";

/// Outcome of one agent subprocess run.
///
/// Fatal precondition failures ([`MissingAgentDefinition`],
/// [`MissingAgentBinary`]) travel as errors instead; the controller only
/// ever branches on this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    Success,
    /// The subprocess ran and exited nonzero (`None` = killed by signal),
    /// or spawning failed for a reason other than a missing binary.
    Failed { code: Option<i32> },
}

impl InvokeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvokeOutcome::Success)
    }
}

/// Fatal: the plugin has no definition file for the requested agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAgentDefinition {
    pub path: PathBuf,
}

impl fmt::Display for MissingAgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent definition not found: {}", self.path.display())
    }
}

impl std::error::Error for MissingAgentDefinition {}

/// Fatal: the external agent CLI is not installed or not on PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAgentBinary {
    pub program: String,
}

impl fmt::Display for MissingAgentBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' command not found (missing dependency, install the agent CLI)",
            self.program
        )
    }
}

impl std::error::Error for MissingAgentBinary {}

/// Abstraction over agent execution backends.
pub trait AgentInvoker {
    /// Run the agent once for `iteration`.
    ///
    /// Subprocess trouble must be converted into [`InvokeOutcome::Failed`],
    /// never a panic; only the fatal precondition errors may escape.
    fn invoke(&self, config: &RunConfig, iteration: u32) -> Result<InvokeOutcome>;
}

/// Build the full argv for one agent run.
///
/// One flat vector, no shell interpretation. The same text is displayed in
/// dry runs and executed in real ones.
pub fn build_agent_command(config: &RunConfig) -> Result<Vec<String>> {
    let agent_file = agent_definition_path(&config.plugin_dir, config.agent);
    if !agent_file.is_file() {
        return Err(MissingAgentDefinition { path: agent_file }.into());
    }

    // --agents payload takes priority over any on-disk agent config.
    let mut agents = serde_json::Map::new();
    agents.insert(
        config.agent.name().to_string(),
        serde_json::json!({
            "description": "Loaded from the ralph-agent plugin by the loop controller",
            "prompt": format!("See agent definition at {}", agent_file.display()),
            "tools": ["Task", "Read", "Write", "Edit", "Grep", "Glob", "Bash"],
            "model": config.model.name(),
        }),
    );
    let agents_json = serde_json::Value::Object(agents);

    let mut argv = vec![
        AGENT_PROGRAM.to_string(),
        "--agents".to_string(),
        agents_json.to_string(),
        "--plugin-dir".to_string(),
        config.plugin_dir.display().to_string(),
        "--model".to_string(),
        config.model.name().to_string(),
        config.agent.command_token().to_string(),
    ];
    match config.agent {
        AgentKind::Ralph => {
            argv.push(format!("--max-iterations={}", config.max_iterations));
        }
        AgentKind::Gbuild => {
            argv.push(format!("--parallel={}", config.parallel));
            if config.max_iterations > 0 {
                argv.push(format!("--max-iterations={}", config.max_iterations));
            }
        }
        AgentKind::Gplan => {
            argv.push(format!("--parallel={}", config.parallel));
        }
    }
    Ok(argv)
}

/// Invoker that spawns the `claude` CLI with inherited stdio.
pub struct ClaudeInvoker;

impl AgentInvoker for ClaudeInvoker {
    #[instrument(skip_all, fields(iteration = iteration))]
    fn invoke(&self, config: &RunConfig, iteration: u32) -> Result<InvokeOutcome> {
        let argv = build_agent_command(config)?;
        println!("Command: {}\n", argv.join(" "));

        if config.dry_run {
            println!("[DRY RUN] Would execute the command above.");
            return Ok(InvokeOutcome::Success);
        }

        info!(iteration, agent = %config.agent, "spawning agent");
        // Inherit stdio: the agent streams its own output to the console.
        let status = match Command::new(&argv[0]).args(&argv[1..]).status() {
            Ok(status) => status,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MissingAgentBinary {
                    program: argv[0].clone(),
                }
                .into());
            }
            Err(err) => {
                warn!(err = %err, "failed to spawn agent");
                eprintln!("Error running agent: {err}");
                return Ok(InvokeOutcome::Failed { code: None });
            }
        };

        if status.success() {
            debug!(iteration, "agent run succeeded");
            Ok(InvokeOutcome::Success)
        } else {
            warn!(code = ?status.code(), "agent exited nonzero");
            match status.code() {
                Some(code) => println!("Warning: agent exited with code {code}"),
                None => println!("Warning: agent terminated by signal"),
            }
            Ok(InvokeOutcome::Failed {
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Model;
    use crate::test_support::plugin_fixture;

    fn config(agent: AgentKind, plugin_dir: PathBuf) -> RunConfig {
        RunConfig {
            agent,
            max_iterations: 10,
            parallel: 20,
            model: Model::Opus,
            skip_push: false,
            dry_run: false,
            plugin_dir,
        }
    }

    #[test]
    fn ralph_command_carries_iteration_cap() {
        let plugin = plugin_fixture().expect("fixture");
        let argv =
            build_agent_command(&config(AgentKind::Ralph, plugin.path().to_path_buf()))
                .expect("build");

        assert_eq!(argv[0], AGENT_PROGRAM);
        assert_eq!(argv[1], "--agents");
        assert!(argv.contains(&"/ralph".to_string()));
        assert!(argv.contains(&"--max-iterations=10".to_string()));
        assert!(!argv.iter().any(|arg| arg.starts_with("--parallel")));
    }

    #[test]
    fn gbuild_command_carries_parallel_and_optional_cap() {
        let plugin = plugin_fixture().expect("fixture");
        let mut cfg = config(AgentKind::Gbuild, plugin.path().to_path_buf());
        let argv = build_agent_command(&cfg).expect("build");
        assert!(argv.contains(&"/gbuild".to_string()));
        assert!(argv.contains(&"--parallel=20".to_string()));
        assert!(argv.contains(&"--max-iterations=10".to_string()));

        cfg.max_iterations = 0;
        let argv = build_agent_command(&cfg).expect("build");
        assert!(!argv.iter().any(|arg| arg.starts_with("--max-iterations")));
    }

    #[test]
    fn gplan_command_carries_parallel_only() {
        let plugin = plugin_fixture().expect("fixture");
        let argv =
            build_agent_command(&config(AgentKind::Gplan, plugin.path().to_path_buf()))
                .expect("build");
        assert!(argv.contains(&"/gplan".to_string()));
        assert!(argv.contains(&"--parallel=20".to_string()));
        assert!(!argv.iter().any(|arg| arg.starts_with("--max-iterations")));
    }

    #[test]
    fn agents_payload_is_keyed_by_agent_name() {
        let plugin = plugin_fixture().expect("fixture");
        let argv =
            build_agent_command(&config(AgentKind::Ralph, plugin.path().to_path_buf()))
                .expect("build");
        let payload: serde_json::Value = serde_json::from_str(&argv[2]).expect("json");
        assert!(payload.get("ralph").is_some());
        assert_eq!(payload["ralph"]["model"], "opus");
    }

    #[test]
    fn missing_definition_is_the_fatal_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = build_agent_command(&config(AgentKind::Ralph, temp.path().to_path_buf()))
            .unwrap_err();
        assert!(err.downcast_ref::<MissingAgentDefinition>().is_some());
    }

    #[test]
    fn dry_run_and_real_run_build_identical_text() {
        let plugin = plugin_fixture().expect("fixture");
        let real = config(AgentKind::Gbuild, plugin.path().to_path_buf());
        let mut dry = real.clone();
        dry.dry_run = true;
        assert_eq!(
            build_agent_command(&real).expect("build"),
            build_agent_command(&dry).expect("build")
        );
    }

    #[test]
    fn dry_run_reports_synthetic_success_without_spawning() {
        let plugin = plugin_fixture().expect("fixture");
        let mut cfg = config(AgentKind::Ralph, plugin.path().to_path_buf());
        cfg.dry_run = true;

        // No `claude` binary is needed: the invoker must not spawn anything.
        let outcome = ClaudeInvoker.invoke(&cfg, 1).expect("invoke");
        assert_eq!(outcome, InvokeOutcome::Success);
    }
}
