//! Test-only fixtures: scripted seams and a real temporary git repository.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::config::RunConfig;
use crate::io::git::GitOps;
use crate::io::invoker::{AgentInvoker, InvokeOutcome, MissingAgentBinary};

/// Git fake that records every call and serves scripted responses.
///
/// Builder-style setters configure the repository state a test needs;
/// `calls`/`count` support invocation-count assertions.
#[derive(Debug)]
pub struct RecordingGit {
    calls: RefCell<Vec<String>>,
    tags: RefCell<Vec<String>>,
    branch: String,
    staged_changes: bool,
    fail_commit: bool,
    fail_tag: bool,
    fail_plain_push: bool,
    fail_tag_push: bool,
}

impl Default for RecordingGit {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            tags: RefCell::new(Vec::new()),
            branch: "main".to_string(),
            staged_changes: false,
            fail_commit: false,
            fail_tag: false,
            fail_plain_push: false,
            fail_tag_push: false,
        }
    }
}

impl RecordingGit {
    /// Every `add_all` stages something, so commits are created.
    pub fn with_staged_changes(mut self) -> Self {
        self.staged_changes = true;
        self
    }

    pub fn with_tags(self, names: &[&str]) -> Self {
        *self.tags.borrow_mut() = names.iter().map(|name| (*name).to_string()).collect();
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_tag(mut self) -> Self {
        self.fail_tag = true;
        self
    }

    /// Plain `push` fails (as with an unset upstream); the
    /// `--set-upstream` retry still succeeds.
    pub fn failing_plain_push(mut self) -> Self {
        self.fail_plain_push = true;
        self
    }

    pub fn failing_tag_push(mut self) -> Self {
        self.fail_tag_push = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of recorded calls whose operation name is exactly `name`.
    pub fn count(&self, name: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(name))
            .count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl GitOps for RecordingGit {
    fn current_branch(&self) -> Result<String> {
        self.record("current_branch");
        Ok(self.branch.clone())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        self.record("list_tags");
        Ok(self.tags.borrow().clone())
    }

    fn add_all(&self) -> Result<()> {
        self.record("add_all");
        Ok(())
    }

    fn commit_staged(&self, message: &str) -> Result<bool> {
        self.record(format!("commit_staged {message}"));
        if self.fail_commit {
            return Err(anyhow!("scripted commit failure"));
        }
        Ok(self.staged_changes)
    }

    fn tag_annotated(&self, name: &str, message: &str) -> Result<()> {
        self.record(format!("tag_annotated {name} {message}"));
        if self.fail_tag {
            return Err(anyhow!("scripted tag failure"));
        }
        self.tags.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn push(&self) -> Result<()> {
        self.record("push");
        if self.fail_plain_push {
            return Err(anyhow!("scripted push failure (no upstream)"));
        }
        Ok(())
    }

    fn push_set_upstream(&self, branch: &str) -> Result<()> {
        self.record(format!("push_set_upstream {branch}"));
        Ok(())
    }

    fn push_tags(&self) -> Result<()> {
        self.record("push_tags");
        if self.fail_tag_push {
            return Err(anyhow!("scripted tag push failure"));
        }
        Ok(())
    }
}

/// One scripted invoker response.
#[derive(Debug, Clone)]
pub enum ScriptedInvoke {
    Outcome(InvokeOutcome),
    /// Fatal missing-binary precondition error.
    MissingBinary,
}

/// Invoker returning predetermined outcomes without spawning processes.
///
/// Counts invocations; once the script is exhausted it keeps reporting
/// success.
pub struct ScriptedInvoker {
    script: RefCell<VecDeque<ScriptedInvoke>>,
    invocations: Cell<u32>,
}

impl ScriptedInvoker {
    pub fn new(script: Vec<ScriptedInvoke>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            invocations: Cell::new(0),
        }
    }

    pub fn always_success() -> Self {
        Self::new(Vec::new())
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.get()
    }
}

impl AgentInvoker for ScriptedInvoker {
    fn invoke(&self, _config: &RunConfig, _iteration: u32) -> Result<InvokeOutcome> {
        self.invocations.set(self.invocations.get() + 1);
        match self.script.borrow_mut().pop_front() {
            Some(ScriptedInvoke::Outcome(outcome)) => Ok(outcome),
            Some(ScriptedInvoke::MissingBinary) => Err(MissingAgentBinary {
                program: "claude".to_string(),
            }
            .into()),
            None => Ok(InvokeOutcome::Success),
        }
    }
}

/// Temporary plugin directory with a descriptor and all agent definitions.
pub fn plugin_fixture() -> Result<tempfile::TempDir> {
    let temp = tempfile::tempdir().context("create tempdir")?;
    fs::write(
        temp.path().join("plugin.json"),
        r#"{
  "name": "ralph-agent",
  "version": "1.0.0",
  "agents": ["ralph", "gbuild", "gplan"],
  "commands": ["ralph", "gbuild", "gplan"]
}
"#,
    )
    .context("write plugin.json")?;
    let agents = temp.path().join("agents");
    fs::create_dir_all(&agents).context("create agents dir")?;
    for name in ["ralph", "gbuild", "gplan"] {
        fs::write(agents.join(format!("{name}.md")), format!("# {name}\n"))
            .with_context(|| format!("write {name}.md"))?;
    }
    Ok(temp)
}

/// Temporary git repository with identity configured and one initial commit.
pub struct TestRepo {
    dir: tempfile::TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let root = dir.path();
        run_git(root, &["init"])?;
        run_git(root, &["config", "user.email", "loop@example.com"])?;
        run_git(root, &["config", "user.name", "Loop Test"])?;
        run_git(root, &["config", "commit.gpgsign", "false"])?;
        run_git(root, &["config", "tag.gpgSign", "false"])?;
        fs::write(root.join("README.md"), "test repo\n").context("write README")?;
        run_git(root, &["add", "-A"])?;
        run_git(root, &["commit", "-m", "initial"])?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }
}

/// Run a git command in `root`, failing the test on nonzero exit.
pub fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
