//! Git adapter for checkpointing.
//!
//! The controller owns the working tree for the duration of a checkpoint
//! sequence and drives a fixed command set, so we keep a small, explicit
//! wrapper around `git` subprocess calls.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Git operations consumed by the checkpoint manager and the banner.
///
/// A trait seam so tests can substitute a recording fake for the real
/// repository handle.
pub trait GitOps {
    /// Current branch name (whatever `rev-parse --abbrev-ref HEAD` says).
    fn current_branch(&self) -> Result<String>;
    /// All tag names, unordered beyond git's own listing order.
    fn list_tags(&self) -> Result<Vec<String>>;
    /// Stage all working-tree changes (respects .gitignore).
    fn add_all(&self) -> Result<()>;
    /// Commit staged changes; Ok(false) when there was nothing staged.
    fn commit_staged(&self, message: &str) -> Result<bool>;
    /// Create an annotated tag at HEAD.
    fn tag_annotated(&self, name: &str, message: &str) -> Result<()>;
    /// Push the current branch to its upstream.
    fn push(&self) -> Result<()>;
    /// Push the branch while creating upstream tracking on origin.
    fn push_set_upstream(&self, branch: &str) -> Result<()>;
    /// Push all tags.
    fn push_tags(&self) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        // `diff --cached --quiet` exits 1 when the index differs from HEAD.
        let status = self.run(&["diff", "--cached", "--quiet"])?.status;
        Ok(!status.success())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl GitOps for Git {
    #[instrument(skip_all)]
    fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["tag", "--list"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    #[instrument(skip_all)]
    fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    #[instrument(skip_all, fields(name = %name))]
    fn tag_annotated(&self, name: &str, message: &str) -> Result<()> {
        self.run_checked(&["tag", "-a", name, "-m", message])?;
        Ok(())
    }

    fn push(&self) -> Result<()> {
        self.run_checked(&["push"])?;
        Ok(())
    }

    fn push_set_upstream(&self, branch: &str) -> Result<()> {
        self.run_checked(&["push", "--set-upstream", "origin", branch])?;
        Ok(())
    }

    fn push_tags(&self) -> Result<()> {
        self.run_checked(&["push", "--tags"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn commit_staged_skips_clean_tree() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        git.add_all().expect("add");
        assert!(!git.commit_staged("empty").expect("commit"));
    }

    #[test]
    fn commit_staged_commits_dirty_tree() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        repo.write_file("notes.txt", "one\n").expect("write");
        git.add_all().expect("add");
        assert!(git.has_staged_changes().expect("staged"));
        assert!(git.commit_staged("[RALPH] Iteration 1").expect("commit"));
        assert!(!git.has_staged_changes().expect("staged after commit"));
    }

    #[test]
    fn tag_annotated_then_listed() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        assert!(git.list_tags().expect("list").is_empty());
        git.tag_annotated("0.0.0", "GBUILD iteration 1").expect("tag");
        assert_eq!(git.list_tags().expect("list"), vec!["0.0.0".to_string()]);
    }

    #[test]
    fn duplicate_tag_errors() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        git.tag_annotated("1.0.0", "first").expect("tag");
        assert!(git.tag_annotated("1.0.0", "again").is_err());
    }

    #[test]
    fn current_branch_matches_rev_parse() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        let branch = git.current_branch().expect("branch");
        assert!(!branch.is_empty());
        assert_ne!(branch, "HEAD");
    }
}
