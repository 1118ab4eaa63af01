//! Thin wrapper over the `git` binary scoped to one repository directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::StoreError;
use crate::Result;

/// Branch that carries the linear history of accepted revisions.
pub const MAIN_BRANCH: &str = "master";
/// Fully-qualified ref of [`MAIN_BRANCH`]; reads go through this, never `HEAD`.
pub const MAIN_REF: &str = "refs/heads/master";

const COMMITTER_NAME: &str = "pipeconf";
const COMMITTER_EMAIL: &str = "pipeconf@localhost";

/// Runs git commands inside a fixed working directory with a pinned identity
/// and without consulting system-wide configuration.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args([
            "-c",
            "commit.gpgsign=false",
            "-c",
            "core.autocrlf=false",
            "-c",
            "gc.auto=0",
            "-c",
            "merge.conflictstyle=merge",
        ])
        .args(args)
        .current_dir(&self.dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_AUTHOR_NAME", COMMITTER_NAME)
        .env("GIT_AUTHOR_EMAIL", COMMITTER_EMAIL)
        .env("GIT_COMMITTER_NAME", COMMITTER_NAME)
        .env("GIT_COMMITTER_EMAIL", COMMITTER_EMAIL);
        cmd
    }

    /// Run a command and return its raw output regardless of exit status.
    pub fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(dir = %self.dir.display(), args = ?args, "git");
        self.command(args).output().map_err(|e| StoreError::Git {
            command: args.join(" "),
            stderr: format!("failed to run git: {e}"),
        })
    }

    /// Run a command, failing on a non-zero exit status. Returns stdout.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(StoreError::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Commit the index with `author` recorded as the commit author.
    pub fn commit_as(&self, author: &str, message: &str) -> Result<()> {
        let author = if author.trim().is_empty() {
            "anonymous"
        } else {
            author.trim()
        };
        let args = ["commit", "-q", "--allow-empty", "--no-verify", "-m", message];
        debug!(dir = %self.dir.display(), author, "git commit");
        let output = self
            .command(&args)
            .env("GIT_AUTHOR_NAME", author)
            .output()
            .map_err(|e| StoreError::Git {
                command: "commit".to_string(),
                stderr: format!("failed to run git: {e}"),
            })?;
        if !output.status.success() {
            return Err(StoreError::Git {
                command: "commit".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a revision expression to a commit sha, `None` if it does not exist.
    pub fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.output(&["rev-parse", "--verify", "-q", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!sha.is_empty()).then_some(sha))
    }

    /// Tip of the main line, `None` before the first commit.
    pub fn main_head(&self) -> Result<Option<String>> {
        self.resolve_commit(MAIN_REF)
    }

    /// Name of the checked-out branch, `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let output = self.output(&["symbolic-ref", "-q", "--short", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    /// Local branch names.
    pub fn branches(&self) -> Result<Vec<String>> {
        let out = self.run(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Check whether a directory is the root of a git repository.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success() && dir.join(".git").exists())
        .unwrap_or(false)
}
