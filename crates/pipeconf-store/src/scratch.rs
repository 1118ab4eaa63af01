//! Ephemeral merge branches.
//!
//! A [`ScratchBranch`] is created at a base commit, checked out, and removed
//! again when the guard is dropped: on success, on error, and on unwind. The
//! main line is checked out forcibly during cleanup so an aborted merge never
//! leaves the working tree on the scratch branch.

use tracing::{debug, warn};

use crate::git::{Git, MAIN_BRANCH};
use crate::Result;

const SCRATCH_PREFIX: &str = "pipeconf-merge-";

/// RAII guard owning a temporary branch checked out in the store's work tree.
pub struct ScratchBranch<'a> {
    git: &'a Git,
    name: String,
}

impl<'a> ScratchBranch<'a> {
    /// Create a uniquely named branch at `base_commit` and check it out.
    pub fn checkout_at(git: &'a Git, base_commit: &str) -> Result<Self> {
        let name = format!("{SCRATCH_PREFIX}{}", uuid::Uuid::new_v4().simple());
        git.run(&["branch", &name, base_commit])?;
        // From here on the guard owns the branch, so a failed checkout still
        // deletes it.
        let guard = Self { git, name };
        guard.git.run(&["checkout", "-q", "-f", &guard.name])?;
        debug!(branch = %guard.name, base = %base_commit, "scratch branch checked out");
        Ok(guard)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScratchBranch<'_> {
    fn drop(&mut self) {
        // A conflicted merge leaves MERGE_HEAD behind; abort is a no-op otherwise.
        let _ = self.git.output(&["merge", "--abort"]);
        if let Err(e) = self.git.run(&["checkout", "-q", "-f", MAIN_BRANCH]) {
            warn!(branch = %self.name, error = %e, "failed to return to main line");
        }
        if let Err(e) = self.git.run(&["branch", "-D", &self.name]) {
            warn!(branch = %self.name, error = %e, "failed to delete scratch branch");
        } else {
            debug!(branch = %self.name, "scratch branch removed");
        }
    }
}

/// True for branch names created by [`ScratchBranch`].
pub fn is_scratch_branch(name: &str) -> bool {
    name.starts_with(SCRATCH_PREFIX)
}
