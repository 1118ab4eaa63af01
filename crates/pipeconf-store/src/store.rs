//! Git-backed configuration history.
//!
//! Every accepted revision of the primary configuration becomes one commit on
//! the main line of a private repository. Commit identity is the caller's
//! content hash: checking in a revision whose hash equals the current one is
//! a no-op. Optimistic-concurrency merges run on a scratch branch that is
//! always removed afterwards, so the main line only ever moves through
//! [`ConfigStore::checkin`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::diff::strip_file_headers;
use crate::error::StoreError;
use crate::git::{is_git_repo, Git, MAIN_BRANCH, MAIN_REF};
use crate::revision::ConfigRevision;
use crate::scratch::ScratchBranch;
use crate::settings::StoreSettings;
use crate::Result;

/// File inside the repository that holds the configuration text.
pub const CONFIG_FILE_NAME: &str = "pipelines.cfg";
/// Symbolic revision key naming the tip of the main line.
pub const CURRENT: &str = "current";

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "--format=%H%x1f%B%x1e";

/// Versioned store of the primary configuration text.
///
/// Single-writer: mutating operations take `&mut self`. Wrap the store in a
/// [`crate::SharedConfigStore`] to share it across tasks.
#[derive(Debug)]
pub struct ConfigStore {
    git: Git,
    settings: StoreSettings,
}

impl ConfigStore {
    /// Bind a store to `dir`. Nothing touches the disk until [`initialize`].
    ///
    /// [`initialize`]: ConfigStore::initialize
    pub fn open(dir: impl Into<PathBuf>, settings: StoreSettings) -> Self {
        Self {
            git: Git::new(dir),
            settings,
        }
    }

    pub fn dir(&self) -> &Path {
        self.git.dir()
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: StoreSettings) {
        self.settings = settings;
    }

    /// Create the repository if needed and reset the work tree to the main
    /// line, discarding branches left behind by an interrupted merge.
    /// Idempotent.
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(self.dir())?;
        if !is_git_repo(self.dir()) {
            self.git.run(&["init", "-q"])?;
            self.git.run(&["symbolic-ref", "HEAD", MAIN_REF])?;
            info!(dir = %self.dir().display(), "initialized config history repository");
        }
        self.clean_and_reset_to_main()
    }

    /// Check out the main line, discard uncommitted changes and delete every
    /// other local branch.
    pub fn clean_and_reset_to_main(&mut self) -> Result<()> {
        if self.git.main_head()?.is_some() {
            let _ = self.git.output(&["merge", "--abort"]);
            self.git.run(&["checkout", "-q", "-f", MAIN_BRANCH])?;
            self.git.run(&["reset", "-q", "--hard", MAIN_REF])?;
            self.git.run(&["clean", "-q", "-f", "-d"])?;
        } else {
            self.git.run(&["symbolic-ref", "HEAD", MAIN_REF])?;
        }

        let stale: Vec<String> = self
            .git
            .branches()?
            .into_iter()
            .filter(|b| b != MAIN_BRANCH)
            .collect();
        for branch in &stale {
            self.git.run(&["branch", "-D", branch])?;
        }
        if !stale.is_empty() {
            warn!(count = stale.len(), branches = ?stale, "removed orphaned branches");
        }
        Ok(())
    }

    /// Record `revision` on the main line.
    ///
    /// Returns the new commit sha, or `None` when the revision's hash equals
    /// the current revision's hash (author, comment and schema version are
    /// not compared).
    pub fn checkin(&mut self, revision: &ConfigRevision) -> Result<Option<String>> {
        if let Some(current) = self.current_revision_meta()? {
            if current.md5 == revision.md5 {
                debug!(md5 = %revision.md5, "content unchanged, skipping checkin");
                return Ok(None);
            }
        }
        self.ensure_on_main()?;
        let sha = self.commit_checked_out(revision)?;
        info!(
            md5 = %revision.md5,
            commit = %sha,
            user = %revision.username,
            "config revision checked in"
        );
        Ok(Some(sha))
    }

    /// Look up a revision by content hash, or by [`CURRENT`].
    ///
    /// `Ok(None)` only for [`CURRENT`] on an empty history; an unknown hash
    /// is [`StoreError::NotFound`].
    pub fn get_revision(&self, key: &str) -> Result<Option<ConfigRevision>> {
        if key == CURRENT {
            return self.current_revision();
        }
        let sha = self
            .commit_for_md5(key)?
            .ok_or_else(|| StoreError::not_found(key))?;
        self.get_revision_by_commit(&sha).map(Some)
    }

    /// Load the revision recorded by commit `sha`, content included.
    pub fn get_revision_by_commit(&self, sha: &str) -> Result<ConfigRevision> {
        let sha = self
            .git
            .resolve_commit(sha)?
            .ok_or_else(|| StoreError::not_found(sha))?;
        let message = self.git.run(&["log", "-1", "--format=%B", &sha])?;
        let content = self.content_at(&sha)?;
        ConfigRevision::from_commit_message(&message, &sha, Some(content))
    }

    /// Tip of the main line with content, `None` before the first checkin.
    pub fn current_revision(&self) -> Result<Option<ConfigRevision>> {
        match self.git.main_head()? {
            Some(sha) => self.get_revision_by_commit(&sha).map(Some),
            None => Ok(None),
        }
    }

    pub fn current_commit_sha(&self) -> Result<Option<String>> {
        self.git.main_head()
    }

    /// Commit sha recording the revision with hash `md5`.
    pub fn commit_sha_for(&self, md5: &str) -> Result<String> {
        self.commit_for_md5(md5)?
            .ok_or_else(|| StoreError::not_found(md5))
    }

    /// Page through the main line, newest first. Content is omitted; use
    /// [`get_revision`](ConfigStore::get_revision) to load it.
    pub fn get_commits(&self, count: usize, offset: usize) -> Result<Vec<ConfigRevision>> {
        if self.git.main_head()?.is_none() {
            return Ok(Vec::new());
        }
        let skip = format!("--skip={offset}");
        let max = format!("--max-count={count}");
        let out = self.git.run(&["log", MAIN_REF, &skip, &max, LOG_FORMAT])?;
        parse_log(&out)
            .into_iter()
            .map(|(sha, message)| ConfigRevision::from_commit_message(message, sha, None))
            .collect()
    }

    /// Number of commits on the main line.
    pub fn commit_count(&self) -> Result<u64> {
        if self.git.main_head()?.is_none() {
            return Ok(0);
        }
        let out = self.git.run(&["rev-list", "--count", MAIN_REF])?;
        out.trim()
            .parse()
            .map_err(|e| StoreError::Git {
                command: "rev-list --count".to_string(),
                stderr: format!("unexpected output {out:?}: {e}"),
            })
    }

    /// Unified diff from `older` to `newer`, file headers stripped.
    /// `None` when there is no older commit to compare against.
    pub fn find_diff(&self, newer: &str, older: Option<&str>) -> Result<Option<String>> {
        let Some(older) = older else {
            return Ok(None);
        };
        let raw = self.git.run(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            older,
            newer,
            "--",
            CONFIG_FILE_NAME,
        ])?;
        Ok(Some(strip_file_headers(&raw)))
    }

    /// Diff between two revisions addressed by content hash.
    pub fn config_changes_for(&self, newer_md5: &str, older_md5: &str) -> Result<String> {
        let newer = self.commit_sha_for(newer_md5)?;
        let older = self.commit_sha_for(older_md5)?;
        Ok(self.find_diff(&newer, Some(&older))?.unwrap_or_default())
    }

    /// Diff between two revisions addressed by commit sha.
    pub fn config_changes_for_commits(&self, newer_sha: &str, older_sha: &str) -> Result<String> {
        let newer = self
            .git
            .resolve_commit(newer_sha)?
            .ok_or_else(|| StoreError::not_found(newer_sha))?;
        let older = self
            .git
            .resolve_commit(older_sha)?
            .ok_or_else(|| StoreError::not_found(older_sha))?;
        Ok(self.find_diff(&newer, Some(&older))?.unwrap_or_default())
    }

    /// Three-way merge of `candidate` (edited from the revision `base_md5`)
    /// with the latest main-line revision.
    ///
    /// The attempt runs on a scratch branch created at the base commit. On
    /// overlapping edits the merge is aborted and [`StoreError::MergeConflict`]
    /// is returned; either way the scratch branch is deleted and the main line
    /// is left exactly as it was. The merged text is returned, not checked in.
    pub fn merge_with_latest(
        &mut self,
        candidate: &ConfigRevision,
        base_md5: &str,
    ) -> Result<String> {
        let base = self.commit_sha_for(base_md5)?;

        let result = {
            let scratch = ScratchBranch::checkout_at(&self.git, &base)?;
            self.merge_on_scratch(&scratch, candidate)
        };

        match &result {
            Ok(_) => info!(base = %base_md5, "merged candidate with latest revision"),
            Err(StoreError::MergeConflict) => {
                warn!(base = %base_md5, "candidate conflicts with latest revision")
            }
            Err(e) => warn!(base = %base_md5, error = %e, "merge attempt failed"),
        }
        result
    }

    fn merge_on_scratch(&self, scratch: &ScratchBranch<'_>, candidate: &ConfigRevision) -> Result<String> {
        self.commit_checked_out(candidate)?;
        let output = self.git.output(&[
            "merge",
            "--no-ff",
            "--no-edit",
            "-q",
            "-m",
            "merge latest main line",
            MAIN_REF,
        ])?;
        if !output.status.success() {
            let unmerged = self.git.run(&["diff", "--name-only", "--diff-filter=U"])?;
            if !unmerged.trim().is_empty() {
                debug!(branch = %scratch.name(), "merge produced conflicts");
                return Err(StoreError::MergeConflict);
            }
            return Err(StoreError::Git {
                command: "merge".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        self.content_at("HEAD")
    }

    /// Compact loose objects when periodic GC is enabled. Returns whether a
    /// collection ran.
    pub fn garbage_collect(&self) -> Result<bool> {
        self.garbage_collect_with(&self.settings)
    }

    /// Like [`garbage_collect`](ConfigStore::garbage_collect) but with
    /// freshly read settings.
    pub fn garbage_collect_with(&self, settings: &StoreSettings) -> Result<bool> {
        collect_garbage(&self.git, settings)
    }

    /// Loose objects in the repository's object database.
    pub fn loose_object_count(&self) -> Result<u64> {
        loose_object_count(&self.git)
    }

    /// Git handle for maintenance work that runs outside the store's lock.
    pub(crate) fn maintenance_git(&self) -> Git {
        self.git.clone()
    }

    /// Local branch names, main line included.
    pub fn branches(&self) -> Result<Vec<String>> {
        self.git.branches()
    }

    /// Branch checked out in the work tree.
    pub fn checked_out_branch(&self) -> Result<Option<String>> {
        self.git.current_branch()
    }

    fn ensure_on_main(&self) -> Result<()> {
        if self.git.current_branch()?.as_deref() == Some(MAIN_BRANCH) {
            return Ok(());
        }
        if self.git.main_head()?.is_some() {
            self.git.run(&["checkout", "-q", "-f", MAIN_BRANCH])?;
        } else {
            self.git.run(&["symbolic-ref", "HEAD", MAIN_REF])?;
        }
        Ok(())
    }

    /// Write, stage and commit on whatever branch is checked out. On failure
    /// the work tree and index are restored to the last commit.
    fn commit_checked_out(&self, revision: &ConfigRevision) -> Result<String> {
        let result = self.write_and_commit(revision);
        if result.is_err() {
            self.discard_uncommitted();
        }
        result
    }

    fn write_and_commit(&self, revision: &ConfigRevision) -> Result<String> {
        self.write_config_file(revision.content_or_empty())?;
        self.git.run(&["add", "--", CONFIG_FILE_NAME])?;
        self.git
            .commit_as(&revision.username, &revision.commit_message()?)?;
        self.git
            .resolve_commit("HEAD")?
            .ok_or_else(|| StoreError::Git {
                command: "commit".to_string(),
                stderr: "HEAD does not resolve after commit".to_string(),
            })
    }

    fn write_config_file(&self, content: &str) -> Result<()> {
        // Atomic write: temp file in the work tree, then rename over the target.
        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(self.dir().join(CONFIG_FILE_NAME))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn discard_uncommitted(&self) {
        let restored = match self.git.resolve_commit("HEAD") {
            Ok(Some(_)) => self.git.run(&["reset", "-q", "--hard", "HEAD"]).map(|_| ()),
            _ => self
                .git
                .run(&["rm", "-q", "--cached", "--ignore-unmatch", "--", CONFIG_FILE_NAME])
                .map(|_| ())
                .and_then(|_| {
                    let path = self.dir().join(CONFIG_FILE_NAME);
                    if path.exists() {
                        fs::remove_file(path)?;
                    }
                    Ok(())
                }),
        };
        if let Err(e) = restored {
            warn!(error = %e, "failed to restore work tree after failed commit");
        }
    }

    fn content_at(&self, rev: &str) -> Result<String> {
        let spec = format!("{rev}:{CONFIG_FILE_NAME}");
        self.git.run(&["show", &spec])
    }

    fn current_revision_meta(&self) -> Result<Option<ConfigRevision>> {
        let Some(sha) = self.git.main_head()? else {
            return Ok(None);
        };
        let message = self.git.run(&["log", "-1", "--format=%B", &sha])?;
        ConfigRevision::from_commit_message(&message, &sha, None).map(Some)
    }

    fn commit_for_md5(&self, md5: &str) -> Result<Option<String>> {
        if self.git.main_head()?.is_none() {
            return Ok(None);
        }
        // Pre-filter on the JSON-encoded field, then confirm on the parsed envelope.
        let needle = format!("\"md5\":{}", serde_json::to_string(md5)?);
        let grep = format!("--grep={needle}");
        let out = self
            .git
            .run(&["log", MAIN_REF, "--fixed-strings", &grep, LOG_FORMAT])?;
        for (sha, message) in parse_log(&out) {
            match ConfigRevision::from_commit_message(message, sha, None) {
                Ok(rev) if rev.md5 == md5 => return Ok(Some(sha.to_string())),
                Ok(_) => {}
                Err(e) => debug!(commit = %sha, error = %e, "skipping foreign commit"),
            }
        }
        Ok(None)
    }
}

fn parse_log(out: &str) -> Vec<(&str, &str)> {
    out.split(RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| record.split_once(FIELD_SEP))
        .collect()
}

/// `git gc` over the history repository, honouring `settings`. Needs only
/// the object database, so callers may run it without holding the store.
pub(crate) fn collect_garbage(git: &Git, settings: &StoreSettings) -> Result<bool> {
    if !settings.periodic_gc {
        debug!("periodic gc disabled, skipping");
        return Ok(false);
    }
    let before = loose_object_count(git)?;
    let prune = if settings.gc_expire_hours == 0 {
        "--prune=now".to_string()
    } else {
        format!("--prune={}.hours.ago", settings.gc_expire_hours)
    };
    let mut args = vec!["gc", "-q", prune.as_str()];
    if settings.aggressive_gc {
        args.push("--aggressive");
    }
    git.run(&args)?;
    let after = loose_object_count(git)?;
    info!(
        loose_before = before,
        loose_after = after,
        aggressive = settings.aggressive_gc,
        "config history gc completed"
    );
    Ok(true)
}

pub(crate) fn loose_object_count(git: &Git) -> Result<u64> {
    let out = git.run(&["count-objects", "-v"])?;
    out.lines()
        .find_map(|line| line.strip_prefix("count:"))
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| StoreError::Git {
            command: "count-objects -v".to_string(),
            stderr: format!("no loose object count in {out:?}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("config.git"), StoreSettings::default());
        store.initialize().unwrap();
        (dir, store)
    }

    fn rev(content: &str, md5: &str) -> ConfigRevision {
        ConfigRevision::new(content, md5, "user-1", "13.2")
    }

    #[test]
    fn parse_log_splits_records() {
        let out = "aaa\x1f{\"x\":1}\n\x1e\nbbb\x1f{\"y\":2}\n\x1e\n";
        let records = parse_log(out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "aaa");
        assert_eq!(records[1].0, "bbb");
        assert!(records[1].1.contains("\"y\""));
    }

    #[test]
    fn md5_lookup_ignores_lookalike_hashes() {
        let (_dir, mut store) = store();
        store.checkin(&rev("a", "md5-1")).unwrap();
        store.checkin(&rev("b", "md5-10")).unwrap();
        let rev1 = store.get_revision("md5-1").unwrap().unwrap();
        assert_eq!(rev1.content.as_deref(), Some("a"));
    }
}
