//! Error types for pipeconf-store

use thiserror::Error;

/// Message surfaced when a three-way merge cannot be resolved automatically.
pub const CONFIG_CHANGED_PLEASE_REFRESH: &str =
    "Configuration file has been modified by someone else. Please refresh and try again.";

/// Errors that can occur in the configuration history layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// No revision matches the requested key
    #[error("There is no config version corresponding to md5: '{key}'")]
    NotFound { key: String },

    /// Overlapping edits between the candidate and the latest revision
    #[error("{}", CONFIG_CHANGED_PLEASE_REFRESH)]
    MergeConflict,

    /// A git command exited unsuccessfully
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// A commit message could not be decoded into revision metadata
    #[error("Invalid revision metadata: {0}")]
    InvalidRevision(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store lock was poisoned by a panicking writer
    #[error("Config store lock poisoned")]
    LockPoisoned,

    /// A blocking store task could not be joined
    #[error("Config store task failed: {0}")]
    TaskJoin(String),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    /// True for the optimistic-concurrency conflict signal.
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, StoreError::MergeConflict)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::TaskJoin(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_echoes_key() {
        let err = StoreError::not_found("md5-missing");
        assert_eq!(
            err.to_string(),
            "There is no config version corresponding to md5: 'md5-missing'"
        );
    }

    #[test]
    fn merge_conflict_never_carries_diff() {
        let err = StoreError::MergeConflict;
        assert_eq!(err.to_string(), CONFIG_CHANGED_PLEASE_REFRESH);
        assert!(err.is_merge_conflict());
        assert!(!StoreError::LockPoisoned.is_merge_conflict());
    }
}
