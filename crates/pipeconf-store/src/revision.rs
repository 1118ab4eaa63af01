//! Configuration revisions and their commit-message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::Result;

/// One accepted revision of the primary configuration.
///
/// `md5` is the content hash supplied by the caller (or computed by
/// [`ConfigRevision::from_content`]). It is the identity the store trusts:
/// checking in a revision whose hash equals the current one is a no-op even
/// if the author or comment differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRevision {
    /// Full configuration text. `None` on list views.
    pub content: Option<String>,
    pub md5: String,
    pub username: String,
    pub comment: String,
    pub schema_version: String,
    pub time: DateTime<Utc>,
    /// Commit that recorded this revision, once stored.
    pub commit_sha: Option<String>,
}

impl ConfigRevision {
    pub fn new(
        content: impl Into<String>,
        md5: impl Into<String>,
        username: impl Into<String>,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            content: Some(content.into()),
            md5: md5.into(),
            username: username.into(),
            comment: String::new(),
            schema_version: schema_version.into(),
            time: Utc::now(),
            commit_sha: None,
        }
    }

    /// Build a revision whose hash is derived from the content.
    pub fn from_content(
        content: impl Into<String>,
        username: impl Into<String>,
        schema_version: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let md5 = content_hash(&content);
        Self::new(content, md5, username, schema_version)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Content text, or an empty string for list views.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub(crate) fn commit_message(&self) -> Result<String> {
        let envelope = RevisionEnvelope {
            user: self.username.clone(),
            comment: self.comment.clone(),
            schema_version: self.schema_version.clone(),
            md5: self.md5.clone(),
            time: self.time,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub(crate) fn from_commit_message(
        message: &str,
        commit_sha: &str,
        content: Option<String>,
    ) -> Result<Self> {
        let envelope: RevisionEnvelope = serde_json::from_str(message.trim()).map_err(|e| {
            StoreError::InvalidRevision(format!("commit {commit_sha}: {e}"))
        })?;
        Ok(Self {
            content,
            md5: envelope.md5,
            username: envelope.user,
            comment: envelope.comment,
            schema_version: envelope.schema_version,
            time: envelope.time,
            commit_sha: Some(commit_sha.to_string()),
        })
    }
}

/// Metadata recorded as the commit message, one line of JSON.
#[derive(Debug, Serialize, Deserialize)]
struct RevisionEnvelope {
    user: String,
    #[serde(default)]
    comment: String,
    schema_version: String,
    md5: String,
    time: DateTime<Utc>,
}

/// SHA-256 hex digest of configuration text.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
