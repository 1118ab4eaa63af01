//! Provenance of configuration entities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a pipeline group, environment or pipeline was defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigOrigin {
    /// The primary, editable configuration.
    #[default]
    Local,
    /// A registered config repository at a specific revision.
    Repo {
        repo_id: String,
        material_fingerprint: String,
        revision: String,
    },
    /// Not yet registered; used for preflight checks.
    Unknown,
}

impl ConfigOrigin {
    pub fn repo(
        repo_id: impl Into<String>,
        material_fingerprint: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        ConfigOrigin::Repo {
            repo_id: repo_id.into(),
            material_fingerprint: material_fingerprint.into(),
            revision: revision.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ConfigOrigin::Local)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ConfigOrigin::Unknown)
    }

    pub fn repo_id(&self) -> Option<&str> {
        match self {
            ConfigOrigin::Repo { repo_id, .. } => Some(repo_id),
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            ConfigOrigin::Repo {
                material_fingerprint,
                ..
            } => Some(material_fingerprint),
            _ => None,
        }
    }

    /// Same source regardless of revision: two repo origins match on repo id.
    pub fn same_source(&self, other: &ConfigOrigin) -> bool {
        match (self, other) {
            (ConfigOrigin::Local, ConfigOrigin::Local) => true,
            (ConfigOrigin::Unknown, ConfigOrigin::Unknown) => true,
            (ConfigOrigin::Repo { repo_id: a, .. }, ConfigOrigin::Repo { repo_id: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            ConfigOrigin::Local => "primary config".to_string(),
            ConfigOrigin::Repo {
                repo_id, revision, ..
            } => format!("{repo_id} at {revision}"),
            ConfigOrigin::Unknown => "unknown".to_string(),
        }
    }
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_ignores_revision() {
        let a1 = ConfigOrigin::repo("repo-a", "fp-a", "1");
        let a2 = ConfigOrigin::repo("repo-a", "fp-a", "2");
        let b = ConfigOrigin::repo("repo-b", "fp-b", "1");
        assert!(a1.same_source(&a2));
        assert!(!a1.same_source(&b));
        assert!(!a1.same_source(&ConfigOrigin::Local));
        assert!(ConfigOrigin::Local.same_source(&ConfigOrigin::Local));
    }

    #[test]
    fn display_names() {
        assert_eq!(ConfigOrigin::Local.to_string(), "primary config");
        assert_eq!(
            ConfigOrigin::repo("url1", "fp", "124").to_string(),
            "url1 at 124"
        );
        assert_eq!(ConfigOrigin::Unknown.display_name(), "unknown");
    }

    #[test]
    fn serde_tagged_form() {
        let json = serde_json::to_value(ConfigOrigin::repo("r", "fp", "7")).unwrap();
        assert_eq!(json["type"], "repo");
        assert_eq!(json["repo_id"], "r");
        let back: ConfigOrigin = serde_json::from_value(json).unwrap();
        assert_eq!(back.fingerprint(), Some("fp"));
    }
}
