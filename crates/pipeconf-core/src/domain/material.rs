//! Materials as seen by the configuration core.
//!
//! SCM materials are opaque values owned by the material subsystem; only
//! their fingerprint and auto-update flag matter here. Dependency materials
//! are the edges of the pipeline graph.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScmMaterial {
    #[serde(default)]
    pub name: String,
    /// `git`, `hg`, `svn`, ... Informational only.
    pub kind: String,
    /// Stable identity derived from the connection parameters.
    pub fingerprint: String,
    #[serde(default = "default_true")]
    pub auto_update: bool,
}

impl ScmMaterial {
    pub fn new(kind: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            kind: kind.into(),
            fingerprint: fingerprint.into(),
            auto_update: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    /// `name` when set, otherwise the fingerprint.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.fingerprint
        } else {
            &self.name
        }
    }
}

/// "This pipeline depends on `stage` of `pipeline`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyMaterial {
    pub pipeline: String,
    pub stage: String,
}

impl DependencyMaterial {
    pub fn new(pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaterialConfig {
    Scm(ScmMaterial),
    Dependency(DependencyMaterial),
}

impl MaterialConfig {
    pub fn as_dependency(&self) -> Option<&DependencyMaterial> {
        match self {
            MaterialConfig::Dependency(d) => Some(d),
            MaterialConfig::Scm(_) => None,
        }
    }

    pub fn as_scm(&self) -> Option<&ScmMaterial> {
        match self {
            MaterialConfig::Scm(s) => Some(s),
            MaterialConfig::Dependency(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scm_auto_update_defaults_to_true() {
        let m: MaterialConfig =
            serde_json::from_str(r#"{"type":"scm","kind":"git","fingerprint":"fp-1"}"#).unwrap();
        let scm = m.as_scm().unwrap();
        assert!(scm.auto_update);
        assert_eq!(scm.display_name(), "fp-1");
        assert!(m.as_dependency().is_none());
    }

    #[test]
    fn dependency_roundtrip() {
        let m: MaterialConfig =
            serde_json::from_str(r#"{"type":"dependency","pipeline":"up","stage":"build"}"#)
                .unwrap();
        assert_eq!(m.as_dependency(), Some(&DependencyMaterial::new("up", "build")));
    }
}
