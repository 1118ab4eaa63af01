//! Config repositories, partial fragments and the primary configuration.

use serde::{Deserialize, Serialize};

use super::material::ScmMaterial;
use super::origin::ConfigOrigin;
use super::pipeline::{EnvironmentConfig, PipelineConfig, PipelineGroup};
use super::rules::Rules;

/// A registered external repository contributing partial configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRepoConfig {
    pub id: String,
    /// Adapter that parses the repository's definitions.
    pub plugin_id: String,
    pub material: ScmMaterial,
    #[serde(default)]
    pub rules: Rules,
}

impl ConfigRepoConfig {
    pub fn new(id: impl Into<String>, plugin_id: impl Into<String>, material: ScmMaterial) -> Self {
        Self {
            id: id.into(),
            plugin_id: plugin_id.into(),
            material,
            rules: Rules::new(),
        }
    }

    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    pub fn fingerprint(&self) -> &str {
        &self.material.fingerprint
    }

    /// Origin for a fragment parsed from this repository at `revision`.
    pub fn origin_at(&self, revision: impl Into<String>) -> ConfigOrigin {
        ConfigOrigin::repo(&self.id, &self.material.fingerprint, revision)
    }
}

/// Pipeline groups and environments contributed by one origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialConfig {
    pub origin: ConfigOrigin,
    #[serde(default)]
    pub groups: Vec<PipelineGroup>,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

impl PartialConfig {
    pub fn new(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            groups: Vec::new(),
            environments: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: PipelineGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environments.push(environment);
        self
    }

    /// Tag every entity in the fragment with the fragment's origin.
    pub fn tag_entities(&mut self) {
        let origin = self.origin.clone();
        for group in &mut self.groups {
            group.set_origin(&origin);
        }
        for env in &mut self.environments {
            env.origin = origin.clone();
        }
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineConfig> {
        self.groups.iter().flat_map(|g| g.pipelines.iter())
    }
}

/// The parsed primary configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub groups: Vec<PipelineGroup>,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
    #[serde(default)]
    pub config_repos: Vec<ConfigRepoConfig>,
}

impl MainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: PipelineGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environments.push(environment);
        self
    }

    pub fn with_config_repo(mut self, repo: ConfigRepoConfig) -> Self {
        self.config_repos.push(repo);
        self
    }

    /// Tag every entity as defined locally.
    pub fn tag_local(&mut self) {
        for group in &mut self.groups {
            group.set_origin(&ConfigOrigin::Local);
        }
        for env in &mut self.environments {
            env.origin = ConfigOrigin::Local;
        }
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineConfig> {
        self.groups.iter().flat_map(|g| g.pipelines.iter())
    }

    pub fn config_repo(&self, id: &str) -> Option<&ConfigRepoConfig> {
        self.config_repos.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_entities_uses_fragment_origin() {
        let origin = ConfigOrigin::repo("r1", "fp-1", "abc");
        let mut partial = PartialConfig::new(origin.clone())
            .with_group(PipelineGroup::new("g").with_pipeline(PipelineConfig::new("p")))
            .with_environment(EnvironmentConfig::new("env"));
        partial.tag_entities();
        assert_eq!(partial.groups[0].origin, origin);
        assert_eq!(partial.pipelines().next().unwrap().origin, origin);
        assert_eq!(partial.environments[0].origin, origin);
    }

    #[test]
    fn repo_origin_carries_fingerprint() {
        let repo = ConfigRepoConfig::new("r1", "yaml", ScmMaterial::new("git", "fp-1"));
        let origin = repo.origin_at("42");
        assert_eq!(origin.repo_id(), Some("r1"));
        assert_eq!(origin.fingerprint(), Some("fp-1"));
    }
}
