//! Rule authorization of partial configuration fragments.
//!
//! A fragment from a config repository may introduce pipeline groups and
//! environments, and depend on pipelines of other origins, only when an
//! `Allow` rule of that repository permits it. References within the same
//! origin never consult the rules. Fragments of `Unknown` origin are not
//! checked at all so unregistered repositories can be preflighted.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{ConfigOrigin, ConfigRepoConfig, PartialConfig, ResourceType, Rules};
use crate::error::ConfigError;
use crate::merge::MergedConfig;
use crate::validation::{EntityKind, ValidationError};

/// First rule violation found in one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub origin: ConfigOrigin,
    pub resource_type: ResourceType,
    /// The referenced name the rules did not allow.
    pub name: String,
    /// Entity the finding is attached to.
    pub entity_kind: EntityKind,
    pub entity: String,
}

impl RuleViolation {
    pub fn to_error(&self) -> ConfigError {
        ConfigError::AuthorizationDenied {
            resource_type: self.resource_type,
            name: self.name.clone(),
        }
    }

    pub fn message(&self) -> String {
        self.to_error().to_string()
    }

    pub fn to_validation_error(&self) -> ValidationError {
        ValidationError::from_error(
            self.entity_kind,
            &self.entity,
            self.origin.clone(),
            &self.to_error(),
        )
    }
}

/// Rules of every registered repository, by repository id.
#[derive(Debug, Default)]
pub struct RepoRulesTable<'a> {
    rules: HashMap<&'a str, &'a Rules>,
}

impl<'a> RepoRulesTable<'a> {
    pub fn from_repos(repos: &'a [ConfigRepoConfig]) -> Self {
        let mut rules = HashMap::with_capacity(repos.len());
        for repo in repos {
            // Duplicate ids are reported by repo validation; first one wins here.
            rules.entry(repo.id.as_str()).or_insert(&repo.rules);
        }
        Self { rules }
    }

    pub fn rules_for(&self, repo_id: &str) -> Option<&'a Rules> {
        self.rules.get(repo_id).copied()
    }
}

pub struct PartialConfigAuthority<'a> {
    config: &'a MergedConfig,
    table: RepoRulesTable<'a>,
}

impl<'a> PartialConfigAuthority<'a> {
    pub fn new(config: &'a MergedConfig) -> Self {
        Self {
            config,
            table: RepoRulesTable::from_repos(config.config_repos()),
        }
    }

    /// Check one fragment, stopping at its first violation.
    ///
    /// Fragments of `Local` or `Unknown` origin always pass. A repository with
    /// no registered config is checked against an empty rule set.
    pub fn authorize(&self, partial: &PartialConfig) -> Option<RuleViolation> {
        let ConfigOrigin::Repo { repo_id, .. } = &partial.origin else {
            debug!(origin = %partial.origin, "skipping rule check");
            return None;
        };
        let empty = Rules::new();
        let rules = self.table.rules_for(repo_id).unwrap_or(&empty);

        let violation = |resource_type, name: &str, entity_kind, entity: &str| RuleViolation {
            origin: partial.origin.clone(),
            resource_type,
            name: name.to_string(),
            entity_kind,
            entity: entity.to_string(),
        };

        for group in &partial.groups {
            if !rules.can_refer(ResourceType::PipelineGroup, &group.name) {
                return Some(violation(
                    ResourceType::PipelineGroup,
                    &group.name,
                    EntityKind::PipelineGroup,
                    &group.name,
                ));
            }
        }

        for env in &partial.environments {
            if !rules.can_refer(ResourceType::Environment, &env.name) {
                return Some(violation(
                    ResourceType::Environment,
                    &env.name,
                    EntityKind::Environment,
                    &env.name,
                ));
            }
        }

        for pipeline in partial.pipelines() {
            for dependency in pipeline.dependencies() {
                // Missing upstreams are the graph check's business.
                let Some(upstream) = self.config.pipeline(&dependency.pipeline) else {
                    continue;
                };
                if upstream.origin.same_source(&partial.origin) {
                    continue;
                }
                if !rules.can_refer(ResourceType::Pipeline, &upstream.name) {
                    return Some(violation(
                        ResourceType::Pipeline,
                        &upstream.name,
                        EntityKind::Pipeline,
                        &pipeline.name,
                    ));
                }
            }
        }
        None
    }

    /// At most one violation per merged fragment.
    pub fn authorize_all(&self) -> Vec<RuleViolation> {
        self.config
            .partials()
            .iter()
            .filter_map(|partial| self.authorize(partial))
            .collect()
    }
}
