//! Merging the primary configuration with partial fragments.
//!
//! Every merged entity keeps the origin it came from. Name collisions become
//! field-keyed findings on the later-merged entity, which is left out of the
//! merged namespace so lookups resolve to the first definition.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::domain::{
    ConfigOrigin, ConfigRepoConfig, EnvironmentConfig, MainConfig, PartialConfig, PipelineConfig,
    PipelineGroup,
};
use crate::error::ConfigError;
use crate::validation::{EntityKind, ValidationError};

/// An environment assembled from every origin that declares it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MergedEnvironment {
    pub name: String,
    pub pipelines: Vec<String>,
    pub origins: Vec<ConfigOrigin>,
}

/// The primary configuration with all partial fragments merged in.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    groups: Vec<PipelineGroup>,
    environments: Vec<MergedEnvironment>,
    partials: Vec<PartialConfig>,
    config_repos: Vec<ConfigRepoConfig>,
    pipeline_index: HashMap<String, (usize, usize)>,
    findings: Vec<ValidationError>,
}

impl MergedConfig {
    /// The primary configuration alone.
    pub fn from_main(main: &MainConfig) -> Self {
        merge_partials(main, &[])
    }

    pub fn groups(&self) -> &[PipelineGroup] {
        &self.groups
    }

    pub fn environments(&self) -> &[MergedEnvironment] {
        &self.environments
    }

    pub fn environment(&self, name: &str) -> Option<&MergedEnvironment> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        let &(g, p) = self.pipeline_index.get(name)?;
        self.groups.get(g)?.pipelines.get(p)
    }

    pub fn all_pipelines(&self) -> impl Iterator<Item = &PipelineConfig> {
        self.groups.iter().flat_map(|g| g.pipelines.iter())
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipeline_index.len()
    }

    /// Fragments that took part in the merge, tagged with their origin.
    pub fn partials(&self) -> &[PartialConfig] {
        &self.partials
    }

    pub fn config_repos(&self) -> &[ConfigRepoConfig] {
        &self.config_repos
    }

    /// Name collisions found while merging.
    pub fn findings(&self) -> &[ValidationError] {
        &self.findings
    }
}

/// Merge `main` (tagged `Local`) with `partials` (tagged with their own
/// origin).
///
/// Fragments from a repository whose fingerprint is no longer registered in
/// `main.config_repos` are dropped. Environments of the same name are
/// combined; duplicate group or pipeline names are reported as findings.
pub fn merge_partials(main: &MainConfig, partials: &[PartialConfig]) -> MergedConfig {
    let registered: HashSet<&str> = main
        .config_repos
        .iter()
        .map(ConfigRepoConfig::fingerprint)
        .collect();

    let mut merger = Merger::default();

    let mut local = main.clone();
    local.tag_local();
    merger.add_groups(local.groups, &ConfigOrigin::Local);
    merger.add_environments(local.environments);

    let mut kept = Vec::with_capacity(partials.len());
    for partial in partials {
        if let Some(fingerprint) = partial.origin.fingerprint() {
            if !registered.contains(fingerprint) {
                debug!(
                    origin = %partial.origin,
                    fingerprint,
                    "dropping partial config of unregistered repository"
                );
                continue;
            }
        }
        let mut partial = partial.clone();
        partial.tag_entities();
        merger.add_groups(partial.groups.clone(), &partial.origin);
        merger.add_environments(partial.environments.clone());
        kept.push(partial);
    }

    if !merger.findings.is_empty() {
        warn!(
            count = merger.findings.len(),
            "duplicate identities while merging partial configs"
        );
    }

    MergedConfig {
        groups: merger.groups,
        environments: merger.environments,
        partials: kept,
        config_repos: main.config_repos.clone(),
        pipeline_index: merger.pipeline_index,
        findings: merger.findings,
    }
}

#[derive(Default)]
struct Merger {
    groups: Vec<PipelineGroup>,
    environments: Vec<MergedEnvironment>,
    pipeline_index: HashMap<String, (usize, usize)>,
    findings: Vec<ValidationError>,
}

impl Merger {
    fn add_groups(&mut self, groups: Vec<PipelineGroup>, origin: &ConfigOrigin) {
        for group in groups {
            let slot = match self.groups.iter().position(|g| g.name == group.name) {
                Some(existing) if self.groups[existing].origin.same_source(origin) => existing,
                Some(existing) => {
                    let first = self.groups[existing].origin.clone();
                    self.findings.push(duplicate(
                        EntityKind::PipelineGroup,
                        &group.name,
                        "pipeline groups",
                        "Pipeline group",
                        &[&first, origin],
                    ));
                    continue;
                }
                None => {
                    self.groups.push(PipelineGroup {
                        name: group.name.clone(),
                        pipelines: Vec::new(),
                        origin: origin.clone(),
                    });
                    self.groups.len() - 1
                }
            };

            for pipeline in group.pipelines {
                if let Some(&(g, p)) = self.pipeline_index.get(&pipeline.name) {
                    let first = self.groups[g].pipelines[p].origin.clone();
                    self.findings.push(duplicate(
                        EntityKind::Pipeline,
                        &pipeline.name,
                        "pipelines",
                        "Pipeline",
                        &[&first, origin],
                    ));
                    continue;
                }
                let position = self.groups[slot].pipelines.len();
                self.pipeline_index
                    .insert(pipeline.name.clone(), (slot, position));
                self.groups[slot].pipelines.push(pipeline);
            }
        }
    }

    fn add_environments(&mut self, environments: Vec<EnvironmentConfig>) {
        for env in environments {
            match self.environments.iter_mut().find(|e| e.name == env.name) {
                Some(merged) => {
                    for pipeline in env.pipelines {
                        if !merged.pipelines.contains(&pipeline) {
                            merged.pipelines.push(pipeline);
                        }
                    }
                    if !merged.origins.contains(&env.origin) {
                        merged.origins.push(env.origin);
                    }
                }
                None => self.environments.push(MergedEnvironment {
                    name: env.name,
                    pipelines: env.pipelines,
                    origins: vec![env.origin],
                }),
            }
        }
    }
}

fn duplicate(
    kind: EntityKind,
    name: &str,
    plural: &str,
    title: &str,
    origins: &[&ConfigOrigin],
) -> ValidationError {
    let mut sources: Vec<String> = Vec::new();
    for origin in origins {
        let display = origin.display_name();
        if !sources.contains(&display) {
            sources.push(display);
        }
    }
    let message = format!(
        "You have defined multiple {plural} named '{name}'. {title} names must be unique. Source(s): [{}]",
        sources.join(", ")
    );
    let later = origins.last().map(|o| (*o).clone()).unwrap_or_default();
    ValidationError::from_error(
        kind,
        name,
        later,
        &ConfigError::DuplicateIdentity {
            field: "name".to_string(),
            value: name.to_string(),
            message,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScmMaterial;

    fn repo(id: &str, fp: &str) -> ConfigRepoConfig {
        ConfigRepoConfig::new(id, "json", ScmMaterial::new("git", fp))
    }

    fn main_with(repos: Vec<ConfigRepoConfig>) -> MainConfig {
        let mut main = MainConfig::new().with_group(
            PipelineGroup::new("local-group").with_pipeline(PipelineConfig::new("local-p")),
        );
        main.config_repos = repos;
        main
    }

    #[test]
    fn partial_entities_keep_their_origin() {
        let r1 = repo("r1", "fp-1");
        let origin = r1.origin_at("1");
        let partial = PartialConfig::new(origin.clone())
            .with_group(PipelineGroup::new("remote").with_pipeline(PipelineConfig::new("remote-p")));

        let merged = merge_partials(&main_with(vec![r1]), &[partial]);
        assert_eq!(merged.pipeline("local-p").unwrap().origin, ConfigOrigin::Local);
        assert_eq!(merged.pipeline("remote-p").unwrap().origin, origin);
        assert_eq!(merged.groups().len(), 2);
        assert_eq!(merged.partials().len(), 1);
        assert!(merged.findings().is_empty());
    }

    #[test]
    fn partials_of_removed_repos_are_dropped() {
        let partial = PartialConfig::new(ConfigOrigin::repo("gone", "fp-gone", "1"))
            .with_group(PipelineGroup::new("g").with_pipeline(PipelineConfig::new("p")));
        let merged = merge_partials(&main_with(vec![]), &[partial]);
        assert!(merged.pipeline("p").is_none());
        assert!(merged.partials().is_empty());
    }

    #[test]
    fn unknown_origin_partials_are_merged() {
        let partial = PartialConfig::new(ConfigOrigin::Unknown)
            .with_group(PipelineGroup::new("g").with_pipeline(PipelineConfig::new("p")));
        let merged = merge_partials(&main_with(vec![]), &[partial]);
        assert_eq!(merged.pipeline("p").unwrap().origin, ConfigOrigin::Unknown);
    }

    #[test]
    fn duplicate_pipeline_is_attributed_to_later_fragment() {
        let r1 = repo("r1", "fp-1");
        let origin = r1.origin_at("1");
        let partial = PartialConfig::new(origin.clone()).with_group(
            PipelineGroup::new("remote").with_pipeline(PipelineConfig::new("local-p")),
        );

        let merged = merge_partials(&main_with(vec![r1]), &[partial]);
        assert_eq!(merged.findings().len(), 1);
        let finding = &merged.findings()[0];
        assert_eq!(finding.field, "name");
        assert_eq!(finding.entity, "local-p");
        assert_eq!(finding.origin, origin);
        assert_eq!(
            finding.message,
            "You have defined multiple pipelines named 'local-p'. Pipeline names must be unique. Source(s): [primary config, r1 at 1]"
        );
        // First definition wins.
        assert_eq!(merged.pipeline("local-p").unwrap().origin, ConfigOrigin::Local);
        assert_eq!(merged.pipeline_count(), 1);
    }

    #[test]
    fn duplicate_group_across_origins_is_reported() {
        let r1 = repo("r1", "fp-1");
        let partial = PartialConfig::new(r1.origin_at("1")).with_group(
            PipelineGroup::new("local-group").with_pipeline(PipelineConfig::new("other")),
        );
        let merged = merge_partials(&main_with(vec![r1]), &[partial]);
        assert_eq!(merged.findings().len(), 1);
        assert_eq!(merged.findings()[0].kind, EntityKind::PipelineGroup);
        assert!(merged.pipeline("other").is_none());
    }

    #[test]
    fn environments_are_combined_across_origins() {
        let r1 = repo("r1", "fp-1");
        let origin = r1.origin_at("1");
        let mut main = main_with(vec![r1]);
        main.environments
            .push(EnvironmentConfig::new("prod").with_pipeline("local-p"));
        let partial = PartialConfig::new(origin.clone())
            .with_environment(EnvironmentConfig::new("prod").with_pipeline("remote-p"));

        let merged = merge_partials(&main, &[partial]);
        let prod = merged.environment("prod").unwrap();
        assert_eq!(prod.pipelines, vec!["local-p".to_string(), "remote-p".to_string()]);
        assert_eq!(prod.origins, vec![ConfigOrigin::Local, origin]);
        assert!(merged.findings().is_empty());
    }
}
