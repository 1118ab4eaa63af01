//! Validation of registered config repositories.

use std::collections::HashSet;

use crate::domain::{ConfigOrigin, ConfigRepoConfig};
use crate::error::ConfigError;
use crate::merge::MergedConfig;
use crate::validation::{EntityKind, ErrorCategory, ValidationError};

/// Check ids, material fingerprints and plugin ids of `repos`, and that a
/// repository material shared with a primary-config pipeline agrees on the
/// auto-update flag.
pub fn validate_config_repos(repos: &[ConfigRepoConfig], config: &MergedConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();
    let mut fingerprints = HashSet::new();

    for repo in repos {
        if !ids.insert(repo.id.as_str()) {
            errors.push(duplicate(
                repo,
                "id",
                &repo.id,
                format!(
                    "You have defined multiple configuration repositories with the same id - '{}'.",
                    repo.id
                ),
            ));
        }

        if !fingerprints.insert(repo.fingerprint()) {
            errors.push(duplicate(
                repo,
                "material",
                repo.fingerprint(),
                format!(
                    "You have defined multiple configuration repositories with the same repository - '{}'.",
                    repo.fingerprint()
                ),
            ));
        }

        if repo.plugin_id.trim().is_empty() {
            errors.push(repo_error(
                repo,
                "plugin_id",
                "Configuration repository cannot have a blank plugin id.".to_string(),
            ));
        }

        let conflicting = config
            .all_pipelines()
            .filter(|p| p.origin.is_local())
            .flat_map(|p| p.scm_materials())
            .find(|m| {
                m.fingerprint == repo.material.fingerprint && m.auto_update != repo.material.auto_update
            });
        if conflicting.is_some() {
            errors.push(repo_error(
                repo,
                "material",
                format!(
                    "Material of type {} ({}) is specified more than once in the configuration with different values for the autoUpdate attribute. All copies of this material must have the same value for this attribute.",
                    repo.material.kind,
                    repo.material.display_name()
                ),
            ));
        }
    }
    errors
}

fn duplicate(repo: &ConfigRepoConfig, field: &str, value: &str, message: String) -> ValidationError {
    ValidationError::from_error(
        EntityKind::ConfigRepo,
        &repo.id,
        ConfigOrigin::Local,
        &ConfigError::DuplicateIdentity {
            field: field.to_string(),
            value: value.to_string(),
            message,
        },
    )
}

fn repo_error(repo: &ConfigRepoConfig, field: &str, message: String) -> ValidationError {
    ValidationError::new(
        EntityKind::ConfigRepo,
        &repo.id,
        field,
        message,
        ConfigOrigin::Local,
        ErrorCategory::Config,
    )
}
