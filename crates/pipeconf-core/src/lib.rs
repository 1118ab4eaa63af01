//! pipeconf-core: consistency checks for the merged pipeline configuration
//!
//! On every (re)load the primary configuration is merged with the partial
//! fragments fetched from config repositories, then:
//!
//! - the pipeline dependency graph is checked for cycles and dangling
//!   references ([`graph`])
//! - every fragment is checked against its repository's rules ([`authority`])
//! - config repositories and merged names are checked for duplicates
//!   ([`repos`], [`merge`])
//!
//! The primary configuration text itself is versioned by `pipeconf-store`.

pub mod authority;
pub mod domain;
pub mod error;
pub mod graph;
pub mod loader;
pub mod merge;
pub mod obs;
pub mod parser;
pub mod partials;
pub mod repos;
pub mod telemetry;
pub mod validation;

pub use authority::{PartialConfigAuthority, RepoRulesTable, RuleViolation};
pub use domain::{
    ConfigOrigin, ConfigRepoConfig, DependencyMaterial, Directive, EnvironmentConfig,
    MainConfig, MaterialConfig, PartialConfig, PipelineConfig, PipelineGroup, ResourceType, Rule,
    Rules, ScmMaterial,
};
pub use error::{ConfigError, Result};
pub use graph::{
    check_stage_references, validate_dependencies, DependencyEdge, DependencyTable,
    DfsCycleDetector, PipelineDependencyState,
};
pub use loader::{ConfigLoader, LoadedConfig, PartialSet};
pub use merge::{merge_partials, MergedConfig, MergedEnvironment};
pub use parser::{ConfigParser, JsonConfigParser};
pub use partials::CachedPartials;
pub use repos::validate_config_repos;
pub use validation::{ConfigValidator, EntityKind, ErrorCategory, ValidationError, ValidationReport};
