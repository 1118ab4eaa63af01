//! Domain model of the pipeline configuration.
//!
//! - `ConfigOrigin`: provenance tag on every group, environment and pipeline
//! - `PipelineConfig`, `PipelineGroup`, `EnvironmentConfig`
//! - `Rule`/`Rules`: per-repository reference rules
//! - `ConfigRepoConfig`, `PartialConfig`, `MainConfig`

pub mod config;
pub mod material;
pub mod origin;
pub mod pipeline;
pub mod rules;

pub use config::{ConfigRepoConfig, MainConfig, PartialConfig};
pub use material::{DependencyMaterial, MaterialConfig, ScmMaterial};
pub use origin::ConfigOrigin;
pub use pipeline::{EnvironmentConfig, PipelineConfig, PipelineGroup};
pub use rules::{Directive, ResourceType, Rule, Rules, REFER, WILDCARD};
