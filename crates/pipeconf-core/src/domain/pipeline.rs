//! Pipelines, pipeline groups and environments.

use serde::{Deserialize, Serialize};

use super::material::{DependencyMaterial, MaterialConfig, ScmMaterial};
use super::origin::ConfigOrigin;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Stage names in execution order.
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub materials: Vec<MaterialConfig>,
    #[serde(default)]
    pub origin: ConfigOrigin,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            materials: Vec::new(),
            origin: ConfigOrigin::Local,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stages.push(stage.into());
        self
    }

    pub fn with_material(mut self, material: MaterialConfig) -> Self {
        self.materials.push(material);
        self
    }

    /// Add a dependency on `stage` of `pipeline`.
    pub fn depends_on(self, pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        self.with_material(MaterialConfig::Dependency(DependencyMaterial::new(
            pipeline, stage,
        )))
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &DependencyMaterial> {
        self.materials.iter().filter_map(MaterialConfig::as_dependency)
    }

    pub fn scm_materials(&self) -> impl Iterator<Item = &ScmMaterial> {
        self.materials.iter().filter_map(MaterialConfig::as_scm)
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineGroup {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
    #[serde(default)]
    pub origin: ConfigOrigin,
}

impl PipelineGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipelines: Vec::new(),
            origin: ConfigOrigin::Local,
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// Tag the group and every pipeline in it.
    pub fn set_origin(&mut self, origin: &ConfigOrigin) {
        self.origin = origin.clone();
        for pipeline in &mut self.pipelines {
            pipeline.origin = origin.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    /// Names of the pipelines assigned to this environment.
    #[serde(default)]
    pub pipelines: Vec<String>,
    #[serde(default)]
    pub origin: ConfigOrigin,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipelines: Vec::new(),
            origin: ConfigOrigin::Local,
        }
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipelines.push(pipeline.into());
        self
    }
}
