//! Pipeline dependency graph validation.
//!
//! Nodes are pipeline names; an edge `N -> (T, stage)` means pipeline `N`
//! depends on `stage` of pipeline `T`. The detector walks the graph depth
//! first with an explicit stack and three colours, so thousands of pipelines
//! never exhaust the native stack. Colours are shared across all roots of a
//! run, which keeps the walk O(V + E).

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::domain::DependencyMaterial;
use crate::error::{ConfigError, Result};
use crate::merge::MergedConfig;
use crate::validation::{EntityKind, ErrorCategory, ValidationError};

/// Edge of the dependency graph.
pub type DependencyEdge = DependencyMaterial;

/// Read-only lookup the detector runs against.
pub trait PipelineDependencyState {
    fn has_pipeline(&self, name: &str) -> bool;

    /// Outgoing edges of `name`; empty for leaves and unknown pipelines.
    fn dependencies_of(&self, name: &str) -> &[DependencyEdge];

    /// Every pipeline, in a stable order.
    fn pipeline_names(&self) -> Vec<&str>;
}

/// Dependency edges by pipeline name, rebuilt for every validation run.
#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    edges: BTreeMap<String, Vec<DependencyEdge>>,
}

impl DependencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pipeline: impl Into<String>, edges: Vec<DependencyEdge>) {
        self.edges.insert(pipeline.into(), edges);
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>, edges: Vec<DependencyEdge>) -> Self {
        self.insert(pipeline, edges);
        self
    }

    pub fn from_config(config: &MergedConfig) -> Self {
        config
            .all_pipelines()
            .map(|p| (p.name.clone(), p.dependencies().cloned().collect()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl FromIterator<(String, Vec<DependencyEdge>)> for DependencyTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<DependencyEdge>)>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}

impl PipelineDependencyState for DependencyTable {
    fn has_pipeline(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    fn dependencies_of(&self, name: &str) -> &[DependencyEdge] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn pipeline_names(&self) -> Vec<&str> {
        self.edges.keys().map(String::as_str).collect()
    }
}

/// Depth-first cycle detector with an explicit path stack.
///
/// White nodes are in neither set, gray nodes are on the current path, black
/// nodes are fully validated and never explored again.
pub struct DfsCycleDetector<'a, S: PipelineDependencyState + ?Sized> {
    state: &'a S,
    gray: HashSet<String>,
    black: HashSet<String>,
    path: Vec<String>,
    finished: Vec<String>,
}

impl<'a, S: PipelineDependencyState + ?Sized> DfsCycleDetector<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            gray: HashSet::new(),
            black: HashSet::new(),
            path: Vec::new(),
            finished: Vec::new(),
        }
    }

    /// Validate every pipeline reachable from `roots`.
    pub fn validate<I, T>(&mut self, roots: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for root in roots {
            self.visit(root.as_ref())?;
        }
        if let Some(stuck) = self.gray.iter().next() {
            return Err(ConfigError::Internal(format!(
                "pipeline '{stuck}' still on the dependency path after validation"
            )));
        }
        Ok(())
    }

    pub fn validate_all(&mut self) -> Result<()> {
        let state = self.state;
        self.validate(state.pipeline_names())
    }

    /// Pipelines validated so far, every pipeline after its dependencies.
    pub fn topological_order(&self) -> &[String] {
        &self.finished
    }

    fn visit(&mut self, root: &str) -> Result<()> {
        if self.black.contains(root) {
            return Ok(());
        }
        let state = self.state;
        self.enter(root)?;
        // (pipeline, index of the next edge to follow)
        let mut frames: Vec<(String, usize)> = vec![(root.to_string(), 0)];

        while let Some(frame) = frames.last_mut() {
            let edges = state.dependencies_of(&frame.0);
            match edges.get(frame.1) {
                Some(edge) => {
                    frame.1 += 1;
                    let target = edge.pipeline.as_str();
                    if self.gray.contains(target) {
                        return Err(self.cycle_error(target));
                    }
                    if self.black.contains(target) {
                        continue;
                    }
                    self.enter(target)?;
                    frames.push((target.to_string(), 0));
                }
                None => {
                    if let Some((done, _)) = frames.pop() {
                        self.leave(done);
                    }
                }
            }
        }
        Ok(())
    }

    fn enter(&mut self, pipeline: &str) -> Result<()> {
        if !self.state.has_pipeline(pipeline) {
            return Err(ConfigError::MissingReference {
                pipeline: pipeline.to_string(),
                referenced_by: self.path.last().cloned(),
            });
        }
        self.gray.insert(pipeline.to_string());
        self.path.push(pipeline.to_string());
        Ok(())
    }

    fn leave(&mut self, pipeline: String) {
        self.gray.remove(&pipeline);
        self.path.pop();
        self.black.insert(pipeline.clone());
        self.finished.push(pipeline);
    }

    fn cycle_error(&self, target: &str) -> ConfigError {
        let start = self
            .path
            .iter()
            .position(|p| p == target)
            .unwrap_or_default();
        let mut cycle: Vec<&str> = self.path[start..].iter().map(String::as_str).collect();
        cycle.push(target);
        let message = format!("Circular dependency: {}", cycle.join(" <- "));
        debug!(%message, "dependency cycle detected");
        ConfigError::CycleDetected { message }
    }
}

/// Validate the whole merged graph and return a dependencies-first order.
pub fn validate_dependencies(config: &MergedConfig) -> Result<Vec<String>> {
    let table = DependencyTable::from_config(config);
    let mut detector = DfsCycleDetector::new(&table);
    detector.validate_all()?;
    Ok(detector.topological_order().to_vec())
}

/// Dependency edges naming a stage the upstream pipeline does not have.
///
/// Only meaningful on a graph that passed cycle and existence checks.
pub fn check_stage_references(config: &MergedConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for pipeline in config.all_pipelines() {
        for edge in pipeline.dependencies() {
            let Some(upstream) = config.pipeline(&edge.pipeline) else {
                continue;
            };
            if upstream.has_stage(&edge.stage) {
                continue;
            }
            errors.push(ValidationError::new(
                EntityKind::Pipeline,
                &pipeline.name,
                "stage",
                format!(
                    "Stage with name '{}' does not exist on pipeline '{}', it is being referred to from pipeline '{}' ({})",
                    edge.stage, edge.pipeline, pipeline.name, pipeline.origin
                ),
                pipeline.origin.clone(),
                ErrorCategory::Config,
            ));
        }
    }
    errors
}
