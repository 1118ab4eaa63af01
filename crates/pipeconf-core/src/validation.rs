//! Validation of a merged configuration.
//!
//! Findings that can coexist (duplicates, repository settings, stage
//! references, rule violations) are collected into a [`ValidationReport`] so
//! one save attempt surfaces all of them. Cycles and missing references abort
//! the pass with an error instead: every later dependency-based check would be
//! meaningless on such a graph.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authority::PartialConfigAuthority;
use crate::domain::ConfigOrigin;
use crate::error::{ConfigError, Result};
use crate::graph::{check_stage_references, DependencyTable, DfsCycleDetector};
use crate::merge::MergedConfig;
use crate::obs;
use crate::repos::validate_config_repos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Pipeline,
    PipelineGroup,
    Environment,
    ConfigRepo,
}

/// Summary section a finding is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Rule,
    Config,
}

/// A finding attached to one field of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: EntityKind,
    /// Name of the offending entity.
    pub entity: String,
    pub field: String,
    pub message: String,
    pub origin: ConfigOrigin,
    pub category: ErrorCategory,
}

impl ValidationError {
    pub fn new(
        kind: EntityKind,
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
        origin: ConfigOrigin,
        category: ErrorCategory,
    ) -> Self {
        Self {
            kind,
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
            origin,
            category,
        }
    }

    /// Attach `err` to `entity`, keyed by the error's field.
    pub fn from_error(
        kind: EntityKind,
        entity: impl Into<String>,
        origin: ConfigOrigin,
        err: &ConfigError,
    ) -> Self {
        let category = match err {
            ConfigError::AuthorizationDenied { .. } => ErrorCategory::Rule,
            _ => ErrorCategory::Config,
        };
        Self::new(kind, entity, err.field(), err.to_string(), origin, category)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn errors_for<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.entity == entity)
    }

    pub fn errors_in(&self, category: ErrorCategory) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |e| e.category == category)
    }

    /// Operator-facing summary, rule violations first:
    ///
    /// ```text
    /// Number of errors: 1+
    /// I. Rule Validation Errors:
    ///     1. Not allowed to refer to pipeline group 'group'. ...;;
    ///
    /// II. Config Validation Errors:
    /// ```
    pub fn render_summary(&self) -> String {
        let mut out = format!("Number of errors: {}+\n", self.errors.len());
        out.push_str("I. Rule Validation Errors: \n");
        for (i, e) in self.errors_in(ErrorCategory::Rule).enumerate() {
            out.push_str(&format!("\t{}. {};; \n", i + 1, e.message));
        }
        out.push('\n');
        out.push_str("II. Config Validation Errors: \n");
        for (i, e) in self.errors_in(ErrorCategory::Config).enumerate() {
            out.push_str(&format!("\t{}. {};; \n", i + 1, e.message));
        }
        out
    }
}

impl Extend<ValidationError> for ValidationReport {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

/// Runs every check over a merged configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Order: merge findings, repository settings, cycle and existence check
    /// (aborts), stage references, rule authorization.
    pub fn validate(&self, config: &MergedConfig) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();
        report.extend(config.findings().iter().cloned());
        report.extend(validate_config_repos(config.config_repos(), config));

        let table = DependencyTable::from_config(config);
        let mut detector = DfsCycleDetector::new(&table);
        if let Err(err) = detector.validate_all() {
            obs::emit_graph_rejected(&err);
            return Err(err);
        }

        report.extend(check_stage_references(config));

        let authority = PartialConfigAuthority::new(config);
        report.extend(
            authority
                .authorize_all()
                .iter()
                .map(|violation| violation.to_validation_error()),
        );

        obs::emit_validation_completed(config.pipeline_count(), report.len(), report.is_valid());
        if !report.is_valid() {
            info!(errors = report.len(), "merged configuration has validation errors");
        }
        Ok(report)
    }
}
