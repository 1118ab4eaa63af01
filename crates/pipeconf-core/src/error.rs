//! Error types for pipeconf-core

use pipeconf_store::StoreError;
use thiserror::Error;

use crate::domain::ResourceType;

/// Errors that abort a configuration load or validation pass.
///
/// Findings that can be reported side by side (authorization, duplicates,
/// repo validation) are collected as [`crate::ValidationError`] values
/// instead; these variants are also used to build those findings' messages.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The pipeline dependency graph contains a cycle
    #[error("{message}")]
    CycleDetected { message: String },

    /// A dependency names a pipeline that does not exist
    #[error("{}", missing_reference_message(.pipeline, .referenced_by.as_deref()))]
    MissingReference {
        pipeline: String,
        referenced_by: Option<String>,
    },

    /// A fragment refers to something its repository's rules do not allow
    #[error(
        "Not allowed to refer to {} '{name}'. Check the 'Rules' of this config repository.",
        .resource_type.label()
    )]
    AuthorizationDenied {
        resource_type: ResourceType,
        name: String,
    },

    /// Two entities claim the same identity
    #[error("{message}")]
    DuplicateIdentity {
        field: String,
        value: String,
        message: String,
    },

    /// The primary configuration text could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Configuration history error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Broken algorithm invariant; never caused by user input
    #[error("Internal error: {0}")]
    Internal(String),
}

fn missing_reference_message(pipeline: &str, referenced_by: Option<&str>) -> String {
    match referenced_by {
        Some(parent) => {
            format!("Pipeline \"{pipeline}\" does not exist. It is used from pipeline \"{parent}\".")
        }
        None => format!("Pipeline \"{pipeline}\" does not exist."),
    }
}

impl ConfigError {
    /// Field key under which this error is attached to an entity.
    pub fn field(&self) -> &str {
        match self {
            ConfigError::CycleDetected { .. } | ConfigError::MissingReference { .. } => {
                "materials"
            }
            ConfigError::AuthorizationDenied { resource_type, .. } => resource_type.key(),
            ConfigError::DuplicateIdentity { field, .. } => field,
            ConfigError::Parse(_) | ConfigError::Store(_) | ConfigError::Internal(_) => "base",
        }
    }

    /// Cycle and missing-reference errors stop dependency-based checks.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            ConfigError::CycleDetected { .. } | ConfigError::MissingReference { .. }
        )
    }
}

/// Result type for pipeconf-core operations
pub type Result<T> = std::result::Result<T, ConfigError>;
