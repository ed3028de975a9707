//! Error types for blueprints

use std::path::PathBuf;
use thiserror::Error;

/// Result type for blueprint operations
pub type BlueprintResult<T> = Result<T, BlueprintError>;

/// Errors raised while fetching or applying a blueprint
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// Malformed `use_blueprint` section
    #[error("Invalid blueprint inputs: {reason}")]
    InvalidConfig { reason: String },

    /// No blueprint at the referenced path
    #[error("Failed to load blueprint {domain}/{path}: not found")]
    NotFound { domain: String, path: String },

    #[error("Failed to load blueprint {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load blueprint {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Blueprint file does not describe a valid blueprint
    #[error("Invalid blueprint {name}: {reason}")]
    InvalidBlueprint { name: String, reason: String },

    /// Blueprint is for another domain
    #[error("Found incorrect blueprint type {found}, expected {expected}")]
    WrongDomain { expected: String, found: String },

    /// Referenced path escapes the blueprint directory
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// `!input` reference with neither a value nor a default
    #[error("No substitution found for input {input}")]
    UndefinedSubstitution { input: String },
}
