//! Section validation seam
//!
//! Triggers, conditions and actions are validated by independently owned
//! validators. They all fail with the same [`ValidationError`] so a caller
//! can handle every section the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Section of an automation a validator is responsible for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Trigger,
    Condition,
    Action,
}

impl ValidationStage {
    /// Config key holding this section
    pub fn config_key(&self) -> &'static str {
        match self {
            ValidationStage::Trigger => "trigger",
            ValidationStage::Condition => "condition",
            ValidationStage::Action => "action",
        }
    }

    /// Plural used in diagnostics ("failed to setup triggers")
    pub fn plural(&self) -> &'static str {
        match self {
            ValidationStage::Trigger => "triggers",
            ValidationStage::Condition => "conditions",
            ValidationStage::Action => "actions",
        }
    }
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// One step of the location of an error inside a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Section validation failure
///
/// Displays like voluptuous: `message @ data[0]['entity_id']`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", format_path(.path))]
pub struct ValidationError {
    /// Section that failed
    pub stage: ValidationStage,
    /// Human readable cause
    pub message: String,
    /// Location of the offending value, outermost first
    pub path: Vec<PathSegment>,
}

/// Render a path as ` @ data[0]['key']`, empty for the root
pub fn format_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = String::from(" @ data");
    for segment in path {
        match segment {
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
            PathSegment::Key(key) => out.push_str(&format!("['{}']", key)),
        }
    }
    out
}

impl ValidationError {
    /// Create a new error for a section
    pub fn new(stage: ValidationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn trigger(message: impl Into<String>) -> Self {
        Self::new(ValidationStage::Trigger, message)
    }

    pub fn condition(message: impl Into<String>) -> Self {
        Self::new(ValidationStage::Condition, message)
    }

    pub fn action(message: impl Into<String>) -> Self {
        Self::new(ValidationStage::Action, message)
    }

    /// Prefix the path with a list index
    pub fn in_item(mut self, index: usize) -> Self {
        self.path.insert(0, PathSegment::Index(index));
        self
    }

    /// Prefix the path with a mapping key
    pub fn in_key(mut self, key: impl Into<String>) -> Self {
        self.path.insert(0, PathSegment::Key(key.into()));
        self
    }

    /// Re-attribute a nested failure to the enclosing section
    ///
    /// A condition nested in an action sequence fails the action section.
    pub fn restage(mut self, stage: ValidationStage) -> Self {
        self.stage = stage;
        self
    }
}

/// Result type for section validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Resolution context handed to every section validator
///
/// Carries the trigger and condition platforms provided by integrations.
/// Those are accepted with pass-through normalization since their schemas
/// are owned by the integration.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    trigger_platforms: HashSet<String>,
    condition_platforms: HashSet<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an integration trigger platform (e.g. "mqtt")
    pub fn with_trigger_platform(mut self, platform: impl Into<String>) -> Self {
        self.trigger_platforms.insert(platform.into());
        self
    }

    /// Accept an integration condition platform
    pub fn with_condition_platform(mut self, platform: impl Into<String>) -> Self {
        self.condition_platforms.insert(platform.into());
        self
    }

    /// Whether an integration provides this trigger platform
    ///
    /// `integration.subtype` platforms are looked up by integration.
    pub fn has_trigger_platform(&self, platform: &str) -> bool {
        let integration = platform.split('.').next().unwrap_or(platform);
        self.trigger_platforms.contains(integration)
    }

    /// Whether an integration provides this condition platform
    pub fn has_condition_platform(&self, platform: &str) -> bool {
        let integration = platform.split('.').next().unwrap_or(platform);
        self.condition_platforms.contains(integration)
    }
}

/// Validator for one section of an automation config
///
/// Accepts the raw structural value of the section and returns its
/// normalized form. Normalization must be idempotent.
#[async_trait]
pub trait SectionValidator: Send + Sync {
    /// Section this validator owns
    fn stage(&self) -> ValidationStage;

    /// Validate and normalize a raw section value
    async fn validate(&self, config: Value, context: &ValidationContext)
        -> ValidationResult<Value>;
}
