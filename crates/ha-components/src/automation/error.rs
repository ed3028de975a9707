//! Automation validation errors

use ha_automation::{ValidationError, ValidationStage};
use ha_blueprint::BlueprintError;
use serde_json::Value;
use thiserror::Error;

use super::schema::SchemaViolation;

/// Why an automation config was rejected
///
/// Only [`Catastrophic`](AutomationConfigError::Catastrophic) surfaces under
/// the lenient policy; the rest are returned by strict validation.
#[derive(Debug, Error)]
pub enum AutomationConfigError {
    #[error("{name}: failed to generate automation from blueprint: {source}")]
    BlueprintFetch {
        name: String,
        #[source]
        source: BlueprintError,
    },

    #[error("{name}: blueprint '{blueprint}' failed to generate automation with inputs {inputs}: {source}")]
    BlueprintUndefinedInput {
        name: String,
        blueprint: String,
        inputs: Value,
        #[source]
        source: BlueprintError,
    },

    #[error("{name} could not be validated: {source}")]
    SchemaViolation {
        name: String,
        #[source]
        source: SchemaViolation,
    },

    #[error("{name} failed to setup {}: {source}", .stage.plural())]
    SectionValidation {
        name: String,
        stage: ValidationStage,
        #[source]
        source: ValidationError,
    },

    #[error("{name} is not a valid automation config: {source}")]
    Catastrophic {
        name: String,
        #[source]
        source: SchemaViolation,
    },
}

impl AutomationConfigError {
    /// Display name of the rejected automation
    pub fn name(&self) -> &str {
        match self {
            AutomationConfigError::BlueprintFetch { name, .. }
            | AutomationConfigError::BlueprintUndefinedInput { name, .. }
            | AutomationConfigError::SchemaViolation { name, .. }
            | AutomationConfigError::SectionValidation { name, .. }
            | AutomationConfigError::Catastrophic { name, .. } => name,
        }
    }
}

pub type AutomationConfigResult<T> = Result<T, AutomationConfigError>;
