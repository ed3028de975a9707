//! Blueprint resolution for automation configs

use ha_blueprint::{is_blueprint_instance_config, BlueprintError, BlueprintStore};
use serde_json::{Map, Value};
use tracing::debug;

/// A config with its blueprint, if any, substituted
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAutomation {
    pub config: Value,
    pub uses_blueprint: bool,
    /// Instance config with declared defaults merged into its inputs
    pub raw_blueprint_inputs: Option<Map<String, Value>>,
}

/// Blueprint resolution failure, carrying the unresolved config
#[derive(Debug)]
pub enum BlueprintFailure {
    /// The blueprint could not be fetched
    Fetch { config: Value, error: BlueprintError },

    /// The blueprint references an input with no value and no default
    UndefinedInput {
        config: Value,
        blueprint: String,
        inputs: Map<String, Value>,
        raw_blueprint_inputs: Map<String, Value>,
        error: BlueprintError,
    },
}

impl BlueprintFailure {
    /// Config as given to the resolver
    pub fn config(&self) -> &Value {
        match self {
            BlueprintFailure::Fetch { config, .. } | BlueprintFailure::UndefinedInput { config, .. } => {
                config
            }
        }
    }

    pub fn raw_blueprint_inputs(&self) -> Option<&Map<String, Value>> {
        match self {
            BlueprintFailure::Fetch { .. } => None,
            BlueprintFailure::UndefinedInput {
                raw_blueprint_inputs,
                ..
            } => Some(raw_blueprint_inputs),
        }
    }
}

/// Substitute the blueprint an automation config refers to
///
/// Configs without `use_blueprint` pass through unchanged.
pub async fn resolve_blueprint(
    store: &dyn BlueprintStore,
    config: Value,
) -> Result<ResolvedAutomation, BlueprintFailure> {
    if !is_blueprint_instance_config(&config) {
        return Ok(ResolvedAutomation {
            config,
            uses_blueprint: false,
            raw_blueprint_inputs: None,
        });
    }
    let instance = config.as_object().cloned().unwrap_or_default();

    let inputs = match store.fetch_inputs(&instance).await {
        Ok(inputs) => inputs,
        Err(error) => return Err(BlueprintFailure::Fetch { config, error }),
    };
    let raw_blueprint_inputs = match inputs.config_with_inputs() {
        Ok(raw) => raw,
        Err(error) => return Err(BlueprintFailure::Fetch { config, error }),
    };

    match inputs.substitute() {
        Ok(substituted) => {
            debug!(
                "Generated automation from blueprint '{}'",
                inputs.blueprint().name()
            );
            Ok(ResolvedAutomation {
                config: Value::Object(substituted),
                uses_blueprint: true,
                raw_blueprint_inputs: Some(raw_blueprint_inputs),
            })
        }
        Err(error) => Err(BlueprintFailure::UndefinedInput {
            blueprint: inputs.blueprint().name().to_string(),
            inputs: inputs.inputs(),
            config,
            raw_blueprint_inputs,
            error,
        }),
    }
}
