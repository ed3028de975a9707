//! Blueprint instances
//!
//! An instance config points at a blueprint and supplies input values:
//!
//! ```yaml
//! alias: Hallway light
//! use_blueprint:
//!   path: homeassistant/motion_light.yaml
//!   input:
//!     motion_entity: binary_sensor.hallway
//! ```
//!
//! Substitution replaces every `!input` tag of the blueprint body with the
//! instance's value, falling back to the declared default.

use std::sync::Arc;

use ha_config::yaml_to_json;
use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value;

use crate::blueprint::{Blueprint, CONF_BLUEPRINT, INPUT_TAG};
use crate::error::{BlueprintError, BlueprintResult};

/// Key referencing a blueprint from an instance config
pub const CONF_USE_BLUEPRINT: &str = "use_blueprint";

/// Key holding the instance's input values
pub const CONF_INPUT: &str = "input";

/// A blueprint paired with the config of one instance
#[derive(Debug, Clone)]
pub struct BlueprintInputs {
    blueprint: Arc<Blueprint>,
    config_with_blueprint: Map<String, JsonValue>,
}

impl BlueprintInputs {
    pub fn new(blueprint: Arc<Blueprint>, config_with_blueprint: Map<String, JsonValue>) -> Self {
        Self {
            blueprint,
            config_with_blueprint,
        }
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Input values supplied by the instance
    pub fn inputs(&self) -> Map<String, JsonValue> {
        self.config_with_blueprint
            .get(CONF_USE_BLUEPRINT)
            .and_then(|use_blueprint| use_blueprint.get(CONF_INPUT))
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Declared defaults overlaid with the instance's values
    pub fn inputs_with_default(&self) -> BlueprintResult<Map<String, JsonValue>> {
        let mut inputs = Map::new();
        for (name, declaration) in self.blueprint.inputs() {
            if let Some(default) = &declaration.default {
                let default = yaml_to_json(default.clone()).map_err(|e| {
                    BlueprintError::InvalidBlueprint {
                        name: self.blueprint.name().to_string(),
                        reason: format!("invalid default for input {}: {}", name, e),
                    }
                })?;
                inputs.insert(name.clone(), default);
            }
        }
        inputs.extend(self.inputs());
        Ok(inputs)
    }

    /// Instance config with defaults filled into `use_blueprint.input`
    pub fn config_with_inputs(&self) -> BlueprintResult<Map<String, JsonValue>> {
        let mut config = self.config_with_blueprint.clone();
        let inputs = JsonValue::Object(self.inputs_with_default()?);
        if let Some(JsonValue::Object(use_blueprint)) = config.get_mut(CONF_USE_BLUEPRINT) {
            use_blueprint.insert(CONF_INPUT.to_string(), inputs);
        }
        Ok(config)
    }

    /// Produce the concrete config of this instance
    ///
    /// Top-level keys of the instance config win over the blueprint body.
    /// The result carries neither `use_blueprint` nor `blueprint`.
    pub fn substitute(&self) -> BlueprintResult<Map<String, JsonValue>> {
        let inputs = self.inputs_with_default()?;

        let mut config = Map::new();
        for (key, value) in self.blueprint.data() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if key == CONF_BLUEPRINT {
                continue;
            }
            config.insert(key.to_string(), substitute(value.clone(), &inputs, self.blueprint())?);
        }

        config.extend(self.config_with_blueprint.clone());
        config.remove(CONF_USE_BLUEPRINT);
        config.remove(CONF_BLUEPRINT);
        Ok(config)
    }
}

/// Replace `!input` tags, converting to JSON on the way
fn substitute(
    value: Value,
    inputs: &Map<String, JsonValue>,
    blueprint: &Blueprint,
) -> BlueprintResult<JsonValue> {
    match value {
        Value::Tagged(tagged) if tagged.tag == INPUT_TAG => {
            let name = match &tagged.value {
                Value::String(name) => name.as_str(),
                _ => "",
            };
            inputs
                .get(name)
                .cloned()
                .ok_or_else(|| BlueprintError::UndefinedSubstitution {
                    input: name.to_string(),
                })
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| substitute(item, inputs, blueprint))
            .collect::<BlueprintResult<Vec<_>>>()
            .map(JsonValue::Array),
        Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match yaml_to_json(key) {
                    Ok(JsonValue::String(key)) => key,
                    Ok(other) => other.to_string(),
                    Err(e) => return Err(invalid(blueprint, e)),
                };
                map.insert(key, substitute(value, inputs, blueprint)?);
            }
            Ok(JsonValue::Object(map))
        }
        other => yaml_to_json(other).map_err(|e| invalid(blueprint, e)),
    }
}

fn invalid(blueprint: &Blueprint, err: ha_config::ConfigError) -> BlueprintError {
    BlueprintError::InvalidBlueprint {
        name: blueprint.name().to_string(),
        reason: err.to_string(),
    }
}
