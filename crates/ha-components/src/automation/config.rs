//! Validated automation record

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::{CONF_ACTION, CONF_ALIAS, CONF_CONDITION, CONF_DESCRIPTION, CONF_ID, CONF_TRIGGER};

/// Result of validating one automation config
///
/// Holds the validated sections in canonical key order plus the snapshots
/// taken while validating. When `validation_failed` is set the automation
/// must not be started; after a blueprint or schema failure the mapping
/// only carries `id`, `alias` and `description`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationConfig {
    config: IndexMap<String, Value>,
    raw_config: Option<Map<String, Value>>,
    raw_blueprint_inputs: Option<Map<String, Value>>,
    validation_failed: bool,
}

impl AutomationConfig {
    /// Record for a config that passed the structural schema
    pub(crate) fn validated(
        config: IndexMap<String, Value>,
        raw_config: Option<Map<String, Value>>,
        raw_blueprint_inputs: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            config,
            raw_config,
            raw_blueprint_inputs,
            validation_failed: false,
        }
    }

    /// Disabled placeholder built from the minimal schema
    pub(crate) fn failed(
        minimal: IndexMap<String, Value>,
        raw_config: Option<Map<String, Value>>,
        raw_blueprint_inputs: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            config: minimal,
            raw_config,
            raw_blueprint_inputs,
            validation_failed: true,
        }
    }

    pub(crate) fn set_section(&mut self, key: &str, value: Value) {
        self.config.insert(key.to_string(), value);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.validation_failed = true;
    }

    /// Validated mapping in canonical key order
    pub fn config(&self) -> &IndexMap<String, Value> {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn id(&self) -> Option<&str> {
        self.get(CONF_ID).and_then(Value::as_str)
    }

    pub fn alias(&self) -> Option<&str> {
        self.get(CONF_ALIAS).and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.get(CONF_DESCRIPTION).and_then(Value::as_str)
    }

    pub fn trigger(&self) -> Option<&Value> {
        self.get(CONF_TRIGGER)
    }

    pub fn condition(&self) -> Option<&Value> {
        self.get(CONF_CONDITION)
    }

    pub fn action(&self) -> Option<&Value> {
        self.get(CONF_ACTION)
    }

    /// Input as given, `None` if it was not a mapping
    pub fn raw_config(&self) -> Option<&Map<String, Value>> {
        self.raw_config.as_ref()
    }

    /// Instance config with blueprint defaults merged into its inputs
    pub fn raw_blueprint_inputs(&self) -> Option<&Map<String, Value>> {
        self.raw_blueprint_inputs.as_ref()
    }

    pub fn validation_failed(&self) -> bool {
        self.validation_failed
    }

    /// Whether the automation may be set up
    pub fn is_runnable(&self) -> bool {
        !self.validation_failed
    }

    /// Mapping as JSON
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.config
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Mapping as re-emitted into a configuration document
    ///
    /// A disabled automation keeps only `id`, `alias` and `description`, so
    /// no consumer can mistake its sections for runnable ones.
    pub fn to_document_value(&self) -> Value {
        if !self.validation_failed {
            return self.to_value();
        }
        Value::Object(
            self.config
                .iter()
                .filter(|(key, _)| [CONF_ID, CONF_ALIAS, CONF_DESCRIPTION].contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

/// Serializes as the validated mapping
impl Serialize for AutomationConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.config.serialize(serializer)
    }
}
