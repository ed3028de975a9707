//! Rule validator
//!
//! Runs one automation config through blueprint resolution, the structural
//! schema and the section validators. The [`ValidationPolicy`] decides
//! whether a failure is returned as an error or turns the automation into a
//! disabled placeholder.

use std::sync::Arc;

use ha_automation::{
    ConditionConfigValidator, SectionValidator, TriggerConfigValidator, ValidationContext,
};
use ha_blueprint::BlueprintStore;
use ha_script::ActionConfigValidator;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::blueprint::{resolve_blueprint, BlueprintFailure};
use super::config::AutomationConfig;
use super::error::{AutomationConfigError, AutomationConfigResult};
use super::schema::{validate_minimal_schema, validate_platform_schema};
use super::{CONF_ALIAS, CONF_ID};

/// What to do with an invalid automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Return the failure as an error, without logging blueprint or schema failures
    Strict,

    /// Log the failure and keep a disabled placeholder
    #[default]
    Lenient,
}

impl ValidationPolicy {
    fn raises(self) -> bool {
        self == ValidationPolicy::Strict
    }

    fn warns(self) -> bool {
        self == ValidationPolicy::Lenient
    }
}

/// Name used for an automation in log messages and errors
pub fn automation_name(config: &Value) -> String {
    let field = |key: &str| match config.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    if let Some(alias) = field(CONF_ALIAS) {
        format!("Automation with alias '{}'", alias)
    } else if let Some(id) = field(CONF_ID) {
        format!("Automation with ID '{}'", id)
    } else {
        "Unnamed automation".to_string()
    }
}

/// Validates automation configs
#[derive(Clone)]
pub struct AutomationConfigValidator {
    blueprints: Arc<dyn BlueprintStore>,
    context: ValidationContext,
    trigger_validator: Arc<dyn SectionValidator>,
    condition_validator: Arc<dyn SectionValidator>,
    action_validator: Arc<dyn SectionValidator>,
}

impl AutomationConfigValidator {
    /// Validator with the built-in section validators
    pub fn new(blueprints: Arc<dyn BlueprintStore>) -> Self {
        Self {
            blueprints,
            context: ValidationContext::new(),
            trigger_validator: Arc::new(TriggerConfigValidator),
            condition_validator: Arc::new(ConditionConfigValidator),
            action_validator: Arc::new(ActionConfigValidator),
        }
    }

    /// Platforms provided by integrations
    pub fn with_context(mut self, context: ValidationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_trigger_validator(mut self, validator: Arc<dyn SectionValidator>) -> Self {
        self.trigger_validator = validator;
        self
    }

    pub fn with_condition_validator(mut self, validator: Arc<dyn SectionValidator>) -> Self {
        self.condition_validator = validator;
        self
    }

    pub fn with_action_validator(mut self, validator: Arc<dyn SectionValidator>) -> Self {
        self.action_validator = validator;
        self
    }

    pub fn blueprints(&self) -> &Arc<dyn BlueprintStore> {
        &self.blueprints
    }

    /// Validate, returning the first failure as an error
    pub async fn validate_strict(&self, config: Value) -> AutomationConfigResult<AutomationConfig> {
        self.validate_item(config, ValidationPolicy::Strict).await
    }

    /// Validate, keeping invalid automations as disabled placeholders
    ///
    /// `None` when not even a placeholder can be built.
    pub async fn validate_lenient(&self, config: Value) -> Option<AutomationConfig> {
        match self.validate_item(config, ValidationPolicy::Lenient).await {
            Ok(automation) => Some(automation),
            Err(err) => {
                debug!("Dropping invalid automation config: {}", err);
                None
            }
        }
    }

    /// Validate one automation config
    ///
    /// Under [`ValidationPolicy::Lenient`] only a config that is not a mapping,
    /// or whose `id`, `alias` or `description` is unusable, returns an error.
    pub async fn validate_item(
        &self,
        config: Value,
        policy: ValidationPolicy,
    ) -> AutomationConfigResult<AutomationConfig> {
        let raw_config = config.as_object().cloned();
        let name = automation_name(&config);

        let (config, raw_blueprint_inputs) =
            match resolve_blueprint(self.blueprints.as_ref(), config).await {
                Ok(resolved) => (resolved.config, resolved.raw_blueprint_inputs),
                Err(failure) => {
                    return self.blueprint_failed(name, failure, raw_config, policy);
                }
            };

        let validated = match validate_platform_schema(&config) {
            Ok(validated) => validated,
            Err(violation) => {
                if policy.warns() {
                    error!(
                        "{} could not be validated and has been disabled: {}",
                        name, violation
                    );
                }
                if policy.raises() {
                    return Err(AutomationConfigError::SchemaViolation {
                        name,
                        source: violation,
                    });
                }
                return placeholder(name, &config, raw_config, raw_blueprint_inputs);
            }
        };

        let mut automation = AutomationConfig::validated(validated, raw_config, raw_blueprint_inputs);
        for validator in [
            &self.trigger_validator,
            &self.condition_validator,
            &self.action_validator,
        ] {
            let stage = validator.stage();
            let key = stage.config_key();
            let Some(section) = automation.get(key).cloned() else {
                continue;
            };

            match validator.validate(section, &self.context).await {
                Ok(section) => automation.set_section(key, section),
                Err(err) => {
                    error!(
                        "{} failed to setup {} and has been disabled: {}",
                        name,
                        stage.plural(),
                        err
                    );
                    if policy.raises() {
                        return Err(AutomationConfigError::SectionValidation {
                            name,
                            stage,
                            source: err,
                        });
                    }
                    automation.mark_failed();
                    return Ok(automation);
                }
            }
        }

        debug!("Validated {}", name);
        Ok(automation)
    }

    fn blueprint_failed(
        &self,
        name: String,
        failure: BlueprintFailure,
        raw_config: Option<Map<String, Value>>,
        policy: ValidationPolicy,
    ) -> AutomationConfigResult<AutomationConfig> {
        match failure {
            BlueprintFailure::Fetch { config, error } => {
                if policy.warns() {
                    error!("Failed to generate automation from blueprint: {}", error);
                }
                if policy.raises() {
                    return Err(AutomationConfigError::BlueprintFetch {
                        name,
                        source: error,
                    });
                }
                placeholder(name, &config, raw_config, None)
            }
            BlueprintFailure::UndefinedInput {
                config,
                blueprint,
                inputs,
                raw_blueprint_inputs,
                error,
            } => {
                let inputs = Value::Object(inputs);
                if policy.warns() {
                    error!(
                        "Blueprint '{}' failed to generate automation with inputs {}: {}",
                        blueprint, inputs, error
                    );
                }
                if policy.raises() {
                    return Err(AutomationConfigError::BlueprintUndefinedInput {
                        name,
                        blueprint,
                        inputs,
                        source: error,
                    });
                }
                placeholder(name, &config, raw_config, Some(raw_blueprint_inputs))
            }
        }
    }
}

/// Disabled automation carrying only what the minimal schema salvages
fn placeholder(
    name: String,
    config: &Value,
    raw_config: Option<Map<String, Value>>,
    raw_blueprint_inputs: Option<Map<String, Value>>,
) -> AutomationConfigResult<AutomationConfig> {
    let minimal: IndexMap<String, Value> = validate_minimal_schema(config)
        .map_err(|source| AutomationConfigError::Catastrophic { name, source })?;
    Ok(AutomationConfig::failed(minimal, raw_config, raw_blueprint_inputs))
}

impl std::fmt::Debug for AutomationConfigValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationConfigValidator")
            .field("domain", &self.blueprints.domain())
            .field("context", &self.context)
            .field("trigger", &self.trigger_validator.stage())
            .field("condition", &self.condition_validator.stage())
            .field("action", &self.action_validator.stage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ha_automation::{ValidationError, ValidationResult, ValidationStage};
    use ha_blueprint::DomainBlueprints;
    use serde_json::json;

    struct Rejecting(ValidationStage);

    #[async_trait]
    impl SectionValidator for Rejecting {
        fn stage(&self) -> ValidationStage {
            self.0
        }

        async fn validate(&self, _: Value, _: &ValidationContext) -> ValidationResult<Value> {
            Err(ValidationError::new(self.0, "rejected"))
        }
    }

    fn validator() -> AutomationConfigValidator {
        AutomationConfigValidator::new(Arc::new(DomainBlueprints::in_memory("automation")))
    }

    #[test]
    fn test_automation_name() {
        assert_eq!(
            automation_name(&json!({"alias": "Porch", "id": "1"})),
            "Automation with alias 'Porch'"
        );
        assert_eq!(automation_name(&json!({"id": "1"})), "Automation with ID '1'");
        assert_eq!(automation_name(&json!({})), "Unnamed automation");
        assert_eq!(automation_name(&json!("nope")), "Unnamed automation");
    }

    #[tokio::test]
    async fn test_section_failure_strict() {
        let validator = validator()
            .with_condition_validator(Arc::new(Rejecting(ValidationStage::Condition)));

        let err = validator
            .validate_strict(json!({
                "id": "x",
                "trigger": [],
                "condition": [],
                "action": []
            }))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AutomationConfigError::SectionValidation { stage: ValidationStage::Condition, .. }
        ));
        assert_eq!(
            err.to_string(),
            "Automation with ID 'x' failed to setup conditions: rejected"
        );
    }

    #[tokio::test]
    async fn test_section_failure_lenient_keeps_schema_values() {
        let validator =
            validator().with_action_validator(Arc::new(Rejecting(ValidationStage::Action)));

        let automation = validator
            .validate_lenient(json!({
                "alias": "Kept",
                "trigger": {"platform": "state", "entity_id": "light.x"},
                "action": {"service": "light.turn_on"}
            }))
            .await
            .unwrap();

        assert!(automation.validation_failed());
        assert_eq!(automation.alias(), Some("Kept"));
        assert_eq!(
            automation.trigger(),
            Some(&json!([{"trigger": "state", "entity_id": ["light.x"]}]))
        );
        assert_eq!(automation.action(), Some(&json!([{"service": "light.turn_on"}])));
    }

    #[tokio::test]
    async fn test_condition_skipped_when_absent() {
        let validator = validator()
            .with_condition_validator(Arc::new(Rejecting(ValidationStage::Condition)));

        let automation = validator
            .validate_strict(json!({"trigger": [], "action": []}))
            .await
            .unwrap();
        assert!(automation.is_runnable());
        assert!(automation.condition().is_none());
    }

    #[tokio::test]
    async fn test_catastrophic_lenient() {
        assert!(validator().validate_lenient(json!(["not", "a", "rule"])).await.is_none());
        assert!(validator().validate_lenient(json!({"id": 7})).await.is_none());

        let err = validator()
            .validate_item(json!({"id": 7}), ValidationPolicy::Lenient)
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationConfigError::Catastrophic { .. }));
        assert_eq!(err.name(), "Automation with ID '7'");
    }
}
