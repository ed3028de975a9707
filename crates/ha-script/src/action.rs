//! Action validation
//!
//! Actions are the building blocks of scripts and automations. The kind of an
//! action is decided by which key it carries (`delay`, `choose`, `service`,
//! ...). Each kind is checked against its own schema; nested sequences,
//! conditions and wait triggers are validated recursively so that the whole
//! tree comes out normalized.

use std::sync::OnceLock;

use async_trait::async_trait;
use ha_automation::helpers::{ensure_list, is_template, one_or_many, split_keys, DurationSpec};
use ha_automation::{
    validate_condition, validate_conditions_config, validate_trigger_config, SectionValidator,
    ValidationContext, ValidationError, ValidationResult, ValidationStage,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options every action accepts
const ACTION_OPTION_KEYS: &[&str] = &["alias", "enabled", "continue_on_error"];

/// Kind of a script action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Service,
    Delay,
    WaitTemplate,
    WaitForTrigger,
    Variables,
    Choose,
    If,
    Repeat,
    Sequence,
    Parallel,
    Condition,
    Stop,
    Event,
    Scene,
    Device,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Service => "service",
            ActionKind::Delay => "delay",
            ActionKind::WaitTemplate => "wait_template",
            ActionKind::WaitForTrigger => "wait_for_trigger",
            ActionKind::Variables => "variables",
            ActionKind::Choose => "choose",
            ActionKind::If => "if",
            ActionKind::Repeat => "repeat",
            ActionKind::Sequence => "sequence",
            ActionKind::Parallel => "parallel",
            ActionKind::Condition => "condition",
            ActionKind::Stop => "stop",
            ActionKind::Event => "event",
            ActionKind::Scene => "scene",
            ActionKind::Device => "device",
        }
    }
}

/// Decide the kind of an action from the keys it carries
///
/// Keys are probed in a fixed order, so `{"delay": .., "service": ..}`
/// is a delay (and then fails on the extra key).
pub fn determine_action_kind(action: &Map<String, Value>) -> Option<ActionKind> {
    const PROBES: &[(&str, ActionKind)] = &[
        ("delay", ActionKind::Delay),
        ("wait_template", ActionKind::WaitTemplate),
        ("condition", ActionKind::Condition),
        ("event", ActionKind::Event),
        ("device_id", ActionKind::Device),
        ("scene", ActionKind::Scene),
        ("repeat", ActionKind::Repeat),
        ("choose", ActionKind::Choose),
        ("if", ActionKind::If),
        ("wait_for_trigger", ActionKind::WaitForTrigger),
        ("variables", ActionKind::Variables),
        ("stop", ActionKind::Stop),
        ("parallel", ActionKind::Parallel),
        ("sequence", ActionKind::Sequence),
        ("service", ActionKind::Service),
        ("action", ActionKind::Service),
        ("service_template", ActionKind::Service),
    ];

    PROBES
        .iter()
        .find(|(key, _)| action.contains_key(*key))
        .map(|(_, kind)| *kind)
}

/// Options shared by all actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Keep running the sequence when this action fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_error: Option<bool>,
}

/// Target specification for service calls
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Target {
    /// Target entity IDs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub entity_id: Vec<String>,

    /// Target device IDs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub device_id: Vec<String>,

    /// Target area IDs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub area_id: Vec<String>,

    /// Target floor IDs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub floor_id: Vec<String>,

    /// Target label IDs
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub label_id: Vec<String>,
}

impl Target {
    /// Check if target is empty
    pub fn is_empty(&self) -> bool {
        self.entity_id.is_empty()
            && self.device_id.is_empty()
            && self.area_id.is_empty()
            && self.floor_id.is_empty()
            && self.label_id.is_empty()
    }
}

/// Target given inline or rendered from a template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Template(String),
    Fields(Target),
}

/// Service call action
///
/// Accepts the newer `action` key and the legacy `service_template`, and
/// emits `service`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceAction {
    /// Service to call (e.g., "light.turn_on")
    #[serde(alias = "action", alias = "service_template")]
    pub service: String,

    /// Target entities/devices/areas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,

    /// Service data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Legacy templated service data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_template: Option<Value>,

    /// Legacy entity selection outside of `target`
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub entity_id: Vec<String>,

    /// Variable to store response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_variable: Option<String>,
}

/// Delay action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayAction {
    /// Delay duration (can be template)
    pub delay: DurationSpec,
}

/// Wait for template action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitTemplateAction {
    /// Template that must become true
    pub wait_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_timeout: Option<bool>,
}

/// Wait for trigger action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitForTriggerAction {
    /// Triggers to wait for, already validated
    pub wait_for_trigger: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_timeout: Option<bool>,
}

/// Variables action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariablesAction {
    /// Variables to set (name -> value or template)
    pub variables: Map<String, Value>,
}

/// Choose action (if/elseif/else)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChooseAction {
    pub choose: Vec<ChooseOption>,

    /// Sequence run if no option matches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Vec<Value>>,
}

/// A single option in a choose action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChooseOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    pub conditions: Vec<Value>,

    pub sequence: Vec<Value>,
}

/// If/then/else action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IfAction {
    pub r#if: Vec<Value>,

    pub then: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#else: Option<Vec<Value>>,
}

/// Repeat action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatAction {
    pub repeat: RepeatConfig,
}

/// Repeat loop: exactly one of `count`, `for_each`, `while`, `until`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<RepeatCount>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_each: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#while: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<Vec<Value>>,

    pub sequence: Vec<Value>,
}

impl RepeatConfig {
    fn check(&self) -> ValidationResult<()> {
        let loops = [
            self.count.is_some(),
            self.for_each.is_some(),
            self.r#while.is_some(),
            self.until.is_some(),
        ];
        if loops.iter().filter(|set| **set).count() != 1 {
            return Err(ValidationError::action(
                "must contain exactly one of count, for_each, while, until.",
            )
            .in_key("repeat"));
        }
        Ok(())
    }
}

/// Repeat count (can be number or template)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepeatCount {
    Number(u64),
    Template(String),
}

/// Sequence action (explicit sequential execution)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceAction {
    pub sequence: Vec<Value>,
}

/// Parallel action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelAction {
    pub parallel: Vec<Value>,
}

/// Stop action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopAction {
    /// Stop reason
    pub stop: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_variable: Option<String>,

    /// Whether the script ends with an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

/// Event action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventAction {
    /// Event type to fire
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data_template: Option<Map<String, Value>>,
}

/// Scene action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneAction {
    /// Scene entity ID
    pub scene: String,
}

// --- Validation ---

fn is_service_name(service: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z0-9_]+\.[a-z0-9_]+$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(service))
}

/// Validate an action section: an action or a list of actions
pub fn validate_actions_config(
    config: Value,
    context: &ValidationContext,
) -> ValidationResult<Value> {
    ensure_list(config)
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_action(item, context).map_err(|e| e.in_item(index)))
        .collect::<ValidationResult<Vec<_>>>()
        .map(Value::Array)
}

/// Validate and normalize a single action
pub fn validate_action(config: Value, context: &ValidationContext) -> ValidationResult<Value> {
    let Value::Object(mut map) = config else {
        return Err(ValidationError::action("expected a dictionary"));
    };

    let kind = determine_action_kind(&map)
        .ok_or_else(|| ValidationError::action("Unable to determine action"))?;

    let options = split_keys(&mut map, ACTION_OPTION_KEYS);
    let options: ActionOptions = typed(Value::Object(options))?;

    let mut normalized = match kind {
        ActionKind::Service => {
            let action: ServiceAction = typed(Value::Object(map))?;
            check_service(&action.service)?;
            to_object(&action)?
        }
        ActionKind::Delay => normalize::<DelayAction>(map)?,
        ActionKind::WaitTemplate => normalize::<WaitTemplateAction>(map)?,
        ActionKind::WaitForTrigger => {
            nested(&mut map, "wait_for_trigger", |value| {
                validate_trigger_config(value, context)
            })?;
            normalize::<WaitForTriggerAction>(map)?
        }
        ActionKind::Variables => normalize::<VariablesAction>(map)?,
        ActionKind::Choose => {
            let options = map.remove("choose").map(ensure_list).unwrap_or_default();
            let options = options
                .into_iter()
                .enumerate()
                .map(|(index, option)| {
                    validate_choose_option(option, context)
                        .map_err(|e| e.in_item(index).in_key("choose"))
                })
                .collect::<ValidationResult<Vec<_>>>()?;
            map.insert("choose".to_string(), Value::Array(options));
            nested(&mut map, "default", |value| {
                validate_actions_config(value, context)
            })?;
            normalize::<ChooseAction>(map)?
        }
        ActionKind::If => {
            nested(&mut map, "if", |value| conditions(value, context))?;
            nested(&mut map, "then", |value| validate_actions_config(value, context))?;
            nested(&mut map, "else", |value| validate_actions_config(value, context))?;
            normalize::<IfAction>(map)?
        }
        ActionKind::Repeat => {
            let repeat = match map.remove("repeat") {
                Some(Value::Object(mut repeat)) => {
                    nested(&mut repeat, "while", |value| conditions(value, context))
                        .map_err(|e| e.in_key("repeat"))?;
                    nested(&mut repeat, "until", |value| conditions(value, context))
                        .map_err(|e| e.in_key("repeat"))?;
                    nested(&mut repeat, "sequence", |value| {
                        validate_actions_config(value, context)
                    })
                    .map_err(|e| e.in_key("repeat"))?;
                    Value::Object(repeat)
                }
                _ => return Err(ValidationError::action("expected a dictionary").in_key("repeat")),
            };
            map.insert("repeat".to_string(), repeat);
            let action: RepeatAction = typed(Value::Object(map))?;
            action.repeat.check()?;
            to_object(&action)?
        }
        ActionKind::Sequence => {
            nested(&mut map, "sequence", |value| {
                validate_actions_config(value, context)
            })?;
            normalize::<SequenceAction>(map)?
        }
        ActionKind::Parallel => {
            nested(&mut map, "parallel", |value| {
                ensure_list(value)
                    .into_iter()
                    .enumerate()
                    .map(|(index, branch)| {
                        validate_parallel_branch(branch, context).map_err(|e| e.in_item(index))
                    })
                    .collect::<ValidationResult<Vec<_>>>()
                    .map(Value::Array)
            })?;
            normalize::<ParallelAction>(map)?
        }
        ActionKind::Condition => match validate_condition(Value::Object(map), context) {
            Ok(Value::Object(condition)) => condition,
            Ok(_) => Map::new(),
            Err(e) => return Err(e.restage(ValidationStage::Action)),
        },
        ActionKind::Stop => normalize::<StopAction>(map)?,
        ActionKind::Event => normalize::<EventAction>(map)?,
        ActionKind::Scene => normalize::<SceneAction>(map)?,
        ActionKind::Device => {
            if !map.contains_key("domain") {
                return Err(ValidationError::action("required key not provided").in_key("domain"));
            }
            map
        }
    };

    normalized.extend(to_object(&options)?);
    Ok(Value::Object(normalized))
}

fn check_service(service: &str) -> ValidationResult<()> {
    if is_template(service) || is_service_name(service) {
        return Ok(());
    }
    Err(ValidationError::action(format!(
        "Service {} does not match format <domain>.<name>",
        service
    ))
    .in_key("service"))
}

fn validate_choose_option(option: Value, context: &ValidationContext) -> ValidationResult<Value> {
    let Value::Object(mut option) = option else {
        return Err(ValidationError::action("expected a dictionary"));
    };
    nested(&mut option, "conditions", |value| conditions(value, context))?;
    nested(&mut option, "sequence", |value| {
        validate_actions_config(value, context)
    })?;
    let option: ChooseOption = typed(Value::Object(option))?;
    Ok(Value::Object(to_object(&option)?))
}

/// A parallel branch is an action or a bare list run as a sequence
fn validate_parallel_branch(branch: Value, context: &ValidationContext) -> ValidationResult<Value> {
    match branch {
        Value::Array(steps) => {
            let mut sequence = Map::new();
            sequence.insert("sequence".to_string(), Value::Array(steps));
            validate_action(Value::Object(sequence), context)
        }
        other => validate_action(other, context),
    }
}

/// Nested conditions fail the action section
fn conditions(value: Value, context: &ValidationContext) -> ValidationResult<Value> {
    validate_conditions_config(value, context).map_err(|e| e.restage(ValidationStage::Action))
}

/// Validate the value under `key` in place, if present
fn nested<F>(map: &mut Map<String, Value>, key: &str, validate: F) -> ValidationResult<()>
where
    F: FnOnce(Value) -> ValidationResult<Value>,
{
    if let Some(value) = map.remove(key) {
        let value = validate(value).map_err(|e| e.restage(ValidationStage::Action).in_key(key))?;
        map.insert(key.to_string(), value);
    }
    Ok(())
}

fn typed<T: DeserializeOwned>(value: Value) -> ValidationResult<T> {
    serde_json::from_value(value).map_err(|e| ValidationError::action(e.to_string()))
}

fn to_object<T: Serialize>(value: &T) -> ValidationResult<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(ValidationError::action(e.to_string())),
    }
}

/// Round-trip through the typed schema of an action kind
fn normalize<T>(map: Map<String, Value>) -> ValidationResult<Map<String, Value>>
where
    T: DeserializeOwned + Serialize,
{
    let action: T = typed(Value::Object(map))?;
    to_object(&action)
}

/// Default action section validator
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionConfigValidator;

#[async_trait]
impl SectionValidator for ActionConfigValidator {
    fn stage(&self) -> ValidationStage {
        ValidationStage::Action
    }

    async fn validate(
        &self,
        config: Value,
        context: &ValidationContext,
    ) -> ValidationResult<Value> {
        validate_actions_config(config, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(config: Value) -> ValidationResult<Value> {
        validate_actions_config(config, &ValidationContext::new())
    }

    #[test]
    fn test_determine_action_kind() {
        let kind = |v: Value| determine_action_kind(v.as_object().unwrap());

        assert_eq!(kind(json!({"action": "light.turn_on"})), Some(ActionKind::Service));
        assert_eq!(kind(json!({"delay": 5})), Some(ActionKind::Delay));
        assert_eq!(
            kind(json!({"device_id": "abc", "domain": "light"})),
            Some(ActionKind::Device)
        );
        assert_eq!(
            kind(json!({"condition": "state", "entity_id": "x"})),
            Some(ActionKind::Condition)
        );
        assert_eq!(kind(json!({"alias": "nothing"})), None);
    }

    #[test]
    fn test_service_action_normalized() {
        let result = validate(json!({
            "action": "light.turn_on",
            "target": {"entity_id": "light.living_room"},
            "data": {"brightness": 255}
        }))
        .unwrap();

        assert_eq!(
            result,
            json!([{
                "service": "light.turn_on",
                "target": {"entity_id": ["light.living_room"]},
                "data": {"brightness": 255}
            }])
        );
    }

    #[test]
    fn test_service_name_format() {
        let err = validate(json!({"service": "turn_on"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Service turn_on does not match format <domain>.<name> @ data[0]['service']"
        );

        assert!(validate(json!({"service": "{{ 'light.' ~ verb }}"})).is_ok());
    }

    #[test]
    fn test_legacy_template_keys() {
        let result = validate(json!({
            "service_template": "{{ 'light.turn_' ~ state }}",
            "data_template": {"brightness": "{{ level }}"}
        }))
        .unwrap();
        assert_eq!(
            result,
            json!([{
                "service": "{{ 'light.turn_' ~ state }}",
                "data_template": {"brightness": "{{ level }}"}
            }])
        );
        assert_eq!(validate(result.clone()).unwrap(), result);

        let kind = determine_action_kind(
            json!({"service_template": "light.turn_on"}).as_object().unwrap(),
        );
        assert_eq!(kind, Some(ActionKind::Service));
    }

    #[test]
    fn test_target_template() {
        let result = validate(json!({
            "service": "light.turn_on",
            "target": "{{ targets }}"
        }))
        .unwrap();
        assert_eq!(result[0]["target"], "{{ targets }}");
    }

    #[test]
    fn test_delay_action() {
        let result = validate(json!({"delay": {"minutes": 5}, "alias": "pause"})).unwrap();
        assert_eq!(result, json!([{"delay": "00:05:00", "alias": "pause"}]));
    }

    #[test]
    fn test_choose_action() {
        let result = validate(json!({
            "choose": [
                {
                    "conditions": "{{ is_state('light.test', 'on') }}",
                    "sequence": {"service": "light.turn_off"}
                }
            ],
            "default": [{"service": "light.turn_on"}]
        }))
        .unwrap();

        let choose = &result[0]["choose"][0];
        assert_eq!(choose["conditions"][0]["condition"], "template");
        assert_eq!(choose["sequence"], json!([{"service": "light.turn_off"}]));
        assert_eq!(result[0]["default"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_if_action_nested_condition_error() {
        let err = validate(json!({
            "if": [{"condition": "numeric_state", "entity_id": "sensor.t"}],
            "then": [{"service": "light.turn_on"}]
        }))
        .unwrap_err();

        assert_eq!(err.stage, ValidationStage::Action);
        assert_eq!(
            err.to_string(),
            "must contain at least one of below, above. @ data[0]['if'][0]"
        );
    }

    #[test]
    fn test_repeat_count() {
        let result = validate(json!({
            "repeat": {
                "count": 5,
                "sequence": [{"service": "light.toggle"}]
            }
        }))
        .unwrap();
        assert_eq!(result[0]["repeat"]["count"], 5);
    }

    #[test]
    fn test_repeat_requires_one_loop() {
        let err = validate(json!({
            "repeat": {
                "count": 2,
                "until": "{{ true }}",
                "sequence": [{"service": "light.toggle"}]
            }
        }))
        .unwrap_err();
        assert!(err.message.contains("exactly one of"));
    }

    #[test]
    fn test_wait_for_trigger_normalized() {
        let result = validate(json!({
            "wait_for_trigger": {"platform": "state", "entity_id": "binary_sensor.door", "to": "off"},
            "timeout": 30
        }))
        .unwrap();

        assert_eq!(result[0]["wait_for_trigger"][0]["trigger"], "state");
        assert_eq!(result[0]["timeout"], "00:00:30");
    }

    #[test]
    fn test_wait_for_trigger_error_restaged() {
        let err = validate(json!({"wait_for_trigger": {"platform": "teleport"}})).unwrap_err();
        assert_eq!(err.stage, ValidationStage::Action);
        assert_eq!(
            err.to_string(),
            "Invalid trigger 'teleport' specified @ data[0]['wait_for_trigger'][0]"
        );
    }

    #[test]
    fn test_parallel_branches() {
        let result = validate(json!({
            "parallel": [
                {"service": "light.turn_on", "target": {"entity_id": ["light.one"]}},
                [{"delay": 1}, {"service": "light.turn_on"}]
            ]
        }))
        .unwrap();

        assert_eq!(result[0]["parallel"][1]["sequence"][0]["delay"], "00:00:01");
    }

    #[test]
    fn test_condition_action_keeps_options() {
        let result = validate(json!({
            "condition": "state",
            "entity_id": "light.kitchen",
            "state": "on",
            "continue_on_error": true
        }))
        .unwrap();

        assert_eq!(result[0]["entity_id"], json!(["light.kitchen"]));
        assert_eq!(result[0]["continue_on_error"], true);
    }

    #[test]
    fn test_device_action_requires_domain() {
        let err = validate(json!({"device_id": "abc", "type": "turn_on"})).unwrap_err();
        assert_eq!(err.to_string(), "required key not provided @ data[0]['domain']");
    }

    #[test]
    fn test_unknown_action() {
        let err = validate(json!([{"service": "light.turn_on"}, {"alias": "nothing"}])).unwrap_err();
        assert_eq!(err.to_string(), "Unable to determine action @ data[1]");
    }

    #[test]
    fn test_extra_key_rejected() {
        let err = validate(json!({"scene": "scene.movie", "transition": 2})).unwrap_err();
        assert!(err.message.contains("transition"));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = validate(json!([
            {"action": "notify.notify", "data": {"message": "hi"}},
            {"variables": {"level": 3}},
            {"if": "{{ level > 2 }}", "then": {"delay": "00:01"}, "else": []},
            {"stop": "done", "error": false},
            {"event": "custom_event", "event_data": {"a": 1}}
        ]))
        .unwrap();
        let twice = validate(once.clone()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once[2]["then"][0]["delay"], "00:01:00");
    }

    #[tokio::test]
    async fn test_section_validator() {
        let validator = ActionConfigValidator;
        assert_eq!(validator.stage(), ValidationStage::Action);

        let result = validator
            .validate(json!({"service": "x.y"}), &ValidationContext::new())
            .await
            .unwrap();
        assert_eq!(result, json!([{"service": "x.y"}]));
    }
}
