//! Trigger validation
//!
//! Triggers are event detectors that initiate automations. This module
//! checks each trigger of a config against its platform schema and emits
//! the normalized form: the platform always sits under the `trigger` key
//! (the legacy `platform` key is renamed), entity lists are always lists
//! and time periods use `HH:MM:SS`.

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::helpers::{ensure_list, explicit_null, one_or_many, split_keys, DurationSpec};
use crate::validation::{
    SectionValidator, ValidationContext, ValidationError, ValidationResult, ValidationStage,
};

/// Key naming the trigger platform
pub const CONF_TRIGGER: &str = "trigger";

/// Legacy key naming the trigger platform
pub const CONF_PLATFORM: &str = "platform";

/// Options every trigger platform accepts
const TRIGGER_OPTION_KEYS: &[&str] = &["id", "alias", "enabled", "variables"];

/// Built-in trigger platforms
pub const TRIGGER_PLATFORMS: &[&str] = &[
    "state",
    "event",
    "time",
    "time_pattern",
    "numeric_state",
    "template",
    "zone",
    "sun",
    "homeassistant",
    "webhook",
];

/// Options shared by all trigger platforms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerOptions {
    /// Optional trigger ID for referencing in conditions/actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Variables defined when this trigger fires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
}

/// Trigger definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when an entity's state changes
    State(StateTrigger),

    /// Fires on any event with optional data matching
    Event(EventTrigger),

    /// Fires at a specific time
    Time(TimeTrigger),

    /// Fires on a time pattern (e.g., every 5 minutes)
    TimePattern(TimePatternTrigger),

    /// Fires when a numeric value crosses a threshold
    NumericState(NumericStateTrigger),

    /// Fires when a template evaluates to true
    Template(TemplateTrigger),

    /// Fires when an entity enters/leaves a zone
    Zone(ZoneTrigger),

    /// Fires at sunrise/sunset
    Sun(SunTrigger),

    /// Fires on Home Assistant start/stop
    Homeassistant(HomeassistantTrigger),

    /// Fires on webhook request
    Webhook(WebhookTrigger),
}

impl Trigger {
    /// Get the trigger platform name
    pub fn platform(&self) -> &'static str {
        match self {
            Trigger::State(_) => "state",
            Trigger::Event(_) => "event",
            Trigger::Time(_) => "time",
            Trigger::TimePattern(_) => "time_pattern",
            Trigger::NumericState(_) => "numeric_state",
            Trigger::Template(_) => "template",
            Trigger::Zone(_) => "zone",
            Trigger::Sun(_) => "sun",
            Trigger::Homeassistant(_) => "homeassistant",
            Trigger::Webhook(_) => "webhook",
        }
    }

    /// Semantic checks serde cannot express
    fn check(&self) -> ValidationResult<()> {
        match self {
            Trigger::State(t) => check_hold_period(t.r#for.as_ref()),
            Trigger::NumericState(t) => {
                if t.above.is_none() && t.below.is_none() {
                    return Err(ValidationError::trigger(
                        "must contain at least one of below, above.",
                    ));
                }
                check_hold_period(t.r#for.as_ref())
            }
            Trigger::Template(t) => check_hold_period(t.r#for.as_ref()),
            Trigger::TimePattern(t) => {
                if t.hours.is_none() && t.minutes.is_none() && t.seconds.is_none() {
                    return Err(ValidationError::trigger(
                        "must contain at least one of hours, minutes, seconds.",
                    ));
                }
                Ok(())
            }
            Trigger::Event(t) if t.event_type.is_empty() => Err(
                ValidationError::trigger("length of value must be at least 1")
                    .in_key("event_type"),
            ),
            _ => Ok(()),
        }
    }
}

fn check_hold_period(period: Option<&DurationSpec>) -> ValidationResult<()> {
    match period {
        Some(p) if p.is_negative() => Err(ValidationError::trigger(
            "Time period must not be negative",
        )
        .in_key("for")),
        _ => Ok(()),
    }
}

/// State change trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateTrigger {
    /// Entity IDs to monitor
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// Previous state to match; `Some(None)` matches state changes only
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_null"
    )]
    pub from: Option<Option<StateMatch>>,

    /// New state to match; `Some(None)` matches state changes only
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_null"
    )]
    pub to: Option<Option<StateMatch>>,

    /// Attribute to monitor instead of state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Duration the state must be held before triggering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#for: Option<DurationSpec>,

    /// Don't trigger if coming from these states
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub not_from: Vec<String>,

    /// Don't trigger if going to these states
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub not_to: Vec<String>,
}

/// Event trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventTrigger {
    /// Event types to match
    #[serde(deserialize_with = "one_or_many")]
    pub event_type: Vec<String>,

    /// Optional event data to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Map<String, Value>>,

    /// Context filters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<EventContextFilter>,
}

/// Time trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeTrigger {
    /// Times to trigger at (HH:MM:SS or input_datetime entity)
    #[serde(deserialize_with = "one_or_many")]
    pub at: Vec<TimeSpec>,
}

/// Time pattern trigger (cron-like)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimePatternTrigger {
    /// Hours pattern (0-23 or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<PatternValue>,

    /// Minutes pattern (0-59 or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<PatternValue>,

    /// Seconds pattern (0-59 or /N)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<PatternValue>,
}

/// Numeric state trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericStateTrigger {
    /// Entity IDs to monitor
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// Attribute to monitor (uses state if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Trigger when value goes above this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<NumericValue>,

    /// Trigger when value goes below this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<NumericValue>,

    /// Duration the value must be held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#for: Option<DurationSpec>,

    /// Template to extract value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

/// Template trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateTrigger {
    /// Template that evaluates to true/false
    pub value_template: String,

    /// Duration the template must be true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#for: Option<DurationSpec>,
}

/// Zone trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneTrigger {
    /// Person/device tracker entities
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// Zone entity
    pub zone: String,

    /// Event type: enter or leave
    pub event: ZoneEvent,
}

/// Sun trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SunTrigger {
    /// sunrise or sunset
    pub event: SunEvent,

    /// Offset from the event (e.g., "-00:30:00" for 30 min before)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<DurationSpec>,
}

/// Home Assistant trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeassistantTrigger {
    /// Event: start or shutdown
    pub event: HassEvent,
}

/// Webhook trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookTrigger {
    /// Webhook ID
    pub webhook_id: String,

    /// Allowed HTTP methods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_methods: Vec<String>,

    /// Whether to use local only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_only: Option<bool>,
}

// --- Supporting types ---

/// State match specification (single value or list)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateMatch {
    Single(String),
    List(Vec<String>),
}

/// Time specification (fixed time or entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Fixed time (HH:MM:SS)
    Fixed(NaiveTime),
    /// Entity ID (input_datetime, sensor, etc.)
    Entity(String),
}

/// Numeric value (literal or entity reference)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Literal(f64),
    Entity(String),
}

/// Time pattern component ("*", "/5" or a number)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternValue {
    Number(u32),
    Pattern(String),
}

/// Event context filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventContextFilter {
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub user_id: Vec<String>,
}

/// Zone event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneEvent {
    Enter,
    Leave,
}

/// Sun event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

/// Home Assistant event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HassEvent {
    Start,
    Shutdown,
}

// --- Validation ---

/// Validate a trigger section: a trigger or a list of triggers
pub fn validate_trigger_config(
    config: Value,
    context: &ValidationContext,
) -> ValidationResult<Value> {
    ensure_list(config)
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_trigger(item, context).map_err(|e| e.in_item(index)))
        .collect::<ValidationResult<Vec<_>>>()
        .map(Value::Array)
}

/// Validate and normalize a single trigger
pub fn validate_trigger(config: Value, context: &ValidationContext) -> ValidationResult<Value> {
    let Value::Object(mut map) = config else {
        return Err(ValidationError::trigger("expected a dictionary"));
    };

    let platform = match (map.remove(CONF_PLATFORM), map.remove(CONF_TRIGGER)) {
        (Some(platform), None) | (None, Some(platform)) => platform,
        (Some(_), Some(_)) => {
            return Err(ValidationError::trigger(
                "Cannot specify both 'platform' and 'trigger'. Please use 'trigger' only.",
            ))
        }
        (None, None) => {
            return Err(ValidationError::trigger("required key not provided").in_key(CONF_TRIGGER))
        }
    };
    let Value::String(platform) = platform else {
        return Err(ValidationError::trigger("expected str").in_key(CONF_TRIGGER));
    };

    let options = split_keys(&mut map, TRIGGER_OPTION_KEYS);
    let options: TriggerOptions = serde_json::from_value(Value::Object(options))
        .map_err(|e| ValidationError::trigger(e.to_string()))?;

    map.insert(CONF_TRIGGER.to_string(), Value::String(platform.clone()));

    let mut normalized = if TRIGGER_PLATFORMS.contains(&platform.as_str()) {
        let trigger: Trigger = serde_json::from_value(Value::Object(map))
            .map_err(|e| ValidationError::trigger(e.to_string()))?;
        trigger.check()?;
        to_object(&trigger)?
    } else if context.has_trigger_platform(&platform) {
        map
    } else {
        return Err(ValidationError::trigger(format!(
            "Invalid trigger '{}' specified",
            platform
        )));
    };

    normalized.extend(to_object(&options)?);
    Ok(Value::Object(normalized))
}

fn to_object<T: Serialize>(value: &T) -> ValidationResult<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(ValidationError::trigger(e.to_string())),
    }
}

/// Default trigger section validator
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerConfigValidator;

#[async_trait]
impl SectionValidator for TriggerConfigValidator {
    fn stage(&self) -> ValidationStage {
        ValidationStage::Trigger
    }

    async fn validate(
        &self,
        config: Value,
        context: &ValidationContext,
    ) -> ValidationResult<Value> {
        validate_trigger_config(config, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(config: Value) -> ValidationResult<Value> {
        validate_trigger_config(config, &ValidationContext::new())
    }

    #[test]
    fn test_state_trigger_legacy_platform_key() {
        let result = validate(json!({
            "platform": "state",
            "entity_id": "light.living_room",
            "to": "on"
        }))
        .unwrap();

        assert_eq!(
            result,
            json!([{
                "trigger": "state",
                "entity_id": ["light.living_room"],
                "to": "on"
            }])
        );
    }

    #[test]
    fn test_event_trigger_deserialize() {
        let result = validate(json!([{
            "trigger": "event",
            "event_type": "mobile_app_notification_action",
            "event_data": {"action": "confirm"}
        }]))
        .unwrap();

        assert_eq!(result[0]["event_type"], json!(["mobile_app_notification_action"]));
        assert_eq!(result[0]["event_data"]["action"], "confirm");
    }

    #[test]
    fn test_time_pattern_trigger() {
        let result = validate(json!({"trigger": "time_pattern", "minutes": "/5"})).unwrap();
        assert_eq!(result[0]["minutes"], "/5");

        let err = validate(json!({"trigger": "time_pattern"})).unwrap_err();
        assert!(err.message.contains("at least one of hours"));
    }

    #[test]
    fn test_trigger_options_kept() {
        let result = validate(json!({
            "trigger": "homeassistant",
            "event": "start",
            "id": "startup",
            "enabled": false,
            "variables": {"source": "boot"}
        }))
        .unwrap();

        assert_eq!(result[0]["id"], "startup");
        assert_eq!(result[0]["enabled"], false);
        assert_eq!(result[0]["variables"]["source"], "boot");
    }

    #[test]
    fn test_for_duration_normalized() {
        let result = validate(json!({
            "trigger": "state",
            "entity_id": ["binary_sensor.motion"],
            "to": "off",
            "for": {"minutes": 2}
        }))
        .unwrap();

        assert_eq!(result[0]["for"], "00:02:00");
    }

    #[test]
    fn test_numeric_state_requires_threshold() {
        let err = validate(json!({
            "trigger": "numeric_state",
            "entity_id": "sensor.temperature"
        }))
        .unwrap_err();

        assert_eq!(err.stage, ValidationStage::Trigger);
        assert_eq!(err.to_string(), "must contain at least one of below, above. @ data[0]");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = validate(json!({
            "trigger": "state",
            "entity_id": "light.test",
            "bogus": 1
        }))
        .unwrap_err();

        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn test_missing_platform() {
        let err = validate(json!([{"entity_id": "light.test"}, {"trigger": "state"}])).unwrap_err();
        assert_eq!(err.to_string(), "required key not provided @ data[0]['trigger']");
    }

    #[test]
    fn test_both_platform_keys_rejected() {
        let err = validate(json!({"trigger": "sun", "platform": "sun", "event": "sunset"}))
            .unwrap_err();
        assert!(err.message.contains("Cannot specify both"));
    }

    #[test]
    fn test_invalid_platform() {
        let err = validate(json!({"trigger": "zwave_js.value_updated"})).unwrap_err();
        assert_eq!(err.message, "Invalid trigger 'zwave_js.value_updated' specified");
    }

    #[test]
    fn test_integration_platform_passthrough() {
        let ctx = ValidationContext::new().with_trigger_platform("mqtt");
        let result = validate_trigger_config(
            json!({"platform": "mqtt", "topic": "home/door", "id": "door"}),
            &ctx,
        )
        .unwrap();

        assert_eq!(
            result,
            json!([{"trigger": "mqtt", "topic": "home/door", "id": "door"}])
        );
    }

    #[test]
    fn test_not_a_mapping() {
        let err = validate(json!(["state"])).unwrap_err();
        assert_eq!(err.to_string(), "expected a dictionary @ data[0]");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = validate(json!([
            {"platform": "sun", "event": "sunset", "offset": "-00:30"},
            {"trigger": "time", "at": "07:30:00"},
            {"trigger": "numeric_state", "entity_id": "sensor.t", "above": 20, "for": 90},
            {"trigger": "state", "entity_id": "sensor.x", "to": null}
        ]))
        .unwrap();
        let twice = validate(once.clone()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once[3].get("to"), Some(&Value::Null));
        assert_eq!(once[0]["offset"], "-00:30:00");
        assert_eq!(once[2]["for"], "00:01:30");
    }

    #[tokio::test]
    async fn test_section_validator() {
        let validator = TriggerConfigValidator;
        assert_eq!(validator.stage(), ValidationStage::Trigger);

        let result = validator
            .validate(
                json!({"platform": "webhook", "webhook_id": "doorbell"}),
                &ValidationContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!([{"trigger": "webhook", "webhook_id": "doorbell"}]));
    }
}
