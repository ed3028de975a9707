//! Condition validation
//!
//! Conditions are state-based tests evaluated at trigger time. A condition
//! section is a list of conditions; a bare template string is shorthand for
//! a template condition. Logical conditions (`and`, `or`, `not`) nest
//! further conditions, which are validated recursively.

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::helpers::{ensure_list, is_template, one_or_many, split_keys, DurationSpec};
use crate::trigger::NumericValue;
use crate::validation::{
    SectionValidator, ValidationContext, ValidationError, ValidationResult, ValidationStage,
};

/// Key naming the condition type
pub const CONF_CONDITION: &str = "condition";

/// Key holding nested conditions of logical conditions
pub const CONF_CONDITIONS: &str = "conditions";

/// Options every condition accepts
const CONDITION_OPTION_KEYS: &[&str] = &["alias", "enabled"];

/// Built-in condition types
pub const CONDITION_TYPES: &[&str] = &[
    "state",
    "numeric_state",
    "time",
    "sun",
    "zone",
    "template",
    "trigger",
    "and",
    "or",
    "not",
];

/// Options shared by all conditions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Condition definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Check entity state
    State(StateCondition),

    /// Check numeric value thresholds
    NumericState(NumericStateCondition),

    /// Check current time
    Time(TimeCondition),

    /// Check sun position
    Sun(SunCondition),

    /// Check zone membership
    Zone(ZoneCondition),

    /// Evaluate a template
    Template(TemplateCondition),

    /// Check which trigger fired
    Trigger(TriggerCondition),

    /// All conditions must be true (AND)
    And(LogicalCondition),

    /// Any condition must be true (OR)
    Or(LogicalCondition),

    /// No condition may be true (NOT)
    Not(LogicalCondition),
}

impl Condition {
    /// Semantic checks serde cannot express
    fn check(&self) -> ValidationResult<()> {
        match self {
            Condition::NumericState(c) if c.above.is_none() && c.below.is_none() => Err(
                ValidationError::condition("must contain at least one of below, above."),
            ),
            Condition::Time(c) if c.after.is_none() && c.before.is_none() && c.weekday.is_empty() => {
                Err(ValidationError::condition(
                    "must contain at least one of before, after, weekday.",
                ))
            }
            Condition::Sun(c) if c.after.is_none() && c.before.is_none() => Err(
                ValidationError::condition("must contain at least one of before, after."),
            ),
            Condition::State(c) if c.r#for.as_ref().is_some_and(DurationSpec::is_negative) => {
                Err(ValidationError::condition("Time period must not be negative").in_key("for"))
            }
            _ => Ok(()),
        }
    }
}

/// State condition - check entity state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateCondition {
    /// Entity IDs to check
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// States to match
    #[serde(deserialize_with = "one_or_many")]
    pub state: Vec<String>,

    /// Attribute to check instead of state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Duration the state must have been held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#for: Option<DurationSpec>,

    /// Whether all or any of the entities must match
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<MatchMode>,
}

/// Numeric state condition - check numeric thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericStateCondition {
    /// Entity IDs to check
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// Attribute to check (uses state if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Value must be above this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<NumericValue>,

    /// Value must be below this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<NumericValue>,

    /// Template to extract value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

/// Time condition - check current time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeCondition {
    /// Must be after this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<TimeSpec>,

    /// Must be before this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<TimeSpec>,

    /// Only on these weekdays
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub weekday: Vec<WeekdaySpec>,
}

/// Sun condition - check sun position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SunCondition {
    /// Must be after sunrise/sunset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<SunPosition>,

    /// Offset after the after position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_offset: Option<DurationSpec>,

    /// Must be before sunrise/sunset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<SunPosition>,

    /// Offset before the before position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_offset: Option<DurationSpec>,
}

/// Zone condition - check entity location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneCondition {
    /// Entities to check (person or device_tracker)
    #[serde(deserialize_with = "one_or_many")]
    pub entity_id: Vec<String>,

    /// Zone entities
    #[serde(deserialize_with = "one_or_many")]
    pub zone: Vec<String>,
}

/// Template condition - evaluate template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateCondition {
    /// Template that must evaluate to true
    pub value_template: String,
}

/// Trigger condition - check which trigger fired
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerCondition {
    /// Trigger IDs to match
    #[serde(deserialize_with = "one_or_many")]
    pub id: Vec<String>,
}

/// AND/OR/NOT condition
///
/// Nested conditions are stored in their already validated form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicalCondition {
    pub conditions: Vec<Value>,
}

// --- Supporting types ---

/// Time specification for conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    /// Fixed time (HH:MM:SS)
    Fixed(NaiveTime),
    /// Entity ID (input_datetime)
    Entity(String),
}

/// Weekday specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekdaySpec {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

/// Sun position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunPosition {
    Sunrise,
    Sunset,
}

/// Entity match mode for multi-entity state conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    All,
    Any,
}

// --- Validation ---

/// Validate a condition section: a condition or a list of conditions
pub fn validate_conditions_config(
    config: Value,
    context: &ValidationContext,
) -> ValidationResult<Value> {
    ensure_list(config)
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_condition(item, context).map_err(|e| e.in_item(index)))
        .collect::<ValidationResult<Vec<_>>>()
        .map(Value::Array)
}

/// Validate and normalize a single condition
pub fn validate_condition(config: Value, context: &ValidationContext) -> ValidationResult<Value> {
    let mut map = match config {
        Value::Object(map) => map,
        Value::String(template) if is_template(&template) => {
            let mut map = Map::new();
            map.insert(CONF_CONDITION.to_string(), Value::from("template"));
            map.insert("value_template".to_string(), Value::String(template));
            map
        }
        Value::String(_) => return Err(ValidationError::condition("Expected a template")),
        _ => return Err(ValidationError::condition("expected a dictionary")),
    };

    let kind = match map.get(CONF_CONDITION) {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(ValidationError::condition("expected str").in_key(CONF_CONDITION)),
        None => {
            return Err(
                ValidationError::condition("required key not provided").in_key(CONF_CONDITION)
            )
        }
    };

    let options = split_keys(&mut map, CONDITION_OPTION_KEYS);
    let options: ConditionOptions = serde_json::from_value(Value::Object(options))
        .map_err(|e| ValidationError::condition(e.to_string()))?;

    let mut normalized = if CONDITION_TYPES.contains(&kind.as_str()) {
        if matches!(kind.as_str(), "and" | "or" | "not") {
            let nested = map.remove(CONF_CONDITIONS).ok_or_else(|| {
                ValidationError::condition("required key not provided").in_key(CONF_CONDITIONS)
            })?;
            let nested = validate_conditions_config(nested, context)
                .map_err(|e| e.in_key(CONF_CONDITIONS))?;
            map.insert(CONF_CONDITIONS.to_string(), nested);
        }

        let condition: Condition = serde_json::from_value(Value::Object(map))
            .map_err(|e| ValidationError::condition(e.to_string()))?;
        condition.check()?;
        match serde_json::to_value(&condition) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(ValidationError::condition(e.to_string())),
        }
    } else if kind == "device" {
        for key in ["device_id", "domain"] {
            if !map.contains_key(key) {
                return Err(ValidationError::condition("required key not provided").in_key(key));
            }
        }
        map
    } else if context.has_condition_platform(&kind) {
        map
    } else {
        return Err(ValidationError::condition(format!(
            "Invalid condition \"{}\" specified",
            kind
        )));
    };

    if let Ok(Value::Object(options)) = serde_json::to_value(&options) {
        normalized.extend(options);
    }
    Ok(Value::Object(normalized))
}

/// Default condition section validator
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionConfigValidator;

#[async_trait]
impl SectionValidator for ConditionConfigValidator {
    fn stage(&self) -> ValidationStage {
        ValidationStage::Condition
    }

    async fn validate(
        &self,
        config: Value,
        context: &ValidationContext,
    ) -> ValidationResult<Value> {
        validate_conditions_config(config, context)
    }
}
