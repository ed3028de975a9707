//! Structural schema of an automation config
//!
//! Checks the top-level keys and the shape of each section, applies
//! defaults and puts the keys in canonical order. Section contents are left
//! to the trigger, condition and action validators.

use std::fmt;

use ha_automation::helpers::ensure_list;
use ha_automation::{format_path, PathSegment};
use ha_script::script::{CONF_MAX, CONF_MAX_EXCEEDED, CONF_MODE};
use ha_script::validate_script_mode;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use super::{
    CONF_ACTION, CONF_ALIAS, CONF_CONDITION, CONF_DESCRIPTION, CONF_HIDE_ENTITY, CONF_ID,
    CONF_INITIAL_STATE, CONF_STORED_TRACES, CONF_TRACE, CONF_TRIGGER, CONF_TRIGGER_VARIABLES,
    CONF_VARIABLES, DEFAULT_STORED_TRACES,
};

/// Top-level keys in canonical order
const PLATFORM_KEYS: [&str; 14] = [
    CONF_ID,
    CONF_ALIAS,
    CONF_DESCRIPTION,
    CONF_TRACE,
    CONF_INITIAL_STATE,
    CONF_HIDE_ENTITY,
    CONF_MODE,
    CONF_MAX,
    CONF_MAX_EXCEEDED,
    CONF_VARIABLES,
    CONF_TRIGGER_VARIABLES,
    CONF_TRIGGER,
    CONF_CONDITION,
    CONF_ACTION,
];

/// One schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIssue {
    pub message: String,
    /// Location of the offending value, outermost first
    pub path: Vec<PathSegment>,
    /// Offending value, `None` when a required key is missing
    pub got: Option<Value>,
}

impl SchemaIssue {
    fn new(message: impl Into<String>, got: Option<&Value>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            got: got.cloned(),
        }
    }

    fn at(mut self, segment: PathSegment) -> Self {
        self.path.insert(0, segment);
        self
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}. Got ", self.message, format_path(&self.path))?;
        match &self.got {
            Some(Value::String(s)) => write!(f, "'{}'", s),
            Some(value) => write!(f, "{}", value),
            None => f.write_str("None"),
        }
    }
}

/// Every violation found in a config
#[derive(Debug, Clone, PartialEq, Error)]
pub struct SchemaViolation {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaViolation {
    /// Whether a violation is reported at `data[key]`
    pub fn has_issue_at(&self, key: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue.path.first(), Some(PathSegment::Key(k)) if k == key))
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        lines.sort();
        f.write_str(&lines.join("\n"))
    }
}

type Check = fn(&Value) -> Result<Value, Vec<SchemaIssue>>;

/// Collects validated keys and violations for one mapping
struct Schema<'a> {
    config: &'a Map<String, Value>,
    validated: IndexMap<String, Value>,
    issues: Vec<SchemaIssue>,
}

impl<'a> Schema<'a> {
    fn new(value: &'a Value) -> Result<Self, SchemaViolation> {
        match value {
            Value::Object(config) => Ok(Self {
                config,
                validated: IndexMap::new(),
                issues: Vec::new(),
            }),
            other => Err(SchemaViolation {
                issues: vec![SchemaIssue::new("expected a dictionary", Some(other))],
            }),
        }
    }

    fn apply(&mut self, key: &str, value: &Value, check: Check) {
        match check(value) {
            Ok(value) => {
                self.validated.insert(key.to_string(), value);
            }
            Err(issues) => {
                for mut issue in issues {
                    if issue.path.is_empty() {
                        issue.message.push_str(" for dictionary value");
                    }
                    self.issues.push(issue.at(PathSegment::Key(key.to_string())));
                }
            }
        }
    }

    fn optional(&mut self, key: &str, check: Check) {
        if let Some(value) = self.config.get(key) {
            self.apply(key, value, check);
        }
    }

    fn with_default(&mut self, key: &str, default: Value, check: Check) {
        let value = self.config.get(key).cloned().unwrap_or(default);
        self.apply(key, &value, check);
    }

    fn required(&mut self, key: &str, check: Check) {
        match self.config.get(key) {
            Some(value) => self.apply(key, value, check),
            None => self.issues.push(
                SchemaIssue::new("required key not provided", None)
                    .at(PathSegment::Key(key.to_string())),
            ),
        }
    }

    fn script_mode(&mut self) {
        match validate_script_mode(self.config) {
            Ok(mode) => {
                self.validated.insert(CONF_MODE.to_string(), json!(mode.mode.as_str()));
                self.validated.insert(CONF_MAX.to_string(), json!(mode.max));
                self.validated
                    .insert(CONF_MAX_EXCEEDED.to_string(), json!(mode.max_exceeded.as_str()));
            }
            Err(errors) => {
                for error in errors {
                    self.issues.push(
                        SchemaIssue::new(
                            format!("{} for dictionary value", error.message),
                            self.config.get(error.key),
                        )
                        .at(PathSegment::Key(error.key.to_string())),
                    );
                }
            }
        }
    }

    fn reject_extra_keys(&mut self, allowed: &[&str]) {
        for (key, value) in self.config {
            if !allowed.contains(&key.as_str()) {
                self.issues.push(
                    SchemaIssue::new("extra keys not allowed", Some(value))
                        .at(PathSegment::Key(key.clone())),
                );
            }
        }
    }

    fn finish(self) -> Result<IndexMap<String, Value>, SchemaViolation> {
        if self.issues.is_empty() {
            Ok(self.validated)
        } else {
            Err(SchemaViolation {
                issues: self.issues,
            })
        }
    }
}

/// Validate the top-level structure of a resolved automation config
///
/// Returns the config with defaults applied and keys in canonical order.
/// Every violation is reported, not only the first.
pub fn validate_platform_schema(value: &Value) -> Result<IndexMap<String, Value>, SchemaViolation> {
    if value.get(CONF_HIDE_ENTITY).is_some() {
        warn!(
            "The '{}' option is deprecated, please remove it from your configuration",
            CONF_HIDE_ENTITY
        );
    }

    let mut schema = Schema::new(value)?;
    schema.optional(CONF_ID, exact_string);
    schema.optional(CONF_ALIAS, string);
    schema.optional(CONF_DESCRIPTION, string);
    schema.with_default(CONF_TRACE, json!({}), trace);
    schema.optional(CONF_INITIAL_STATE, boolean);
    schema.optional(CONF_HIDE_ENTITY, boolean);
    schema.script_mode();
    schema.optional(CONF_VARIABLES, mapping);
    schema.optional(CONF_TRIGGER_VARIABLES, mapping);
    schema.required(CONF_TRIGGER, list_of_mappings);
    schema.optional(CONF_CONDITION, conditions);
    schema.required(CONF_ACTION, list_of_mappings);
    schema.reject_extra_keys(&PLATFORM_KEYS);
    schema.finish()
}

/// Salvage `id`, `alias` and `description` from a config that failed validation
///
/// Other keys are ignored. Fails only when the input is not a mapping or one
/// of the three keys has an unusable value.
pub fn validate_minimal_schema(value: &Value) -> Result<IndexMap<String, Value>, SchemaViolation> {
    let mut schema = Schema::new(value)?;
    schema.optional(CONF_ID, exact_string);
    schema.optional(CONF_ALIAS, string);
    schema.optional(CONF_DESCRIPTION, string);
    schema.finish()
}

fn invalid(message: impl Into<String>, got: &Value) -> Vec<SchemaIssue> {
    vec![SchemaIssue::new(message, Some(got))]
}

fn exact_string(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    match value {
        Value::String(_) => Ok(value.clone()),
        other => Err(invalid("expected str", other)),
    }
}

/// String with scalar coercion
fn string(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(true) => Ok(Value::String("True".to_string())),
        Value::Bool(false) => Ok(Value::String("False".to_string())),
        Value::Null => Err(invalid("string value is None", value)),
        other => Err(invalid("value should be a string", other)),
    }
}

fn boolean(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => match s.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" | "enable" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" | "disable" => Ok(Value::Bool(false)),
            _ => Err(invalid(format!("invalid boolean value {}", s), value)),
        },
        other => Err(invalid(format!("invalid boolean value {}", other), other)),
    }
}

fn mapping(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        other => Err(invalid("expected a dictionary", other)),
    }
}

fn trace(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    let Value::Object(trace) = value else {
        return Err(invalid("expected a dictionary", value));
    };

    let mut issues = Vec::new();
    let mut stored_traces = DEFAULT_STORED_TRACES;
    for (key, value) in trace {
        if key != CONF_STORED_TRACES {
            issues.push(
                SchemaIssue::new("extra keys not allowed", Some(value))
                    .at(PathSegment::Key(key.clone())),
            );
            continue;
        }
        let issue = match coerce_int(value) {
            Some(n) if n >= 0 => {
                stored_traces = n as u64;
                continue;
            }
            Some(_) => "value must be at least 0 for dictionary value",
            None => "expected int for dictionary value",
        };
        issues.push(SchemaIssue::new(issue, Some(value)).at(PathSegment::Key(key.clone())));
    }

    if issues.is_empty() {
        Ok(json!({ CONF_STORED_TRACES: stored_traces }))
    } else {
        Err(issues)
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn list_of_mappings(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    list_of(value, |item| item.is_object())
}

/// Conditions may use the template string shorthand
fn conditions(value: &Value) -> Result<Value, Vec<SchemaIssue>> {
    list_of(value, |item| item.is_object() || item.is_string())
}

fn list_of(value: &Value, accept: fn(&Value) -> bool) -> Result<Value, Vec<SchemaIssue>> {
    let items = ensure_list(value.clone());
    let issues: Vec<_> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !accept(item))
        .map(|(index, item)| {
            SchemaIssue::new("expected a dictionary", Some(item)).at(PathSegment::Index(index))
        })
        .collect();

    if issues.is_empty() {
        Ok(Value::Array(items))
    } else {
        Err(issues)
    }
}
