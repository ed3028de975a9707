//! Shared config helpers
//!
//! Coercions used by trigger, condition and action schemas.

use chrono::Duration;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Wrap a single value in a list, flatten null to an empty list
pub fn ensure_list(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Whether a string contains template syntax
pub fn is_template(value: &str) -> bool {
    value.contains("{{") || value.contains("{%") || value.contains("{#")
}

/// Move the given keys out of a mapping into a new one
pub fn split_keys(map: &mut Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut taken = Map::new();
    for key in keys {
        if let Some(value) = map.remove(*key) {
            taken.insert((*key).to_string(), value);
        }
    }
    taken
}

/// Deserialize an optional field, telling an explicit `null` from a missing key
///
/// Use with `#[serde(default)]`: a missing key stays `None`, `null` becomes
/// `Some(None)`.
pub fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Deserialize a field that can be either a single value or a list
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(v) => Ok(v),
        OneOrMany::One(v) => Ok(vec![v]),
    }
}

/// A time period: fixed or rendered from a template at run time
///
/// Accepts `HH:MM:SS[.fff]`, `HH:MM`, seconds, or a mapping of
/// `days`/`hours`/`minutes`/`seconds`/`milliseconds`. Fixed periods
/// normalize to `[-]HH:MM:SS[.fff]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationSpec {
    Fixed(Duration),
    Template(String),
}

impl DurationSpec {
    pub fn is_negative(&self) -> bool {
        matches!(self, DurationSpec::Fixed(d) if *d < Duration::zero())
    }

    /// Parse from a raw config value
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) if is_template(s) => Ok(DurationSpec::Template(s.clone())),
            Value::String(s) => parse_clock(s).map(DurationSpec::Fixed),
            Value::Number(n) => n
                .as_f64()
                .and_then(|secs| millis(secs * 1000.0))
                .map(DurationSpec::Fixed)
                .ok_or_else(|| format!("invalid time period: {}", n)),
            Value::Object(map) => parse_components(map).map(DurationSpec::Fixed),
            other => Err(format!("expected a time period, got {}", other)),
        }
    }

    fn render(&self) -> String {
        match self {
            DurationSpec::Template(t) => t.clone(),
            DurationSpec::Fixed(d) => {
                let sign = if *d < Duration::zero() { "-" } else { "" };
                let total_ms = d.num_milliseconds().abs();
                let secs = total_ms / 1000;
                let ms = total_ms % 1000;
                let clock = format!(
                    "{}{:02}:{:02}:{:02}",
                    sign,
                    secs / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                );
                if ms == 0 {
                    clock
                } else {
                    format!("{}.{:03}", clock, ms)
                }
            }
        }
    }
}

/// `None` when out of range
fn millis(ms: f64) -> Option<Duration> {
    let ms = ms.round();
    if !ms.is_finite() || ms.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(ms as i64)
}

fn parse_clock(s: &str) -> Result<Duration, String> {
    let invalid = || format!("offset {} should be format 'HH:MM', 'HH:MM:SS' or 'HH:MM:SS.F'", s);
    let (negative, body) = match s.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.trim().strip_prefix('+').unwrap_or(s.trim())),
    };

    let parts: Vec<&str> = body.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [secs] => ("0", "0", *secs),
        [hours, mins] => (*hours, *mins, "0"),
        [hours, mins, secs] => (*hours, *mins, *secs),
        _ => return Err(invalid()),
    };

    let hours: f64 = hours.parse().map_err(|_| invalid())?;
    let minutes: f64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
    let total = millis((hours * 3600.0 + minutes * 60.0 + seconds) * 1000.0)
        .ok_or_else(|| format!("invalid time period: {}", s))?;

    Ok(if negative { -total } else { total })
}

fn parse_components(map: &Map<String, Value>) -> Result<Duration, String> {
    const UNITS: [(&str, f64); 5] = [
        ("days", 86_400_000.0),
        ("hours", 3_600_000.0),
        ("minutes", 60_000.0),
        ("seconds", 1000.0),
        ("milliseconds", 1.0),
    ];

    if map.is_empty() {
        return Err("time period must not be empty".to_string());
    }

    let mut total_ms = 0.0;
    for (key, value) in map {
        let factor = UNITS
            .iter()
            .find(|(unit, _)| unit == key)
            .map(|(_, factor)| *factor)
            .ok_or_else(|| format!("extra keys not allowed in time period: {}", key))?;
        let amount = value
            .as_f64()
            .ok_or_else(|| format!("expected a number for '{}'", key))?;
        total_ms += amount * factor;
    }
    millis(total_ms).ok_or_else(|| "invalid time period: out of range".to_string())
}

impl Serialize for DurationSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for DurationSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        DurationSpec::from_value(&value).map_err(de::Error::custom)
    }
}
