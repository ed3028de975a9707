//! Script run mode
//!
//! Scripts and automations share the fields controlling what happens when a
//! new run starts while a previous one is still going: `mode`, `max` and
//! `max_exceeded`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CONF_MODE: &str = "mode";
pub const CONF_MAX: &str = "max";
pub const CONF_MAX_EXCEEDED: &str = "max_exceeded";

/// Default number of concurrent or queued runs
pub const DEFAULT_MAX: u64 = 10;

/// Script execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScriptMode {
    /// Default - ignore new calls while running
    #[default]
    Single,

    /// Restart from beginning on new call
    Restart,

    /// Queue calls (up to max)
    Queued,

    /// Run all simultaneously (up to max)
    Parallel,
}

impl ScriptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptMode::Single => "single",
            ScriptMode::Restart => "restart",
            ScriptMode::Queued => "queued",
            ScriptMode::Parallel => "parallel",
        }
    }
}

impl FromStr for ScriptMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(ScriptMode::Single),
            "restart" => Ok(ScriptMode::Restart),
            "queued" => Ok(ScriptMode::Queued),
            "parallel" => Ok(ScriptMode::Parallel),
            _ => Err(()),
        }
    }
}

/// Log level used when a run is dropped because `max` was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaxExceeded {
    /// Drop silently
    Silent,
    Critical,
    Fatal,
    Error,
    #[default]
    Warning,
    Warn,
    Info,
    Debug,
    Notset,
}

impl MaxExceeded {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaxExceeded::Silent => "SILENT",
            MaxExceeded::Critical => "CRITICAL",
            MaxExceeded::Fatal => "FATAL",
            MaxExceeded::Error => "ERROR",
            MaxExceeded::Warning => "WARNING",
            MaxExceeded::Warn => "WARN",
            MaxExceeded::Info => "INFO",
            MaxExceeded::Debug => "DEBUG",
            MaxExceeded::Notset => "NOTSET",
        }
    }
}

impl fmt::Display for MaxExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaxExceeded {
    type Err = ();

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SILENT" => Ok(MaxExceeded::Silent),
            "CRITICAL" => Ok(MaxExceeded::Critical),
            "FATAL" => Ok(MaxExceeded::Fatal),
            "ERROR" => Ok(MaxExceeded::Error),
            "WARNING" => Ok(MaxExceeded::Warning),
            "WARN" => Ok(MaxExceeded::Warn),
            "INFO" => Ok(MaxExceeded::Info),
            "DEBUG" => Ok(MaxExceeded::Debug),
            "NOTSET" => Ok(MaxExceeded::Notset),
            _ => Err(()),
        }
    }
}

/// Run mode fields with defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptModeConfig {
    pub mode: ScriptMode,
    pub max: u64,
    pub max_exceeded: MaxExceeded,
}

impl Default for ScriptModeConfig {
    fn default() -> Self {
        Self {
            mode: ScriptMode::default(),
            max: DEFAULT_MAX,
            max_exceeded: MaxExceeded::default(),
        }
    }
}

/// Invalid run mode field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} for dictionary value @ data['{key}']")]
pub struct ScriptModeError {
    pub key: &'static str,
    pub message: String,
}

impl ScriptModeError {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

/// Validate the run mode fields of a script or automation config
///
/// Missing fields take their defaults. Every invalid field is reported.
pub fn validate_script_mode(
    config: &Map<String, Value>,
) -> Result<ScriptModeConfig, Vec<ScriptModeError>> {
    let mut result = ScriptModeConfig::default();
    let mut errors = Vec::new();

    match config
        .get(CONF_MODE)
        .map(|v| v.as_str().and_then(|s| s.parse::<ScriptMode>().ok()))
    {
        None => {}
        Some(Some(mode)) => result.mode = mode,
        Some(None) => errors.push(ScriptModeError::new(
            CONF_MODE,
            "value must be one of ['parallel', 'queued', 'restart', 'single']",
        )),
    }

    match config.get(CONF_MAX).map(coerce_int) {
        None => {}
        Some(Some(max)) if max >= 2 => result.max = max as u64,
        Some(Some(_)) => errors.push(ScriptModeError::new(CONF_MAX, "value must be at least 2")),
        Some(None) => errors.push(ScriptModeError::new(CONF_MAX, "expected int")),
    }

    match config
        .get(CONF_MAX_EXCEEDED)
        .map(|v| v.as_str().and_then(|s| s.parse::<MaxExceeded>().ok()))
    {
        None => {}
        Some(Some(level)) => result.max_exceeded = level,
        Some(None) => errors.push(ScriptModeError::new(
            CONF_MAX_EXCEEDED,
            "value must be one of ['CRITICAL', 'DEBUG', 'ERROR', 'FATAL', 'INFO', 'NOTSET', 'SILENT', 'WARN', 'WARNING']",
        )),
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(errors)
    }
}

/// Integer coercion: integral numbers and numeric strings
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(config: Value) -> Result<ScriptModeConfig, Vec<ScriptModeError>> {
        validate_script_mode(config.as_object().unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = check(json!({})).unwrap();
        assert_eq!(config, ScriptModeConfig::default());
        assert_eq!(config.max, 10);
        assert_eq!(config.max_exceeded, MaxExceeded::Warning);
    }

    #[test]
    fn test_script_modes() {
        let config = check(json!({"mode": "queued", "max": "3"})).unwrap();
        assert_eq!(config.mode, ScriptMode::Queued);
        assert_eq!(config.max, 3);

        let config = check(json!({"mode": "parallel"})).unwrap();
        assert_eq!(config.mode, ScriptMode::Parallel);
    }

    #[test]
    fn test_max_exceeded_case_insensitive() {
        let config = check(json!({"max_exceeded": "silent"})).unwrap();
        assert_eq!(config.max_exceeded, MaxExceeded::Silent);
        assert_eq!(serde_json::to_value(config.max_exceeded).unwrap(), json!("SILENT"));
    }

    #[test]
    fn test_all_errors_reported() {
        let errors = check(json!({"mode": "sometimes", "max": 1, "max_exceeded": "loud"}))
            .unwrap_err();

        let keys: Vec<_> = errors.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["mode", "max", "max_exceeded"]);
        assert_eq!(
            errors[1].to_string(),
            "value must be at least 2 for dictionary value @ data['max']"
        );
    }

    #[test]
    fn test_max_must_be_integer() {
        let errors = check(json!({"max": "many"})).unwrap_err();
        assert_eq!(errors[0].message, "expected int");
    }
}
