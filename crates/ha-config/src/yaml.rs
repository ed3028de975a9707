//! YAML to JSON conversion
//!
//! Validation works on `serde_json::Value`. YAML documents are converted
//! once tags are resolved; a tag still present at that point is an error.

use serde_json::{Map, Number, Value as JsonValue};
use serde_yaml::Value as YamlValue;

use crate::error::{ConfigError, ConfigResult};

/// Convert a tag-free YAML value to JSON
///
/// Scalar mapping keys are stringified (`1: x` becomes `"1": x`).
pub fn yaml_to_json(value: YamlValue) -> ConfigResult<JsonValue> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => yaml_number(&n)?,
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => JsonValue::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<ConfigResult<Vec<_>>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            JsonValue::Object(map)
        }
        YamlValue::Tagged(tagged) => {
            return Err(ConfigError::UnsupportedTag {
                tag: tagged.tag.to_string(),
            })
        }
    })
}

fn yaml_number(n: &serde_yaml::Number) -> ConfigResult<JsonValue> {
    if let Some(i) = n.as_i64() {
        return Ok(JsonValue::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(JsonValue::from(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: n.to_string(),
            reason: "number cannot be represented in JSON".to_string(),
        })
}

fn mapping_key(key: YamlValue) -> ConfigResult<String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(ConfigError::InvalidValue {
            key: format!("{:?}", other),
            reason: "mapping keys must be scalars".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_nested() {
        let yaml: YamlValue = serde_yaml::from_str(
            "alias: Morning\ntrigger:\n  - platform: time\n    at: '07:00:00'\nmax: 3\nratio: 0.5\n",
        )
        .unwrap();

        assert_eq!(
            yaml_to_json(yaml).unwrap(),
            json!({
                "alias": "Morning",
                "trigger": [{"platform": "time", "at": "07:00:00"}],
                "max": 3,
                "ratio": 0.5
            })
        );
    }

    #[test]
    fn test_scalar_keys_stringified() {
        let yaml: YamlValue = serde_yaml::from_str("1: one\ntrue: yes\n").unwrap();
        let json = yaml_to_json(yaml).unwrap();
        assert_eq!(json["1"], "one");
        assert_eq!(json["true"], "yes");
    }

    #[test]
    fn test_tag_rejected() {
        let yaml: YamlValue = serde_yaml::from_str("entity: !input motion_entity\n").unwrap();
        let err = yaml_to_json(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedTag { ref tag } if tag == "!input"));
    }
}
