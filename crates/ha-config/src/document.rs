//! Per-domain access to a configuration document
//!
//! A domain can be configured under its bare key (`automation:`) or under
//! labelled keys (`automation manual:`, `automation ui:`), which is how
//! packages and split configs merge into one document.

use serde_json::{Map, Value};

/// Key naming an entry's platform
pub const CONF_PLATFORM: &str = "platform";

/// Whether a top-level key belongs to a domain
///
/// Matches `<domain>` and `<domain> <label>`.
pub fn is_domain_key(key: &str, domain: &str) -> bool {
    match key.strip_prefix(domain) {
        Some("") => true,
        Some(rest) => rest.len() > 1 && rest.starts_with(' '),
        None => false,
    }
}

/// Keys of the document that belong to a domain, in document order
pub fn extract_domain_configs<'a>(config: &'a Map<String, Value>, domain: &'a str) -> Vec<&'a str> {
    config
        .keys()
        .filter(|key| is_domain_key(key, domain))
        .map(String::as_str)
        .collect()
}

/// Every entry configured for a domain, with its `platform` if it names one
///
/// A list contributes each element, a single value contributes itself, and
/// null or empty values contribute nothing.
pub fn config_per_platform(config: &Map<String, Value>, domain: &str) -> Vec<(Option<String>, Value)> {
    extract_domain_configs(config, domain)
        .into_iter()
        .filter_map(|key| config.get(key))
        .flat_map(|value| match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .map(|item| {
            let platform = item
                .get(CONF_PLATFORM)
                .and_then(Value::as_str)
                .map(str::to_string);
            (platform, item)
        })
        .collect()
}

/// Copy of the document with every key of a domain removed
pub fn config_without_domain(config: &Map<String, Value>, domain: &str) -> Map<String, Value> {
    config
        .iter()
        .filter(|(key, _)| !is_domain_key(key, domain))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Map<String, Value> {
        json!({
            "homeassistant": {"name": "Home"},
            "automation": [{"alias": "a"}, {"alias": "b"}],
            "automation manual": {"alias": "c", "platform": "legacy"},
            "automation empty": null,
            "automations": [{"alias": "not mine"}],
            "automation_extra": {"alias": "nor this"}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_domain_key_matching() {
        assert!(is_domain_key("automation", "automation"));
        assert!(is_domain_key("automation ui", "automation"));
        assert!(!is_domain_key("automation ", "automation"));
        assert!(!is_domain_key("automations", "automation"));
        assert!(!is_domain_key("script", "automation"));
    }

    #[test]
    fn test_config_per_platform() {
        let entries = config_per_platform(&document(), "automation");
        let aliases: Vec<_> = entries.iter().map(|(_, c)| c["alias"].clone()).collect();

        assert_eq!(aliases, vec![json!("a"), json!("b"), json!("c")]);
        assert_eq!(entries[2].0.as_deref(), Some("legacy"));
        assert_eq!(entries[0].0, None);
    }

    #[test]
    fn test_config_without_domain() {
        let rest = config_without_domain(&document(), "automation");
        let keys: Vec<_> = rest.keys().cloned().collect();

        assert!(keys.contains(&"homeassistant".to_string()));
        assert!(keys.contains(&"automations".to_string()));
        assert!(keys.contains(&"automation_extra".to_string()));
        assert_eq!(keys.len(), 3);
    }
}
