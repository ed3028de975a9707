//! Blueprint model
//!
//! A blueprint is a YAML document with a `blueprint` metadata section and a
//! body in which `!input name` tags mark the places filled in by each
//! instance.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{BlueprintError, BlueprintResult};

/// Key of the metadata section
pub const CONF_BLUEPRINT: &str = "blueprint";

/// YAML tag marking an input reference
pub const INPUT_TAG: &str = "!input";

/// Metadata section of a blueprint
#[derive(Debug, Clone, Deserialize)]
pub struct BlueprintMetadata {
    pub name: String,

    /// Domain instances of this blueprint belong to (e.g. "automation")
    pub domain: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub source_url: Option<String>,

    /// Input declarations, possibly grouped in sections
    #[serde(default)]
    pub input: Option<Mapping>,
}

/// A declared blueprint input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputDeclaration {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Value used when an instance leaves the input out
    pub default: Option<Value>,
    /// Section the input is declared in, if any
    pub section: Option<String>,
}

impl InputDeclaration {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A parsed blueprint
#[derive(Debug, Clone)]
pub struct Blueprint {
    metadata: BlueprintMetadata,
    inputs: IndexMap<String, InputDeclaration>,
    /// Full document, `!input` tags intact
    data: Mapping,
    path: Option<String>,
}

impl Blueprint {
    /// Parse a blueprint document
    ///
    /// When `expected_domain` is given the blueprint must belong to it.
    pub fn from_yaml(
        data: Value,
        path: Option<String>,
        expected_domain: Option<&str>,
    ) -> BlueprintResult<Self> {
        let display = path.clone().unwrap_or_else(|| "<unknown>".to_string());
        let invalid = |reason: String| BlueprintError::InvalidBlueprint {
            name: display.clone(),
            reason,
        };

        let Value::Mapping(data) = data else {
            return Err(invalid("expected a dictionary".to_string()));
        };
        let metadata = data
            .get(CONF_BLUEPRINT)
            .cloned()
            .ok_or_else(|| invalid("required key not provided @ data['blueprint']".to_string()))?;
        let metadata: BlueprintMetadata =
            serde_yaml::from_value(metadata).map_err(|e| invalid(e.to_string()))?;

        if let Some(expected) = expected_domain {
            if metadata.domain != expected {
                return Err(BlueprintError::WrongDomain {
                    expected: expected.to_string(),
                    found: metadata.domain,
                });
            }
        }

        let inputs = match &metadata.input {
            Some(input) => collect_inputs(input, None).map_err(|reason| {
                BlueprintError::InvalidBlueprint {
                    name: metadata.name.clone(),
                    reason,
                }
            })?,
            None => IndexMap::new(),
        };

        let mut referenced = BTreeSet::new();
        for (key, value) in &data {
            if key.as_str() != Some(CONF_BLUEPRINT) {
                extract_inputs(value, &mut referenced);
            }
        }
        let missing: Vec<_> = referenced
            .into_iter()
            .filter(|name| !inputs.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(BlueprintError::InvalidBlueprint {
                name: metadata.name.clone(),
                reason: format!("Missing input definition for {}", missing.join(", ")),
            });
        }

        Ok(Self {
            metadata,
            inputs,
            data,
            path,
        })
    }

    /// Parse a blueprint from YAML text
    pub fn parse(
        content: &str,
        path: Option<String>,
        expected_domain: Option<&str>,
    ) -> BlueprintResult<Self> {
        let data: Value =
            serde_yaml::from_str(content).map_err(|e| BlueprintError::ParseYaml {
                path: path.clone().unwrap_or_default().into(),
                source: e,
            })?;
        Self::from_yaml(data, path, expected_domain)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn domain(&self) -> &str {
        &self.metadata.domain
    }

    pub fn metadata(&self) -> &BlueprintMetadata {
        &self.metadata
    }

    /// Declared inputs, flattened out of their sections
    pub fn inputs(&self) -> &IndexMap<String, InputDeclaration> {
        &self.inputs
    }

    /// Document including the metadata section
    pub fn data(&self) -> &Mapping {
        &self.data
    }

    /// Path relative to the domain's blueprint directory
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Flatten input declarations; an entry holding `input` is a section
fn collect_inputs(
    declared: &Mapping,
    section: Option<&str>,
) -> Result<IndexMap<String, InputDeclaration>, String> {
    let mut inputs = IndexMap::new();

    for (key, value) in declared {
        let key = key
            .as_str()
            .ok_or_else(|| format!("input keys must be strings, got {:?}", key))?;
        let entry = match value {
            Value::Null => None,
            Value::Mapping(entry) => Some(entry),
            _ => return Err(format!("expected a dictionary @ data['input']['{}']", key)),
        };
        let text = |field: &str| {
            entry
                .and_then(|e| e.get(field))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        if let Some(Value::Mapping(nested)) = entry.and_then(|e| e.get("input")) {
            if section.is_some() {
                return Err(format!("sections cannot be nested @ data['input']['{}']", key));
            }
            for (name, declaration) in collect_inputs(nested, Some(key))? {
                if inputs.insert(name.clone(), declaration).is_some() {
                    return Err(format!("Duplicate use of input key {} in blueprint", name));
                }
            }
            continue;
        }

        let declaration = InputDeclaration {
            name: text("name"),
            description: text("description"),
            default: entry.and_then(|e| e.get("default")).cloned(),
            section: section.map(str::to_string),
        };
        if inputs.insert(key.to_string(), declaration).is_some() {
            return Err(format!("Duplicate use of input key {} in blueprint", key));
        }
    }

    Ok(inputs)
}

/// Names of every `!input` reference in a value
pub fn extract_inputs(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Tagged(tagged) if tagged.tag == INPUT_TAG => {
            if let Value::String(name) = &tagged.value {
                found.insert(name.clone());
            }
        }
        Value::Tagged(tagged) => extract_inputs(&tagged.value, found),
        Value::Sequence(items) => items.iter().for_each(|item| extract_inputs(item, found)),
        Value::Mapping(map) => map.values().for_each(|item| extract_inputs(item, found)),
        _ => {}
    }
}
