//! Configuration document loader
//!
//! Reads `configuration.yaml` and resolves the tags Home Assistant configs
//! use to split themselves across files:
//! - `!include path` - Include another YAML file
//! - `!include_dir_list dir` - One list entry per YAML file in a directory
//! - `!include_dir_merge_list dir` - Concatenate the lists of all YAML files
//! - `!include_dir_named dir` - Mapping keyed by file name
//! - `!include_dir_merge_named dir` - Merge the mappings of all YAML files
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! The resolved document is handed out as JSON.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};
use crate::yaml::yaml_to_json;

const SECRETS_FILE: &str = "secrets.yaml";

/// How a directory include combines its files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirInclude {
    List,
    MergeList,
    Named,
    MergeNamed,
}

/// Loads configuration documents relative to a config directory
pub struct DocumentLoader {
    config_dir: PathBuf,
    /// Loaded on first `!secret`
    secrets: Option<HashMap<String, Value>>,
    /// Files currently being loaded, to detect include cycles
    include_stack: Vec<PathBuf>,
}

impl DocumentLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets: None,
            include_stack: Vec::new(),
        }
    }

    /// Get the config directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load a document whose top level must be a mapping
    ///
    /// An empty file is an empty document.
    pub fn load_document(&mut self, path: impl AsRef<Path>) -> ConfigResult<Map<String, JsonValue>> {
        match yaml_to_json(self.load_file(path.as_ref())?)? {
            JsonValue::Object(map) => Ok(map),
            JsonValue::Null => Ok(Map::new()),
            other => Err(ConfigError::InvalidDocument {
                reason: format!("expected a mapping at the top level, got {}", other),
            }),
        }
    }

    /// Load a YAML file with every tag resolved
    pub fn load_file(&mut self, path: &Path) -> ConfigResult<Value> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        };
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.push(path.clone());
        let result = self.load_str(&content, &path);
        self.include_stack.pop();
        result
    }

    /// Parse YAML text that came from `source`
    pub fn load_str(&mut self, content: &str, source: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.resolve(value, source)
    }

    fn resolve(&mut self, value: Value, source: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.resolve_tag(*tagged, source),
            Value::Mapping(map) => {
                let mut resolved = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key, self.resolve(value, source)?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.resolve(item, source))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn resolve_tag(&mut self, tagged: TaggedValue, source: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Resolving tag '{}' with value {:?}", tag, tagged.value);

        match tag.as_str() {
            "!include" => {
                let path = include_path(&tagged.value, source)?;
                if !path.is_file() {
                    return Err(ConfigError::IncludeNotFound { path });
                }
                self.load_file(&path)
            }
            "!include_dir_list" => self.include_dir(&tagged.value, source, DirInclude::List),
            "!include_dir_merge_list" => {
                self.include_dir(&tagged.value, source, DirInclude::MergeList)
            }
            "!include_dir_named" => self.include_dir(&tagged.value, source, DirInclude::Named),
            "!include_dir_merge_named" => {
                self.include_dir(&tagged.value, source, DirInclude::MergeNamed)
            }
            "!secret" => self.secret(&tagged.value),
            "!env_var" => env_var(&tagged.value),
            _ => Err(ConfigError::UnsupportedTag { tag }),
        }
    }

    fn include_dir(&mut self, value: &Value, source: &Path, kind: DirInclude) -> ConfigResult<Value> {
        let dir = include_path(value, source)?;
        debug!("Including directory {:?} as {:?}", dir, kind);

        let mut list = Vec::new();
        let mut named = Mapping::new();
        for file in yaml_files(&dir)? {
            let content = self.load_file(&file)?;
            match (kind, content) {
                (DirInclude::List, content) => list.push(content),
                (DirInclude::MergeList, Value::Sequence(items)) => list.extend(items),
                (DirInclude::MergeList, Value::Null) => {}
                (DirInclude::MergeList, other) => list.push(other),
                (DirInclude::Named, content) => {
                    let name = file
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    named.insert(Value::String(name), content);
                }
                (DirInclude::MergeNamed, Value::Mapping(map)) => named.extend(map),
                (DirInclude::MergeNamed, _) => {}
            }
        }

        Ok(match kind {
            DirInclude::List | DirInclude::MergeList => Value::Sequence(list),
            DirInclude::Named | DirInclude::MergeNamed => Value::Mapping(named),
        })
    }

    fn secret(&mut self, value: &Value) -> ConfigResult<Value> {
        let Value::String(key) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!secret".to_string(),
                reason: "secret key must be a string".to_string(),
            });
        };

        if self.secrets.is_none() {
            self.secrets = Some(load_secrets(&self.config_dir)?);
        }
        self.secrets
            .as_ref()
            .and_then(|secrets| secrets.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::SecretNotFound { key: key.clone() })
    }
}

fn load_secrets(config_dir: &Path) -> ConfigResult<HashMap<String, Value>> {
    let path = config_dir.join(SECRETS_FILE);
    if !path.exists() {
        debug!("No secrets.yaml found at {:?}", path);
        return Ok(HashMap::new());
    }

    let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
        path: path.clone(),
        source: e,
    })?;
    let secrets: Option<HashMap<String, Value>> =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
            path: path.clone(),
            source: e,
        })?;
    let secrets = secrets.unwrap_or_default();

    debug!("Loaded {} secrets from {:?}", secrets.len(), path);
    Ok(secrets)
}

/// `!env_var NAME` or `!env_var NAME default`
fn env_var(value: &Value) -> ConfigResult<Value> {
    let Value::String(spec) = value else {
        return Err(ConfigError::InvalidValue {
            key: "!env_var".to_string(),
            reason: "environment variable name must be a string".to_string(),
        });
    };

    let mut parts = spec.splitn(2, ' ');
    let name = parts.next().unwrap_or_default();
    match (std::env::var(name), parts.next()) {
        (Ok(value), _) => Ok(Value::String(value)),
        (Err(_), Some(default)) => Ok(Value::String(default.to_string())),
        (Err(_), None) => Err(ConfigError::InvalidValue {
            key: "!env_var".to_string(),
            reason: format!("environment variable '{}' not set", name),
        }),
    }
}

/// Resolve an include argument relative to the including file
fn include_path(value: &Value, source: &Path) -> ConfigResult<PathBuf> {
    let Value::String(path) = value else {
        return Err(ConfigError::InvalidIncludePath {
            path: format!("{:?}", value),
            reason: "path must be a string".to_string(),
        });
    };

    let path = Path::new(path);
    Ok(match source.parent() {
        Some(base) if !path.is_absolute() => base.join(path),
        _ => path.to_path_buf(),
    })
}

/// All YAML files in a directory, sorted by name
fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::IncludeNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ConfigError::ReadFile {
            path: dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Load a configuration document from a file
///
/// Relative includes and `secrets.yaml` resolve against the file's directory.
pub fn load_document(path: impl AsRef<Path>) -> ConfigResult<Map<String, JsonValue>> {
    let path = path.as_ref();
    let config_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    DocumentLoader::new(config_dir).load_document(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_simple_document() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "configuration.yaml",
            "homeassistant:\n  name: Home\nautomation:\n  - alias: Lights\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        assert_eq!(doc["automation"][0]["alias"], "Lights");
    }

    #[test]
    fn test_include_automations_file() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "automations.yaml",
            "- id: '1'\n  alias: Morning\n- id: '2'\n  alias: Evening\n",
        );
        write_file(
            dir.path(),
            "configuration.yaml",
            "automation: !include automations.yaml\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        assert_eq!(doc["automation"].as_array().unwrap().len(), 2);
        assert_eq!(doc["automation"][0]["id"], "1");
    }

    #[test]
    fn test_include_dir_merge_list() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "automations/a.yaml",
            "- alias: Automation 1\n- alias: Automation 2\n",
        );
        write_file(dir.path(), "automations/b.yaml", "- alias: Automation 3\n");
        write_file(
            dir.path(),
            "configuration.yaml",
            "automation: !include_dir_merge_list automations\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        let aliases: Vec<_> = doc["automation"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["alias"].clone())
            .collect();
        assert_eq!(
            aliases,
            vec![json!("Automation 1"), json!("Automation 2"), json!("Automation 3")]
        );
    }

    #[test]
    fn test_include_dir_named() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "scripts/wake.yaml", "alias: Wake\n");
        write_file(dir.path(), "scripts/sleep.yaml", "alias: Sleep\n");
        write_file(
            dir.path(),
            "configuration.yaml",
            "script: !include_dir_named scripts\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        assert_eq!(doc["script"]["wake"]["alias"], "Wake");
        assert_eq!(doc["script"]["sleep"]["alias"], "Sleep");
    }

    #[test]
    fn test_secret() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "secrets.yaml", "webhook: abc123\n");
        write_file(
            dir.path(),
            "configuration.yaml",
            "automation:\n  trigger:\n    platform: webhook\n    webhook_id: !secret webhook\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        assert_eq!(doc["automation"]["trigger"]["webhook_id"], "abc123");
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "configuration.yaml", "password: !secret nonexistent\n");

        let result = load_document(dir.path().join("configuration.yaml"));
        assert!(matches!(result, Err(ConfigError::SecretNotFound { .. })));
    }

    #[test]
    fn test_env_var_default() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "configuration.yaml",
            "name: !env_var HA_CONFIG_TEST_UNSET_VAR fallback\n",
        );

        let doc = load_document(dir.path().join("configuration.yaml")).unwrap();
        assert_eq!(doc["name"], "fallback");
    }

    #[test]
    fn test_circular_include_detection() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.yaml", "include_b: !include b.yaml\n");
        write_file(dir.path(), "b.yaml", "include_a: !include a.yaml\n");

        let result = load_document(dir.path().join("a.yaml"));
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "configuration.yaml", "entity: !input motion\n");

        let result = load_document(dir.path().join("configuration.yaml"));
        assert!(matches!(result, Err(ConfigError::UnsupportedTag { ref tag }) if tag == "!input"));
    }

    #[test]
    fn test_top_level_must_be_mapping() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "configuration.yaml", "- just\n- a list\n");

        let result = load_document(dir.path().join("configuration.yaml"));
        assert!(matches!(result, Err(ConfigError::InvalidDocument { .. })));
    }
}
