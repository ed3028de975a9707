//! Blueprint stores
//!
//! A store resolves `use_blueprint` references of one domain. The default
//! [`DomainBlueprints`] reads `<blueprint_dir>/<path>` on first use and
//! caches the parsed blueprint.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

use crate::blueprint::Blueprint;
use crate::error::{BlueprintError, BlueprintResult};
use crate::inputs::{BlueprintInputs, CONF_USE_BLUEPRINT};

/// Whether a config is an instance of a blueprint
pub fn is_blueprint_instance_config(config: &Value) -> bool {
    config
        .as_object()
        .is_some_and(|map| map.contains_key(CONF_USE_BLUEPRINT))
}

/// Contents of `use_blueprint`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlueprintInstance {
    pub path: String,

    #[serde(default)]
    pub input: Map<String, Value>,
}

impl BlueprintInstance {
    /// Read the `use_blueprint` section of an instance config
    pub fn from_config(config: &Map<String, Value>) -> BlueprintResult<Self> {
        let section = config
            .get(CONF_USE_BLUEPRINT)
            .cloned()
            .ok_or_else(|| BlueprintError::InvalidConfig {
                reason: format!("required key not provided @ data['{}']", CONF_USE_BLUEPRINT),
            })?;
        serde_json::from_value(section).map_err(|e| BlueprintError::InvalidConfig {
            reason: format!("{} @ data['{}']", e, CONF_USE_BLUEPRINT),
        })
    }
}

/// Source of blueprints for instance configs
#[async_trait]
pub trait BlueprintStore: Send + Sync {
    /// Domain the store serves
    fn domain(&self) -> &str;

    /// Fetch the blueprint an instance config references
    async fn fetch_inputs(&self, config: &Map<String, Value>) -> BlueprintResult<BlueprintInputs>;
}

/// Blueprints of one domain
pub struct DomainBlueprints {
    domain: String,
    /// `None` for in-memory stores
    blueprint_dir: Option<PathBuf>,
    /// Parsed blueprints by relative path
    cache: DashMap<String, Arc<Blueprint>>,
}

impl DomainBlueprints {
    /// Store loading from `blueprint_dir`
    pub fn new(domain: impl Into<String>, blueprint_dir: impl Into<PathBuf>) -> Self {
        Self {
            domain: domain.into(),
            blueprint_dir: Some(blueprint_dir.into()),
            cache: DashMap::new(),
        }
    }

    /// Store holding only blueprints added with [`add_blueprint`](Self::add_blueprint)
    pub fn in_memory(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            blueprint_dir: None,
            cache: DashMap::new(),
        }
    }

    pub fn blueprint_dir(&self) -> Option<&Path> {
        self.blueprint_dir.as_deref()
    }

    /// Register a blueprint under a path
    pub fn add_blueprint(&self, path: impl Into<String>, blueprint: Blueprint) -> BlueprintResult<()> {
        if blueprint.domain() != self.domain {
            return Err(BlueprintError::WrongDomain {
                expected: self.domain.clone(),
                found: blueprint.domain().to_string(),
            });
        }
        self.cache.insert(path.into(), Arc::new(blueprint));
        Ok(())
    }

    /// Get a blueprint, loading it on first use
    pub async fn get_blueprint(&self, path: &str) -> BlueprintResult<Arc<Blueprint>> {
        if let Some(blueprint) = self.cache.get(path) {
            return Ok(Arc::clone(blueprint.value()));
        }

        let blueprint = Arc::new(self.load_blueprint(path).await?);
        self.cache.insert(path.to_string(), Arc::clone(&blueprint));
        Ok(blueprint)
    }

    async fn load_blueprint(&self, path: &str) -> BlueprintResult<Blueprint> {
        let not_found = || BlueprintError::NotFound {
            domain: self.domain.clone(),
            path: path.to_string(),
        };
        let dir = self.blueprint_dir.as_ref().ok_or_else(not_found)?;

        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(BlueprintError::InvalidPath {
                path: path.to_string(),
            });
        }

        let file = dir.join(relative);
        debug!("Loading blueprint: {:?}", file);
        let content = match fs::read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(BlueprintError::ReadFile {
                    path: file,
                    source: e,
                })
            }
        };

        let data = serde_yaml::from_str(&content).map_err(|e| BlueprintError::ParseYaml {
            path: file.clone(),
            source: e,
        })?;
        Blueprint::from_yaml(data, Some(path.to_string()), Some(&self.domain))
    }
}

#[async_trait]
impl BlueprintStore for DomainBlueprints {
    fn domain(&self) -> &str {
        &self.domain
    }

    async fn fetch_inputs(&self, config: &Map<String, Value>) -> BlueprintResult<BlueprintInputs> {
        let instance = BlueprintInstance::from_config(config)?;
        let blueprint = self.get_blueprint(&instance.path).await?;
        Ok(BlueprintInputs::new(blueprint, config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const BLUEPRINT: &str = r#"
blueprint:
  name: Toggle on event
  domain: automation
  input:
    event_type:
    target_light:
      default: light.kitchen
trigger:
  trigger: event
  event_type: !input event_type
action:
  action: light.toggle
  target:
    entity_id: !input target_light
"#;

    fn config(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_is_blueprint_instance_config() {
        assert!(is_blueprint_instance_config(&json!({"use_blueprint": {"path": "x"}})));
        assert!(!is_blueprint_instance_config(&json!({"trigger": []})));
        assert!(!is_blueprint_instance_config(&json!("use_blueprint")));
    }

    #[tokio::test]
    async fn test_load_from_directory_is_cached() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("homeassistant")).unwrap();
        std::fs::write(dir.path().join("homeassistant/toggle.yaml"), BLUEPRINT).unwrap();

        let store = DomainBlueprints::new("automation", dir.path());
        let first = store.get_blueprint("homeassistant/toggle.yaml").await.unwrap();
        std::fs::remove_file(dir.path().join("homeassistant/toggle.yaml")).unwrap();
        let second = store.get_blueprint("homeassistant/toggle.yaml").await.unwrap();

        assert_eq!(first.name(), "Toggle on event");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_fetch_inputs() {
        let store = DomainBlueprints::in_memory("automation");
        store
            .add_blueprint("toggle.yaml", Blueprint::parse(BLUEPRINT, None, None).unwrap())
            .unwrap();

        let inputs = store
            .fetch_inputs(&config(json!({
                "use_blueprint": {"path": "toggle.yaml", "input": {"event_type": "doorbell"}}
            })))
            .await
            .unwrap();

        assert_eq!(inputs.blueprint().name(), "Toggle on event");
        assert_eq!(inputs.inputs()["event_type"], "doorbell");
    }

    #[tokio::test]
    async fn test_fetch_missing_blueprint() {
        let dir = TempDir::new().unwrap();
        let store = DomainBlueprints::new("automation", dir.path());

        let err = store
            .fetch_inputs(&config(json!({"use_blueprint": {"path": "nope.yaml"}})))
            .await
            .unwrap_err();
        assert!(matches!(err, BlueprintError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_extra_keys() {
        let store = DomainBlueprints::in_memory("automation");

        let err = store
            .fetch_inputs(&config(json!({"use_blueprint": {"path": "a.yaml", "inputs": {}}})))
            .await
            .unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DomainBlueprints::new("automation", dir.path());

        let err = store.get_blueprint("../secrets.yaml").await.unwrap_err();
        assert!(matches!(err, BlueprintError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_wrong_domain_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("script.yaml"),
            "blueprint:\n  name: A script\n  domain: script\nsequence: []\n",
        )
        .unwrap();
        let store = DomainBlueprints::new("automation", dir.path());

        let err = store.get_blueprint("script.yaml").await.unwrap_err();
        assert!(matches!(err, BlueprintError::WrongDomain { .. }));
    }

    #[test]
    fn test_add_blueprint_checks_domain() {
        let store = DomainBlueprints::in_memory("script");
        let err = store
            .add_blueprint("toggle.yaml", Blueprint::parse(BLUEPRINT, None, None).unwrap())
            .unwrap_err();
        assert!(matches!(err, BlueprintError::WrongDomain { .. }));
    }
}
