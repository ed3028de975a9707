//! Batch validation of a configuration document

use futures::future::join_all;
use ha_config::{config_per_platform, config_without_domain};
use serde_json::{Map, Value};
use tracing::debug;

use super::config::AutomationConfig;
use super::validate::AutomationConfigValidator;
use super::DOMAIN;

/// Configuration document after automation validation
#[derive(Debug, Clone, Default)]
pub struct ValidatedConfig {
    /// Document without any `automation` keys
    pub config: Map<String, Value>,
    /// Validated automations in document order, disabled ones included
    pub automations: Vec<AutomationConfig>,
}

impl ValidatedConfig {
    /// Automations that may be set up
    pub fn runnable(&self) -> impl Iterator<Item = &AutomationConfig> {
        self.automations.iter().filter(|a| a.is_runnable())
    }

    /// Automations disabled by validation
    pub fn failed(&self) -> impl Iterator<Item = &AutomationConfig> {
        self.automations.iter().filter(|a| a.validation_failed())
    }

    /// Document with the validated automations under a single `automation` key
    ///
    /// Disabled automations appear with only `id`, `alias` and `description`.
    pub fn into_document(self) -> Map<String, Value> {
        let mut document = self.config;
        document.insert(
            DOMAIN.to_string(),
            Value::Array(
                self.automations
                    .iter()
                    .map(AutomationConfig::to_document_value)
                    .collect(),
            ),
        );
        document
    }
}

impl AutomationConfigValidator {
    /// Validate every automation of a configuration document
    ///
    /// Entries come from `automation` and `automation <label>` keys and are
    /// validated concurrently with the lenient policy. Entries that cannot
    /// even be kept as placeholders are dropped.
    pub async fn validate_document(&self, document: &Map<String, Value>) -> ValidatedConfig {
        let entries = config_per_platform(document, DOMAIN);
        debug!("Validating {} automation configs", entries.len());

        let results = join_all(
            entries
                .into_iter()
                .map(|(_, entry)| self.validate_lenient(entry)),
        )
        .await;

        ValidatedConfig {
            config: config_without_domain(document, DOMAIN),
            automations: results.into_iter().flatten().collect(),
        }
    }
}
