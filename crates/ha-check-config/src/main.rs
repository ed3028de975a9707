//! Home Assistant config check
//!
//! Validates the automations of a configuration file and prints the
//! resulting configuration.
//!
//! ```text
//! ha-check-config <configuration.yaml> [blueprint_dir]
//! ```
//!
//! Blueprints are looked up in `<config dir>/blueprints/automation` unless a
//! directory is given. Exits with an error if any automation was disabled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ha_blueprint::DomainBlueprints;
use ha_components::automation::DOMAIN;
use ha_components::AutomationConfigValidator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next().map(PathBuf::from) else {
        bail!("usage: ha-check-config <configuration.yaml> [blueprint_dir]");
    };
    let blueprint_dir = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => default_blueprint_dir(&config_path),
    };

    info!("Checking {}", config_path.display());
    let document = ha_config::load_document(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let blueprints = DomainBlueprints::new(DOMAIN, blueprint_dir);
    let validator = AutomationConfigValidator::new(Arc::new(blueprints));
    let validated = validator.validate_document(&document).await;

    let total = validated.automations.len();
    let failed: Vec<String> = validated
        .failed()
        .map(|automation| {
            automation
                .alias()
                .or(automation.id())
                .unwrap_or("unnamed")
                .to_string()
        })
        .collect();

    let output = serde_json::to_string_pretty(&validated.into_document())?;
    println!("{}", output);

    if !failed.is_empty() {
        for name in &failed {
            warn!("Disabled automation: {}", name);
        }
        bail!("{} of {} automations failed validation", failed.len(), total);
    }

    info!("All {} automations are valid", total);
    Ok(())
}

/// `<config dir>/blueprints/automation`
fn default_blueprint_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("blueprints")
        .join(DOMAIN)
}
