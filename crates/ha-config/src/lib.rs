//! Configuration documents for Home Assistant
//!
//! This crate loads `configuration.yaml` into a JSON document and gives
//! per-domain access to it. Home Assistant's custom tags are resolved
//! while loading:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_list dir` - Include all YAML files in a directory as a list
//! - `!include_dir_merge_list dir` - Merge lists from all YAML files
//! - `!include_dir_named dir` - Include all YAML files as a mapping
//! - `!include_dir_merge_named dir` - Merge mappings from all YAML files
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{config_per_platform, load_document};
//!
//! let config = load_document("/config/configuration.yaml")?;
//! for (_, automation) in config_per_platform(&config, "automation") {
//!     println!("{}", automation);
//! }
//! ```

mod document;
mod error;
mod loader;
mod yaml;

pub use document::{
    config_per_platform, config_without_domain, extract_domain_configs, is_domain_key,
    CONF_PLATFORM,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_document, DocumentLoader};
pub use yaml::yaml_to_json;
