//! Blueprints
//!
//! Blueprints are reusable automation templates. An automation config with
//! a `use_blueprint` section is an instance of one: the blueprint body with
//! its `!input` placeholders filled in from the instance's inputs.
//!
//! # Key Types
//!
//! - [`Blueprint`] - A parsed blueprint document
//! - [`BlueprintInputs`] - A blueprint paired with one instance config
//! - [`BlueprintStore`] - Resolves `use_blueprint` references
//! - [`DomainBlueprints`] - Directory or in-memory store for one domain

pub mod blueprint;
pub mod error;
pub mod inputs;
pub mod store;

pub use blueprint::{Blueprint, BlueprintMetadata, InputDeclaration, CONF_BLUEPRINT};
pub use error::{BlueprintError, BlueprintResult};
pub use inputs::{BlueprintInputs, CONF_USE_BLUEPRINT};
pub use store::{is_blueprint_instance_config, BlueprintInstance, BlueprintStore, DomainBlueprints};
