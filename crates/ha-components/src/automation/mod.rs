//! Automation config validation
//!
//! Turns the `automation` entries of a configuration document into
//! validated automation configs:
//!
//! ```text
//! document ──▶ batch ──▶ (per entry, concurrently) rule validator
//!                          │
//!                          ├─ blueprint resolver   use_blueprint ─▶ concrete config
//!                          ├─ structural schema    keys, defaults, list shapes
//!                          └─ section validators   trigger / condition / action
//! ```
//!
//! An entry that fails validation is kept as a disabled placeholder carrying
//! only its `id`, `alias` and `description`, unless validation runs under
//! [`ValidationPolicy::Strict`], where the failure is returned as an error.

mod batch;
mod blueprint;
mod config;
mod error;
mod schema;
mod validate;

pub use batch::ValidatedConfig;
pub use blueprint::{resolve_blueprint, BlueprintFailure, ResolvedAutomation};
pub use config::AutomationConfig;
pub use error::{AutomationConfigError, AutomationConfigResult};
pub use schema::{validate_minimal_schema, validate_platform_schema, SchemaIssue, SchemaViolation};
pub use validate::{automation_name, AutomationConfigValidator, ValidationPolicy};

/// Domain of the automation integration
pub const DOMAIN: &str = "automation";

pub const CONF_ID: &str = "id";
pub const CONF_ALIAS: &str = "alias";
pub const CONF_DESCRIPTION: &str = "description";
pub const CONF_TRACE: &str = "trace";
pub const CONF_INITIAL_STATE: &str = "initial_state";
pub const CONF_HIDE_ENTITY: &str = "hide_entity";
pub const CONF_VARIABLES: &str = "variables";
pub const CONF_TRIGGER_VARIABLES: &str = "trigger_variables";
pub const CONF_TRIGGER: &str = "trigger";
pub const CONF_CONDITION: &str = "condition";
pub const CONF_ACTION: &str = "action";
pub const CONF_STORED_TRACES: &str = "stored_traces";

/// Traces kept per automation unless configured otherwise
pub const DEFAULT_STORED_TRACES: u64 = 5;
