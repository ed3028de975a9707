//! Home Assistant built-in components
//!
//! Currently provides config validation for the `automation` integration.

pub mod automation;

pub use automation::{
    AutomationConfig, AutomationConfigError, AutomationConfigResult, AutomationConfigValidator,
    ValidatedConfig, ValidationPolicy,
};
