//! Script actions
//!
//! Scripts are sequences of actions that can be triggered by automations,
//! called as services, or executed directly. This crate validates action
//! sequences and the run mode fields scripts share with automations.
//!
//! # Action Types
//!
//! - Service calls
//! - Delays
//! - Wait for trigger / template
//! - Conditionals (choose, if/then/else)
//! - Loops (repeat)
//! - Variables
//! - Parallel/sequential execution
//!
//! # Key Types
//!
//! - [`ActionConfigValidator`] - Action section validator
//! - [`ScriptModeConfig`] - Run mode fields with defaults

pub mod action;
pub mod script;

pub use action::{
    determine_action_kind, validate_action, validate_actions_config, ActionConfigValidator,
    ActionKind, Target,
};
pub use script::{
    validate_script_mode, MaxExceeded, ScriptMode, ScriptModeConfig, ScriptModeError,
};
