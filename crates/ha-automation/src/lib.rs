//! Automation section validation
//!
//! This crate validates and normalizes the trigger and condition sections
//! of an automation config. Action sequences are validated by ha-script
//! against the same [`SectionValidator`] seam.
//!
//! # Architecture
//!
//! ```text
//! AUTOMATION = TRIGGER → CONDITIONS → ACTIONS
//! ```
//!
//! - **Triggers**: Event detectors that initiate the automation
//! - **Conditions**: State-based tests evaluated at trigger time
//! - **Actions**: Sequence of tasks to execute (validated by ha-script)
//!
//! # Key Types
//!
//! - [`Trigger`] - Typed trigger platform config
//! - [`Condition`] - Typed condition config
//! - [`SectionValidator`] - Async validator for one section of a config
//! - [`ValidationError`] - Failure shared by all section validators

pub mod condition;
pub mod helpers;
pub mod trigger;
pub mod validation;

pub use condition::{validate_condition, validate_conditions_config, Condition, ConditionConfigValidator};
pub use trigger::{validate_trigger_config, Trigger, TriggerConfigValidator};
pub use validation::{
    format_path, PathSegment, SectionValidator, ValidationContext, ValidationError,
    ValidationResult, ValidationStage,
};
