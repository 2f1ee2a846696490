//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `record`: the record wrapper and the action outcomes attached to it
//! - `rule`: filter, merge and update rule configuration
//! - `action`: financial action configuration and the variant table
//! - `stats`: filter tallies and money summaries
//! - `error`: error types for the fines engine

pub mod action;
pub mod error;
pub mod record;
pub mod rule;
pub mod stats;

pub use action::{ActionConfig, ActionOn, ActionType};
pub use error::{FinesError, Result};
pub use record::{ActionOutcome, CheckResult, ProcessResult, Record, NOT_PROCESSED};
pub use rule::{
    ApiMode, FieldTransform, FilterOperator, FilterRef, MergeRule, RuleConfig, UpdateKind,
    UpdateRule,
};
pub use stats::{decimal_json, decimal_value, DataSummary, FilterStats, OwnerStats, RuleTally, Summary};
