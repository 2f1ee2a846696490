//! Financial action configuration
//!
//! An [`ActionConfig`] names one configured run of an action variant over a
//! record pool. The variant is selected through [`ActionType::lookup`], a
//! static table keyed by the configured `action_type` string.

use crate::types::{FilterRef, FinesError};
use serde::Deserialize;

/// The closed set of action variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Pay,
    Refund,
    Transfer,
    Waive,
    Block,
    RemoveBlock,
}

/// `action_type` spellings accepted in configuration (compared case-insensitively)
const ACTION_TABLE: &[(&str, ActionType)] = &[
    ("PayFineAction", ActionType::Pay),
    ("Pay", ActionType::Pay),
    ("RefundFineAction", ActionType::Refund),
    ("Refund", ActionType::Refund),
    ("TransferFineAction", ActionType::Transfer),
    ("Transfer", ActionType::Transfer),
    ("WaiveFineAction", ActionType::Waive),
    ("Waive", ActionType::Waive),
    ("BlockPatronAction", ActionType::Block),
    ("Block", ActionType::Block),
    ("RemoveBlockPatronAction", ActionType::RemoveBlock),
    ("RemoveBlock", ActionType::RemoveBlock),
];

impl ActionType {
    /// Resolve a configured `action_type`
    ///
    /// # Errors
    ///
    /// Returns `UnknownActionType` when the name is not in the table.
    pub fn lookup(action_type: &str, action: &str) -> Result<Self, FinesError> {
        ACTION_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(action_type.trim()))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| FinesError::unknown_action_type(action_type, action))
    }

    /// Backend verb for the balance-bearing variants (`pay`, `refund`, ...)
    pub fn verb(&self) -> &'static str {
        match self {
            ActionType::Pay => "pay",
            ActionType::Refund => "refund",
            ActionType::Transfer => "transfer",
            ActionType::Waive => "waive",
            ActionType::Block => "block",
            ActionType::RemoveBlock => "remove-block",
        }
    }
}

/// Which record pool an action consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ActionOn {
    #[default]
    #[serde(alias = "charges", alias = "Charges", alias = "CHARGE", alias = "charge")]
    #[serde(rename = "CHARGES")]
    Charges,
    #[serde(alias = "credits", alias = "Credits", alias = "CREDIT", alias = "credit")]
    #[serde(rename = "CREDITS")]
    Credits,
}

fn default_true() -> bool {
    true
}

/// One configured action
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionConfig {
    /// Unique per run; key of the output set and of each record's outcome
    pub name: String,
    /// Variant name, resolved through the dispatch table
    pub action_type: String,
    #[serde(default)]
    pub action_on: ActionOn,
    /// Combined with the run's transactions-active flag
    #[serde(default = "default_true")]
    pub process_active: bool,

    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub service_point_id: String,
    #[serde(default)]
    pub payment_method: String,

    /// Applied to the pool before the action runs
    #[serde(default)]
    pub filters: Vec<FilterRef>,
    /// Remove this action's output from the pool seen by later actions
    #[serde(default)]
    pub stop_processing: bool,

    // Block metadata
    #[serde(default)]
    pub staff_note: String,
    #[serde(default)]
    pub user_note: String,
    pub description: Option<String>,
    #[serde(default)]
    pub block_borrowing: bool,
    #[serde(default)]
    pub block_renewals: bool,
    #[serde(default)]
    pub block_requests: bool,
}
