//! Record types
//!
//! A [`Record`] is one charge or credit flowing through the pipeline. Domain
//! fields live in an arbitrary JSON object; everything the engine itself
//! attaches (the filter's error code, each action's check/process results) is
//! held in typed side channels so that an action name can never collide with a
//! real data field. [`Record::to_json`] merges both views back together for
//! export.

use crate::core::path;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Marker status recorded when an action's mutation was deliberately skipped
pub const NOT_PROCESSED: &str = "NOT PROCESSED";

/// Verdict of an action's `check` phase
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// Whether the record may enter `execute`
    pub allowed: bool,
    /// Backend response (or a locally synthesized one)
    pub response: Value,
}

impl CheckResult {
    /// A verdict produced without calling the backend
    pub fn local(allowed: bool, message: &str) -> Self {
        CheckResult {
            allowed,
            response: json!({ "allowed": allowed, "message": message }),
        }
    }

    /// Wrap a backend response, reading its `allowed` flag
    ///
    /// A response without a boolean `allowed` field counts as a rejection.
    pub fn from_response(response: Value) -> Self {
        let allowed = response
            .get("allowed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        CheckResult { allowed, response }
    }
}

/// Result of an action's `execute` phase
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// The mutating call was made
    Processed {
        /// Human-readable summary
        message: String,
        /// Backend response body
        response: Value,
    },
    /// The activation flag was off: nothing was sent, the intended call is kept
    /// for audit
    NotProcessed {
        /// Human-readable summary
        message: String,
        /// Path that would have been called
        url: String,
        /// Body that would have been sent
        body: Value,
    },
}

impl ProcessResult {
    /// Render as the JSON marker handed to exporters
    pub fn to_json(&self) -> Value {
        match self {
            ProcessResult::Processed { message, response } => json!({
                "status": "PROCESSED",
                "message": message,
                "response": response,
            }),
            ProcessResult::NotProcessed { message, url, body } => json!({
                "status": NOT_PROCESSED,
                "message": message,
                "url": url,
                "body": body,
            }),
        }
    }
}

/// Everything one named action attached to one record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionOutcome {
    pub check: Option<CheckResult>,
    pub process: Option<ProcessResult>,
    /// Manual blocks removed (or that would have been removed) for this record
    pub deleted: Vec<Value>,
}

impl ActionOutcome {
    /// True when `check` ran and allowed the record
    pub fn allowed(&self) -> bool {
        self.check.as_ref().is_some_and(|check| check.allowed)
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(check) = &self.check {
            out.insert("check".to_string(), check.response.clone());
        }
        if let Some(process) = &self.process {
            out.insert("process".to_string(), process.to_json());
        }
        if !self.deleted.is_empty() {
            out.insert("delete".to_string(), Value::Array(self.deleted.clone()));
        }
        Value::Object(out)
    }
}

/// One charge or credit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    data: Map<String, Value>,
    outcomes: BTreeMap<String, ActionOutcome>,
    error_code: Option<String>,
}

impl Record {
    /// Wrap a JSON object
    pub fn new(data: Map<String, Value>) -> Self {
        Record {
            data,
            outcomes: BTreeMap::new(),
            error_code: None,
        }
    }

    /// Wrap a JSON value, returning `None` if it is not an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Record::new(map)),
            _ => None,
        }
    }

    /// Domain fields
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The record's `id` field, when it is a string
    pub fn id(&self) -> Option<&str> {
        self.data.get("id").and_then(Value::as_str)
    }

    /// Resolve a dot path against the domain fields
    pub fn get(&self, field: &str) -> Option<&Value> {
        path::get(&self.data, field)
    }

    /// Write a dot path into the domain fields
    pub fn set(&mut self, field: &str, value: Value) {
        path::set(&mut self.data, field, value);
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn set_error_code(&mut self, code: impl Into<String>) {
        self.error_code = Some(code.into());
    }

    /// Outcome recorded under an action name, if any
    pub fn outcome(&self, action: &str) -> Option<&ActionOutcome> {
        self.outcomes.get(action)
    }

    /// Outcome slot for an action name, created on first use
    pub fn outcome_mut(&mut self, action: &str) -> &mut ActionOutcome {
        self.outcomes.entry(action.to_string()).or_default()
    }

    pub fn outcomes(&self) -> &BTreeMap<String, ActionOutcome> {
        &self.outcomes
    }

    /// Copy every action outcome from `other` onto this record
    pub fn absorb_outcomes(&mut self, other: &Record) {
        for (name, outcome) in &other.outcomes {
            self.outcomes.insert(name.clone(), outcome.clone());
        }
    }

    /// Whether `other` is the same backend entity
    ///
    /// Records are matched on `id` when both carry one, otherwise on their
    /// domain fields.
    pub fn same_record(&self, other: &Record) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => self.data == other.data,
        }
    }

    /// Flatten into a single JSON object for export
    ///
    /// Outcomes are written under their action names and the error code under
    /// `errorCode`, on top of the domain fields.
    pub fn to_json(&self) -> Value {
        let mut out = self.data.clone();
        for (name, outcome) in &self.outcomes {
            out.insert(name.clone(), outcome.to_json());
        }
        if let Some(code) = &self.error_code {
            out.insert("errorCode".to_string(), Value::String(code.clone()));
        }
        Value::Object(out)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("id")).is_none());
    }

    #[test]
    fn test_outcomes_do_not_touch_domain_fields() {
        let mut r = record(json!({"id": "1", "pay": "a real field"}));
        r.outcome_mut("pay").check = Some(CheckResult::local(true, "ok"));

        assert_eq!(r.get("pay"), Some(&json!("a real field")));
        assert!(r.outcome("pay").unwrap().allowed());
    }

    #[test]
    fn test_to_json_merges_side_channels() {
        let mut r = record(json!({"id": "2", "status": "Closed"}));
        r.set_error_code("not open");
        r.outcome_mut("transfer").process = Some(ProcessResult::NotProcessed {
            message: "transfer NOT PROCESSED".to_string(),
            url: "/accounts/2/transfer".to_string(),
            body: json!({"amount": 5}),
        });

        let exported = r.to_json();
        assert_eq!(exported["errorCode"], json!("not open"));
        assert_eq!(exported["transfer"]["process"]["status"], json!(NOT_PROCESSED));
        assert_eq!(exported["transfer"]["process"]["url"], json!("/accounts/2/transfer"));
    }

    #[test]
    fn test_same_record_prefers_id() {
        let a = record(json!({"id": "7", "amount": 1}));
        let b = record(json!({"id": "7", "amount": 2}));
        let c = record(json!({"amount": 1}));
        let d = record(json!({"amount": 1}));

        assert!(a.same_record(&b));
        assert!(c.same_record(&d));
        assert!(!a.same_record(&c));
    }

    #[test]
    fn test_check_result_without_allowed_is_rejection() {
        let check = CheckResult::from_response(json!({"errors": [{"message": "closed"}]}));
        assert!(!check.allowed);
    }
}
