//! Filter engine
//!
//! Applies one [`RuleConfig`] to a record collection, partitioning it into the
//! records that satisfy the rule (returned) and those that do not (counted and,
//! when the rule asks for it, copied into the error collection with an
//! `errorCode`).
//!
//! Evaluation of one record:
//!
//! 1. resolve `filter_field` through the path resolver (absent stays absent)
//! 2. apply `field_transform` (`COUNT` replaces a collection with its length)
//! 3. resolve the rule's `filter_value`, following an `ENV|<name>` indirection
//!    once per variable and caching the result
//! 4. compare with `filter_operator`
//!
//! Tallies accumulate across every call on the same engine, so one engine is
//! used per data set.

use crate::core::vars::{NamedConfig, INDIRECTION_PREFIX};
use crate::io::DatasetStore;
use crate::types::{
    decimal_value, FieldTransform, FilterOperator, FilterStats, FinesError, Record, Result,
    RuleConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Stateful filter runner for one data set
#[derive(Debug, Default)]
pub struct FilterEngine {
    stats: FilterStats,
    errors: Vec<Record>,
    resolved: HashMap<String, Value>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass/fail tallies so far
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Rejected records collected by `log_error` rules
    pub fn errors(&self) -> &[Record] {
        &self.errors
    }

    pub fn into_parts(self) -> (FilterStats, Vec<Record>) {
        (self.stats, self.errors)
    }

    /// Apply `rule` to `records`, returning the accepted records in input order
    ///
    /// # Arguments
    ///
    /// * `records` - Collection to partition
    /// * `rule` - The filter step
    /// * `vars` - Named values for `ENV|<name>` indirections
    /// * `datasets` - Reference data for `IN_FILE`
    ///
    /// # Errors
    ///
    /// Returns an error if the filter value cannot be resolved, an `IN_FILE`
    /// rule has no loadable data set, or a numeric rule compares against a
    /// non-numeric value. Records that merely fail the rule are not errors.
    pub fn apply(
        &mut self,
        records: Vec<Record>,
        rule: &RuleConfig,
        vars: &NamedConfig,
        datasets: &mut DatasetStore,
    ) -> Result<Vec<Record>> {
        self.stats.register(&rule.name);
        if records.is_empty() {
            debug!("Filter '{}' skipped: no records", rule.name);
            return Ok(records);
        }

        let expected = self.filter_value(rule, vars)?;
        let reference = match rule.filter_operator {
            FilterOperator::InFile => Some(reference_set(rule, datasets)?),
            _ => None,
        };
        let matcher = Matcher::new(rule, &expected, reference.as_deref())?;

        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            let value = transformed_value(&record, rule);
            if matcher.matches(value.as_ref()) {
                self.stats.record_pass(&rule.name);
                accepted.push(record);
            } else {
                self.stats.record_fail(&rule.name);
                if rule.log_error {
                    let mut rejected = record;
                    rejected.set_error_code(rule.error_message.clone());
                    self.errors.push(rejected);
                }
            }
        }

        info!(
            "Filter '{}': {} passed, {} failed",
            rule.name,
            self.stats.passed(&rule.name),
            self.stats.failed(&rule.name)
        );
        Ok(accepted)
    }

    /// Literal values are used as written; `ENV|<name>` lookups are cached
    /// per variable name for the life of the engine
    fn filter_value(&mut self, rule: &RuleConfig, vars: &NamedConfig) -> Result<Value> {
        let Some(name) = indirection_name(&rule.filter_value) else {
            return Ok(rule.filter_value.clone());
        };
        if let Some(value) = self.resolved.get(name) {
            return Ok(value.clone());
        }
        let value = vars.resolve(&rule.name, &rule.filter_value)?;
        self.resolved.insert(name.to_string(), value.clone());
        Ok(value)
    }
}

fn indirection_name(value: &Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix(INDIRECTION_PREFIX))
        .map(str::trim)
}

/// Resolve the rule's field and apply its transform; `None` means absent
fn transformed_value(record: &Record, rule: &RuleConfig) -> Option<Value> {
    let value = record.get(&rule.filter_field)?;
    match rule.field_transform {
        FieldTransform::None => Some(value.clone()),
        FieldTransform::Count => match value {
            Value::Array(items) => Some(Value::from(items.len())),
            Value::Object(map) => Some(Value::from(map.len())),
            Value::String(s) => Some(Value::from(s.chars().count())),
            Value::Null => Some(Value::from(0)),
            _ => None,
        },
    }
}

/// Load the `IN_FILE` reference data, flattened to identifiers if requested
fn reference_set(rule: &RuleConfig, datasets: &mut DatasetStore) -> Result<Vec<Value>> {
    let name = rule.load.as_deref().ok_or_else(|| {
        FinesError::config(format!("IN_FILE rule '{}' has no data set to load", rule.name))
    })?;
    let data = datasets.load(name)?;

    let entries: Vec<Value> = match data {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
        other => vec![other.clone()],
    };

    Ok(match &rule.flatten {
        Some(field) => entries
            .iter()
            .filter_map(|entry| entry.get(field).cloned())
            .collect(),
        None => entries,
    })
}

/// Pre-computed comparison for one rule application
enum Matcher<'a> {
    Equals(&'a Value),
    NotEqual(&'a Value),
    OneOf { set: Vec<Value>, accept_null: bool },
    Longer(rust_decimal::Decimal),
    Shorter(rust_decimal::Decimal),
    InFile(&'a [Value]),
}

impl<'a> Matcher<'a> {
    fn new(rule: &RuleConfig, expected: &'a Value, reference: Option<&'a [Value]>) -> Result<Self> {
        let numeric = || {
            decimal_value(expected).ok_or_else(|| {
                FinesError::config(format!(
                    "rule '{}' compares against non-numeric value {}",
                    rule.name, expected
                ))
            })
        };

        Ok(match rule.filter_operator {
            FilterOperator::Equals => Matcher::Equals(expected),
            FilterOperator::NotEqual => Matcher::NotEqual(expected),
            FilterOperator::OneOf => Matcher::OneOf {
                set: value_set(expected),
                accept_null: false,
            },
            FilterOperator::NullOrOneOf => Matcher::OneOf {
                set: value_set(expected),
                accept_null: true,
            },
            FilterOperator::LongerThan => Matcher::Longer(numeric()?),
            FilterOperator::ShorterThan => Matcher::Shorter(numeric()?),
            FilterOperator::InFile => Matcher::InFile(reference.unwrap_or(&[])),
        })
    }

    fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Matcher::Equals(expected), Some(value)) => values_equal(value, expected),
            (Matcher::Equals(_), None) => false,
            (Matcher::NotEqual(expected), Some(value)) => !values_equal(value, expected),
            (Matcher::NotEqual(_), None) => true,
            (Matcher::OneOf { accept_null, .. }, None | Some(Value::Null)) if *accept_null => true,
            (Matcher::OneOf { set, .. }, Some(value)) => {
                set.iter().any(|member| values_equal(value, member))
            }
            (Matcher::OneOf { .. }, None) => false,
            (Matcher::Longer(bound), value) => numeric_field(value).is_some_and(|n| n > *bound),
            (Matcher::Shorter(bound), value) => numeric_field(value).is_some_and(|n| n < *bound),
            // Records without the field are not screened by reference data
            (Matcher::InFile(_), None) => true,
            (Matcher::InFile(reference), Some(value)) => {
                reference.iter().any(|member| values_equal(value, member))
            }
        }
    }
}

/// Membership set of a `ONE_OF` value: array items, object keys, or a
/// comma-separated string
fn value_set(expected: &Value) -> Vec<Value> {
    match expected {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
        Value::String(s) => s
            .split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
        other => vec![other.clone()],
    }
}

fn numeric_field(value: Option<&Value>) -> Option<rust_decimal::Decimal> {
    let value = value?;
    let number = decimal_value(value);
    if number.is_none() && !value.is_null() {
        warn!("Non-numeric value {} in numeric comparison", value);
    }
    number
}

/// Equality that treats numbers and numeric strings by value
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            match (decimal_value(a), decimal_value(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            }
        }
        _ => a == b,
    }
}
