//! Run statistics
//!
//! [`FilterStats`] accumulates pass/fail tallies per rule name across every
//! filter invocation of a data set. [`Summary`] holds the money totals the
//! aggregator computes for one labelled record collection, and [`DataSummary`]
//! gathers everything reported for a data set (charges or credits).

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Pass/fail counters for one rule name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RuleTally {
    pub passed: usize,
    pub failed: usize,
}

/// Tallies for every rule applied to a data set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterStats {
    tallies: BTreeMap<String, RuleTally>,
}

impl FilterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a zeroed tally exists for `rule`
    pub fn register(&mut self, rule: &str) {
        self.tallies.entry(rule.to_string()).or_default();
    }

    pub fn record_pass(&mut self, rule: &str) {
        self.tallies.entry(rule.to_string()).or_default().passed += 1;
    }

    pub fn record_fail(&mut self, rule: &str) {
        self.tallies.entry(rule.to_string()).or_default().failed += 1;
    }

    pub fn passed(&self, rule: &str) -> usize {
        self.tallies.get(rule).map_or(0, |t| t.passed)
    }

    pub fn failed(&self, rule: &str) -> usize {
        self.tallies.get(rule).map_or(0, |t| t.failed)
    }

    pub fn tally(&self, rule: &str) -> Option<RuleTally> {
        self.tallies.get(rule).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Flat `passed<name>` / `failed<name>` keys, as reported to exporters
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, tally) in &self.tallies {
            out.insert(format!("passed{}", name), json!(tally.passed));
            out.insert(format!("failed{}", name), json!(tally.failed));
        }
        out
    }
}

/// Totals for one fee/fine owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerStats {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub remaining: Decimal,
    pub record_count: usize,
}

impl OwnerStats {
    pub fn new(name: &str) -> Self {
        OwnerStats {
            name: name.to_string(),
            total: Decimal::ZERO,
            remaining: Decimal::ZERO,
            record_count: 0,
        }
    }
}

/// Aggregate of one labelled record collection
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Prefix of every exported key (`charge`, `errors`, ...)
    pub label: String,
    pub total: Decimal,
    pub remaining: Decimal,
    pub record_count: usize,
    /// Keyed by owner name
    pub owner_stats: BTreeMap<String, OwnerStats>,
}

impl Summary {
    pub fn empty(label: &str) -> Self {
        Summary {
            label: label.to_string(),
            total: Decimal::ZERO,
            remaining: Decimal::ZERO,
            record_count: 0,
            owner_stats: BTreeMap::new(),
        }
    }

    /// `<label>_total`, `<label>_remaining`, `<label>_record_count`,
    /// `<label>_owner_stats`
    pub fn to_json(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(format!("{}_total", self.label), decimal_json(self.total));
        out.insert(
            format!("{}_remaining", self.label),
            decimal_json(self.remaining),
        );
        out.insert(
            format!("{}_record_count", self.label),
            json!(self.record_count),
        );
        let owners = serde_json::to_value(&self.owner_stats).unwrap_or(Value::Null);
        out.insert(format!("{}_owner_stats", self.label), owners);
        out
    }
}

/// Render a decimal as a JSON number, falling back to its string form
pub fn decimal_json(value: Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;

    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

/// Read a JSON number or numeric string as a decimal
///
/// Returns `None` for every other value, including unparseable strings.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    use rust_decimal::prelude::FromPrimitive;
    use std::str::FromStr;

    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Decimal::from(i)),
            None => Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        },
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}

/// Everything reported for one data set
#[derive(Debug, Clone, PartialEq)]
pub struct DataSummary {
    /// Count the backend claimed to have
    pub reported_record_count: usize,
    /// Count actually fetched, before any filter
    pub raw_record_count: usize,
    pub unique_patron_count: usize,
    pub filters: FilterStats,
    /// Summary of the records that passed every filter
    pub accepted: Summary,
    /// Summary of the records collected by `log_error` rules
    pub errors: Summary,
}

impl DataSummary {
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "reportedRecordCount".to_string(),
            json!(self.reported_record_count),
        );
        out.insert("rawRecordCount".to_string(), json!(self.raw_record_count));
        out.insert(
            "uniquePatronCount".to_string(),
            json!(self.unique_patron_count),
        );
        out.extend(self.filters.to_json());
        out.extend(self.accepted.to_json());
        out.extend(self.errors.to_json());
        Value::Object(out)
    }
}

impl Serialize for DataSummary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_stats_flat_keys() {
        let mut stats = FilterStats::new();
        stats.record_pass("openOnly");
        stats.record_fail("openOnly");
        stats.register("unused");

        let json = stats.to_json();
        assert_eq!(json["passedopenOnly"], json!(1));
        assert_eq!(json["failedopenOnly"], json!(1));
        assert_eq!(json["passedunused"], json!(0));
        assert_eq!(json["failedunused"], json!(0));
    }

    #[test]
    fn test_register_does_not_reset_existing_tally() {
        let mut stats = FilterStats::new();
        stats.record_pass("a");
        stats.register("a");
        assert_eq!(stats.passed("a"), 1);
    }

    #[rstest::rstest]
    #[case(json!(12), Some(Decimal::new(12, 0)))]
    #[case(json!(12.5), Some(Decimal::new(125, 1)))]
    #[case(json!(" 3.10 "), Some(Decimal::new(310, 2)))]
    #[case(json!("abc"), None)]
    #[case(json!(null), None)]
    #[case(json!([1]), None)]
    fn test_decimal_value(#[case] value: Value, #[case] expected: Option<Decimal>) {
        assert_eq!(decimal_value(&value), expected);
    }

    #[test]
    fn test_summary_json_keys() {
        let mut summary = Summary::empty("charge");
        summary.total = Decimal::new(1250, 2);
        summary.record_count = 2;

        let json = summary.to_json();
        assert_eq!(json["charge_total"], json!(12.5));
        assert_eq!(json["charge_remaining"], json!(0.0));
        assert_eq!(json["charge_record_count"], json!(2));
        assert_eq!(json["charge_owner_stats"], json!({}));
    }
}
