//! Summary aggregator
//!
//! Money totals over a record collection, overall and per fee/fine owner.

use crate::types::{decimal_value, OwnerStats, Record, Summary};
use rust_decimal::Decimal;
use tracing::warn;

/// Path of the owner name used for grouping
pub const OWNER_FIELD: &str = "owner_data.FeeFineOwner";

/// Group name for records without an owner
pub const UNKNOWN_OWNER: &str = "UNKNOWN";

/// Summarize `records` under `label`
///
/// `amount` and `remaining` are read as numbers or numeric strings; an absent
/// or unreadable value counts as zero. The per-owner totals always add up to
/// the grand totals.
pub fn summarize(records: &[Record], label: &str) -> Summary {
    let mut summary = Summary::empty(label);

    for record in records {
        let amount = money(record, "amount");
        let remaining = money(record, "remaining");
        let owner = record
            .get(OWNER_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or(UNKNOWN_OWNER);

        summary.total += amount;
        summary.remaining += remaining;
        summary.record_count += 1;

        let stats = summary
            .owner_stats
            .entry(owner.to_string())
            .or_insert_with(|| OwnerStats::new(owner));
        stats.total += amount;
        stats.remaining += remaining;
        stats.record_count += 1;
    }

    summary
}

fn money(record: &Record, field: &str) -> Decimal {
    match record.get(field) {
        None => Decimal::ZERO,
        Some(value) => decimal_value(value).unwrap_or_else(|| {
            warn!(
                "Record {} has non-numeric {} {}, counted as 0",
                record.id().unwrap_or("<unknown>"),
                field,
                value
            );
            Decimal::ZERO
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn records(values: Value) -> Vec<Record> {
        values
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .map(|v| Record::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn test_totals_and_owner_groups() {
        let input = records(json!([
            {"id": "1", "amount": 10.5, "remaining": 4, "owner_data": {"FeeFineOwner": "Main"}},
            {"id": "2", "amount": "2.25", "owner_data": {"FeeFineOwner": "Main"}},
            {"id": "3", "amount": 5, "remaining": "5", "owner_data": {"FeeFineOwner": "Law"}}
        ]));

        let summary = summarize(&input, "charge");

        assert_eq!(summary.total, Decimal::new(1775, 2));
        assert_eq!(summary.remaining, Decimal::new(9, 0));
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.owner_stats["Main"].total, Decimal::new(1275, 2));
        assert_eq!(summary.owner_stats["Main"].remaining, Decimal::new(4, 0));
        assert_eq!(summary.owner_stats["Main"].record_count, 2);
        assert_eq!(summary.owner_stats["Law"].record_count, 1);
    }

    #[test]
    fn test_missing_owner_grouped_as_unknown() {
        let summary = summarize(&records(json!([{"amount": 1}])), "errors");
        assert_eq!(summary.owner_stats[UNKNOWN_OWNER].total, Decimal::ONE);
    }

    #[test]
    fn test_empty_collection() {
        let summary = summarize(&[], "errors");
        assert_eq!(summary, Summary::empty("errors"));
        assert_eq!(summary.to_json()["errors_record_count"], json!(0));
    }

    #[test]
    fn test_owner_totals_add_up() {
        let input = records(json!([
            {"amount": 1.1, "owner_data": {"FeeFineOwner": "A"}},
            {"amount": 2.2, "owner_data": {"FeeFineOwner": "B"}},
            {"amount": 3.3, "owner_data": {"FeeFineOwner": "A"}},
            {"amount": "bad", "owner_data": {"FeeFineOwner": "C"}},
            {"owner_data": {"FeeFineOwner": "D"}}
        ]));

        let summary = summarize(&input, "charge");
        let owner_total: Decimal = summary.owner_stats.values().map(|o| o.total).sum();
        let owner_count: usize = summary.owner_stats.values().map(|o| o.record_count).sum();

        assert_eq!(owner_total, summary.total);
        assert_eq!(owner_count, summary.record_count);
        assert_eq!(summary.total, Decimal::new(66, 1));
    }
}
