//! Field update engine
//!
//! String transforms from one path to another, applied in place. A record
//! whose source field does not resolve passes through untouched. The string
//! transforms skip non-string sources; `MOVE` copies any value and leaves the
//! source where it was.

use crate::types::{Record, UpdateKind, UpdateRule};
use serde_json::Value;
use tracing::debug;

/// Apply one update rule to every record
pub fn apply(records: &mut [Record], rule: &UpdateRule) {
    let mut updated = 0;
    for record in records.iter_mut() {
        let Some(source) = record.get(&rule.filter_field) else {
            continue;
        };
        if let Some(value) = transform(source, rule) {
            record.set(&rule.new_field, value);
            updated += 1;
        }
    }
    debug!(
        "{:?} '{}' -> '{}': {} of {} records updated",
        rule.kind,
        rule.filter_field,
        rule.new_field,
        updated,
        records.len()
    );
}

fn transform(source: &Value, rule: &UpdateRule) -> Option<Value> {
    if rule.kind == UpdateKind::Move {
        return Some(source.clone());
    }

    let text = source.as_str()?;
    let result = match rule.kind {
        UpdateKind::Replace => text.replace(&rule.search_for, &rule.replace_with),
        UpdateKind::LeftStrip => strip(text, &rule.search_for, Side::Left),
        UpdateKind::RightStrip => strip(text, &rule.search_for, Side::Right),
        UpdateKind::Move => text.to_string(),
    };
    Some(Value::String(result))
}

enum Side {
    Left,
    Right,
}

/// Trim any of `chars` from one side; an empty set trims whitespace
fn strip(text: &str, chars: &str, side: Side) -> String {
    let trimmed = match (side, chars.is_empty()) {
        (Side::Left, true) => text.trim_start(),
        (Side::Right, true) => text.trim_end(),
        (Side::Left, false) => text.trim_start_matches(|c: char| chars.contains(c)),
        (Side::Right, false) => text.trim_end_matches(|c: char| chars.contains(c)),
    };
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn rule(kind: &str, search_for: &str, replace_with: &str) -> UpdateRule {
        serde_json::from_value(json!({
            "filter_field": "src.value",
            "new_field": "dst.value",
            "type": kind,
            "search_for": search_for,
            "replace_with": replace_with
        }))
        .unwrap()
    }

    #[rstest]
    #[case::replace("REPLACE", "-", "", "12-34-56", "123456")]
    #[case::left_strip("LEFT_STRIP", "0", "", "000123", "123")]
    #[case::left_strip_set("LEFT_STRIP", "0x", "", "x0x0a0", "a0")]
    #[case::right_strip("RIGHT_STRIP", ".", "", "total...", "total")]
    #[case::strip_whitespace("RIGHT_STRIP", "", "", "name  ", "name")]
    #[case::move_value("MOVE", "", "", "kept as is", "kept as is")]
    fn test_transforms(
        #[case] kind: &str,
        #[case] search_for: &str,
        #[case] replace_with: &str,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let mut records = vec![record(json!({"src": {"value": input}}))];
        apply(&mut records, &rule(kind, search_for, replace_with));
        assert_eq!(records[0].get("dst.value"), Some(&json!(expected)));
    }

    #[test]
    fn test_absent_source_passes_through() {
        let original = record(json!({"id": "1"}));
        let mut records = vec![original.clone()];
        apply(&mut records, &rule("REPLACE", "a", "b"));
        assert_eq!(records[0], original);
    }

    #[test]
    fn test_string_transform_skips_non_string() {
        let mut records = vec![record(json!({"src": {"value": 42}}))];
        apply(&mut records, &rule("LEFT_STRIP", "4", ""));
        assert_eq!(records[0].get("dst"), None);
    }

    #[test]
    fn test_move_copies_and_keeps_source() {
        let mut records = vec![record(json!({"src": {"value": {"nested": [1, 2]}}}))];
        let rule = rule("MOVE", "", "");

        apply(&mut records, &rule);
        let first = records[0].get("dst.value").cloned();
        apply(&mut records, &rule);

        assert_eq!(first, Some(json!({"nested": [1, 2]})));
        assert_eq!(records[0].get("dst.value").cloned(), first);
        assert_eq!(records[0].get("src.value"), Some(&json!({"nested": [1, 2]})));
    }

    #[test]
    fn test_in_place_on_same_path() {
        let mut records = vec![record(json!({"barcode": "000987"}))];
        let rule: UpdateRule = serde_json::from_value(json!({
            "filter_field": "barcode",
            "new_field": "barcode",
            "type": "LEFT_STRIP",
            "search_for": "0"
        }))
        .unwrap();

        apply(&mut records, &rule);
        assert_eq!(records[0].get("barcode"), Some(&json!("987")));
    }
}
