//! Declarative pipeline rules
//!
//! Three rule families reshape record collections:
//!
//! - [`RuleConfig`] - a filter: resolve a field, compare it, partition records
//! - [`MergeRule`] - enrich records by concatenation or reference-data joins
//! - [`UpdateRule`] - string transforms from one path to another
//!
//! Keyword values (`EQUALS`, `COUNT`, `BATCH`, ...) are accepted in any case.
//! Missing required keys fail deserialization, which aborts the run before
//! any record is touched.

use crate::types::FinesError;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Field name extracted from reference entries when `flatten: true`
pub const DEFAULT_FLATTEN_FIELD: &str = "uuid";

/// Identifier field used to re-key `FLATTEN` API results
pub const DEFAULT_ID_FIELD: &str = "id";

/// Implements case-insensitive `FromStr` + `TryFrom<String>` for a keyword enum
macro_rules! keyword_enum {
    ($name:ident, $what:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $name {
            type Err = FinesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(FinesError::config(format!("unknown {} '{}'", $what, other))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = FinesError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

/// Comparison applied by a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum FilterOperator {
    Equals,
    NotEqual,
    OneOf,
    NullOrOneOf,
    LongerThan,
    ShorterThan,
    InFile,
}

keyword_enum!(FilterOperator, "filter operator", {
    "EQUALS" => Equals,
    "NOT_EQUAL" => NotEqual,
    "ONE_OF" => OneOf,
    "NULL_OR_ONE_OF" => NullOrOneOf,
    "LONGER_THAN" => LongerThan,
    "SHORTER_THAN" => ShorterThan,
    "IN_FILE" => InFile,
});

/// Transform applied to the resolved value before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum FieldTransform {
    #[default]
    None,
    /// Replace a collection (or string) with its length
    Count,
}

keyword_enum!(FieldTransform, "field transform", {
    "NONE" => None,
    "COUNT" => Count,
});

/// A `false`/name pair as written in rule files (`load: false`, `load: patrons`)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FlagOrName {
    Flag(bool),
    Name(String),
}

fn load_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<FlagOrName>::deserialize(deserializer)? {
        Some(FlagOrName::Name(name)) if !name.trim().is_empty() => Some(name),
        _ => None,
    })
}

fn flatten_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<FlagOrName>::deserialize(deserializer)? {
        Some(FlagOrName::Flag(true)) => Some(DEFAULT_FLATTEN_FIELD.to_string()),
        Some(FlagOrName::Name(field)) if !field.trim().is_empty() => Some(field),
        _ => None,
    })
}

/// One filter step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleConfig {
    /// Unique per run; key for the pass/fail tallies
    pub name: String,
    /// Dot path of the value under test
    pub filter_field: String,
    pub filter_operator: FilterOperator,
    /// Literal value, or `ENV|<name>` resolved at evaluation time
    #[serde(default)]
    pub filter_value: Value,
    #[serde(default)]
    pub field_transform: FieldTransform,
    /// Reference data set for `IN_FILE`
    #[serde(default, deserialize_with = "load_name")]
    pub load: Option<String>,
    /// Identifier field extracted from each reference entry
    #[serde(default, deserialize_with = "flatten_field")]
    pub flatten: Option<String>,
    /// Copy rejected records into the error collection
    #[serde(default)]
    pub log_error: bool,
    /// Stamped on rejected records as `errorCode`
    #[serde(default)]
    pub error_message: String,
}

/// A filter given by name (looked up in the rule catalog) or inline
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterRef {
    Named(String),
    Inline(Box<RuleConfig>),
}

/// How an API merge obtains its reference mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ApiMode {
    /// One call per distinct key value
    Batch,
    /// One bulk call, result array re-keyed by an identifier field
    Flatten,
}

keyword_enum!(ApiMode, "api action", {
    "BATCH" => Batch,
    "FLATTEN" => Flatten,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
enum MergeType {
    Field,
    File,
    Api,
}

keyword_enum!(MergeType, "merge type", {
    "FIELD" => Field,
    "FILE" => File,
    "API" => Api,
});

/// Merge rule exactly as written in configuration
#[derive(Debug, Clone, Deserialize)]
struct MergeRuleConfig {
    merge_type: MergeType,
    new_field: Option<String>,
    field_1: Option<String>,
    field_2: Option<String>,
    #[serde(default)]
    field_deliminator: String,
    filter_field: Option<String>,
    #[serde(default, deserialize_with = "load_name")]
    load: Option<String>,
    api_call: Option<String>,
    api_action: Option<ApiMode>,
    #[serde(default, deserialize_with = "load_name")]
    api_root: Option<String>,
    id_field: Option<String>,
}

/// One merge step, validated per mode
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "MergeRuleConfig")]
pub enum MergeRule {
    /// `new_field = field_1 + delimiter + field_2`
    Field {
        field_1: String,
        field_2: String,
        delimiter: String,
        new_field: String,
    },
    /// Join against a named reference data set
    File {
        load: String,
        filter_field: String,
        new_field: String,
        /// Key of each row when the data set is a list of rows
        id_field: String,
    },
    /// Join against backend lookups
    Api {
        /// Path template; `{{ID}}` is replaced by the key in `BATCH` mode
        api_call: String,
        mode: ApiMode,
        /// Field of the response holding the payload, if nested
        api_root: Option<String>,
        /// Identifier field for `FLATTEN` re-keying
        id_field: String,
        filter_field: String,
        new_field: String,
    },
}

fn required(value: Option<String>, key: &str, mode: &str) -> Result<String, FinesError> {
    value.ok_or_else(|| FinesError::config(format!("{} merge requires '{}'", mode, key)))
}

impl TryFrom<MergeRuleConfig> for MergeRule {
    type Error = FinesError;

    fn try_from(raw: MergeRuleConfig) -> Result<Self, Self::Error> {
        match raw.merge_type {
            MergeType::Field => Ok(MergeRule::Field {
                field_1: required(raw.field_1, "field_1", "FIELD")?,
                field_2: required(raw.field_2, "field_2", "FIELD")?,
                delimiter: raw.field_deliminator,
                new_field: required(raw.new_field, "new_field", "FIELD")?,
            }),
            MergeType::File => Ok(MergeRule::File {
                load: required(raw.load, "load", "FILE")?,
                filter_field: required(raw.filter_field, "filter_field", "FILE")?,
                new_field: required(raw.new_field, "new_field", "FILE")?,
                id_field: raw.id_field.unwrap_or_else(|| DEFAULT_ID_FIELD.to_string()),
            }),
            MergeType::Api => Ok(MergeRule::Api {
                api_call: required(raw.api_call, "api_call", "API")?,
                mode: raw.api_action.unwrap_or(ApiMode::Batch),
                api_root: raw.api_root,
                id_field: raw.id_field.unwrap_or_else(|| DEFAULT_ID_FIELD.to_string()),
                filter_field: required(raw.filter_field, "filter_field", "API")?,
                new_field: required(raw.new_field, "new_field", "API")?,
            }),
        }
    }
}

/// String transform applied by a field update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum UpdateKind {
    Replace,
    LeftStrip,
    RightStrip,
    /// Copy the value unchanged; the source field is kept
    Move,
}

keyword_enum!(UpdateKind, "update type", {
    "REPLACE" => Replace,
    "LEFT_STRIP" => LeftStrip,
    "RIGHT_STRIP" => RightStrip,
    "MOVE" => Move,
});

/// One field update step
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateRule {
    pub filter_field: String,
    pub new_field: String,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Substring for `REPLACE`, character set for the strips
    #[serde(default)]
    pub search_for: String,
    #[serde(default)]
    pub replace_with: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("EQUALS", FilterOperator::Equals)]
    #[case("not_equal", FilterOperator::NotEqual)]
    #[case("Null_Or_One_Of", FilterOperator::NullOrOneOf)]
    #[case(" IN_FILE ", FilterOperator::InFile)]
    fn test_filter_operator_parsing(#[case] text: &str, #[case] expected: FilterOperator) {
        assert_eq!(text.parse::<FilterOperator>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_operator_is_config_error() {
        let err = "BETWEEN".parse::<FilterOperator>().unwrap_err();
        assert!(matches!(err, FinesError::Config { .. }));
    }

    #[test]
    fn test_rule_config_defaults() {
        let rule: RuleConfig = serde_json::from_value(json!({
            "name": "openOnly",
            "filter_field": "status",
            "filter_operator": "EQUALS",
            "filter_value": "Open",
            "load": false
        }))
        .unwrap();

        assert_eq!(rule.field_transform, FieldTransform::None);
        assert_eq!(rule.load, None);
        assert_eq!(rule.flatten, None);
        assert!(!rule.log_error);
    }

    #[test]
    fn test_rule_config_flatten_flag_uses_default_field() {
        let rule: RuleConfig = serde_json::from_value(json!({
            "name": "knownPatron",
            "filter_field": "userId",
            "filter_operator": "IN_FILE",
            "load": "patrons",
            "flatten": true
        }))
        .unwrap();

        assert_eq!(rule.load.as_deref(), Some("patrons"));
        assert_eq!(rule.flatten.as_deref(), Some(DEFAULT_FLATTEN_FIELD));
    }

    #[test]
    fn test_rule_config_missing_key_fails() {
        let result = serde_json::from_value::<RuleConfig>(json!({
            "name": "broken",
            "filter_operator": "EQUALS"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_ref_named_and_inline() {
        let refs: Vec<FilterRef> = serde_json::from_value(json!([
            "positiveOnly",
            {"name": "inline", "filter_field": "amount", "filter_operator": "LONGER_THAN", "filter_value": 0}
        ]))
        .unwrap();

        assert_eq!(refs[0], FilterRef::Named("positiveOnly".to_string()));
        assert!(matches!(&refs[1], FilterRef::Inline(rule) if rule.name == "inline"));
    }

    #[test]
    fn test_merge_rule_api_defaults() {
        let rule: MergeRule = serde_json::from_value(json!({
            "merge_type": "api",
            "api_call": "/users/{{ID}}",
            "filter_field": "userId",
            "new_field": "patron",
            "api_root": false
        }))
        .unwrap();

        assert_eq!(
            rule,
            MergeRule::Api {
                api_call: "/users/{{ID}}".to_string(),
                mode: ApiMode::Batch,
                api_root: None,
                id_field: DEFAULT_ID_FIELD.to_string(),
                filter_field: "userId".to_string(),
                new_field: "patron".to_string(),
            }
        );
    }

    #[test]
    fn test_merge_rule_field_requires_both_fields() {
        let result = serde_json::from_value::<MergeRule>(json!({
            "merge_type": "FIELD",
            "field_1": "a.x",
            "new_field": "c.z"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_update_rule_parses_type_key() {
        let rule: UpdateRule = serde_json::from_value(json!({
            "filter_field": "barcode",
            "new_field": "barcode",
            "type": "left_strip",
            "search_for": "0"
        }))
        .unwrap();

        assert_eq!(rule.kind, UpdateKind::LeftStrip);
        assert_eq!(rule.replace_with, "");
    }
}
