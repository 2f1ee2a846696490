//! Job pipeline
//!
//! - `charges` - fetch outstanding charges and build the charge data set
//! - `credits` - fetch the refund report and build the credit data set
//! - `job` - run both builders and the configured actions into a [`RunBundle`]
//!
//! Both builders share [`build_data_set`]: the patron and material-type merges
//! every record receives, then the configured formatters, mergers and filters,
//! then the summaries.

pub mod charges;
pub mod credits;
pub mod job;

pub use charges::ChargeBuilder;
pub use credits::CreditBuilder;
pub use job::{JobRunner, RunBundle};

use crate::core::merge::BASE_PLACEHOLDER;
use crate::core::{summarize, Backend, NamedConfig, Processed, RecordProcessor, StageRules};
use crate::io::DatasetStore;
use crate::types::{
    ApiMode, DataSummary, FilterStats, FinesError, MergeRule, Record, Result, Summary,
};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

/// Label of the summary over error records
pub const ERRORS_LABEL: &str = "errors";

/// One processed data set: accepted records, logged errors and their summary
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub data: Vec<Record>,
    pub error: Vec<Record>,
    pub summary: DataSummary,
}

impl DataSet {
    /// A data set that was never fetched
    pub fn empty(label: &str) -> Self {
        DataSet {
            data: Vec::new(),
            error: Vec::new(),
            summary: DataSummary {
                reported_record_count: 0,
                raw_record_count: 0,
                unique_patron_count: 0,
                filters: FilterStats::new(),
                accepted: Summary::empty(label),
                errors: Summary::empty(ERRORS_LABEL),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "data": self.data.iter().map(Record::to_json).collect::<Vec<_>>(),
            "error": self.error.iter().map(Record::to_json).collect::<Vec<_>>(),
            "summary": self.summary.to_json(),
        })
    }
}

impl Serialize for DataSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// `GET /users/{id}` per distinct `userId`, joined into `patron`
pub fn patron_merge() -> MergeRule {
    MergeRule::Api {
        api_call: format!("{}/users/{{{{ID}}}}", BASE_PLACEHOLDER),
        mode: ApiMode::Batch,
        api_root: None,
        id_field: "id".to_string(),
        filter_field: "userId".to_string(),
        new_field: "patron".to_string(),
    }
}

/// One material-type listing, joined on `materialTypeId` into `material`
pub fn material_merge() -> MergeRule {
    MergeRule::Api {
        api_call: format!("{}/material-types?limit=1000", BASE_PLACEHOLDER),
        mode: ApiMode::Flatten,
        api_root: Some("mtypes".to_string()),
        id_field: "id".to_string(),
        filter_field: "materialTypeId".to_string(),
        new_field: "material".to_string(),
    }
}

/// Turn an array of JSON objects into records
///
/// # Errors
///
/// Returns `MalformedResponse` naming `path` if `value` is not an array of
/// objects.
pub fn records_from(value: Option<&Value>, path: &str, what: &str) -> Result<Vec<Record>> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| FinesError::malformed_response(path, format!("expected an array at '{}'", what)))?;
    items
        .iter()
        .cloned()
        .map(|item| {
            Record::from_value(item).ok_or_else(|| {
                FinesError::malformed_response(path, format!("non-object entry in '{}'", what))
            })
        })
        .collect()
}

fn unique_patrons(records: &[Record]) -> usize {
    records
        .iter()
        .filter_map(|record| record.get("userId").and_then(Value::as_str))
        .collect::<HashSet<_>>()
        .len()
}

/// Inputs shared by both builders
pub struct BuildContext<'a> {
    pub backend: &'a mut dyn Backend,
    pub vars: &'a NamedConfig,
    pub datasets: &'a mut DatasetStore,
}

/// Enrich, process and summarize freshly fetched records
///
/// # Arguments
///
/// * `records` - Records as fetched from the backend
/// * `reported` - Count the backend claimed to have
/// * `rules` - The data set's formatters, mergers and filters
/// * `label` - Summary label of the accepted records (`charge`, `credit`)
///
/// # Errors
///
/// Propagates backend, data-set and rule configuration errors.
pub fn build_data_set(
    mut records: Vec<Record>,
    reported: usize,
    rules: StageRules<'_>,
    label: &str,
    ctx: BuildContext<'_>,
) -> Result<DataSet> {
    let BuildContext {
        backend,
        vars,
        datasets,
    } = ctx;
    let mut processor = RecordProcessor::new(vars, datasets);
    processor.merge(&mut records, &[patron_merge(), material_merge()], backend)?;

    let raw_record_count = records.len();
    let unique_patron_count = unique_patrons(&records);
    let accepted = processor.run(records, rules, backend)?;
    let Processed {
        accepted,
        errors,
        stats,
    } = processor.finish(accepted);

    info!(
        "{} data set: {} reported, {} fetched, {} accepted, {} errors",
        label,
        reported,
        raw_record_count,
        accepted.len(),
        errors.len()
    );

    let summary = DataSummary {
        reported_record_count: reported,
        raw_record_count,
        unique_patron_count,
        filters: stats,
        accepted: summarize(&accepted, label),
        errors: summarize(&errors, ERRORS_LABEL),
    };
    Ok(DataSet {
        data: accepted,
        error: errors,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedBackend;
    use crate::types::RuleConfig;

    #[test]
    fn test_builtin_merge_paths() {
        match patron_merge() {
            MergeRule::Api { api_call, .. } => assert_eq!(api_call, "{{FOLIO}}/users/{{ID}}"),
            other => panic!("unexpected {:?}", other),
        }
        match material_merge() {
            MergeRule::Api { api_call, api_root, .. } => {
                assert_eq!(api_call, "{{FOLIO}}/material-types?limit=1000");
                assert_eq!(api_root.as_deref(), Some("mtypes"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_records_from_rejects_non_objects() {
        let value = json!([{"id": "1"}, 7]);
        assert!(matches!(
            records_from(Some(&value), "/accounts", "accounts"),
            Err(FinesError::MalformedResponse { .. })
        ));
        assert!(records_from(None, "/accounts", "accounts").is_err());
    }

    #[test]
    fn test_build_data_set_enriches_filters_and_summarizes() {
        let mut backend = ScriptedBackend::new()
            .on_get("/users/u1", json!({"id": "u1", "barcode": "111"}))
            .on_get("/users/u2", json!({"id": "u2", "barcode": "222"}))
            .on_get(
                "/material-types?limit=1000",
                json!({"mtypes": [{"id": "m1", "name": "book"}]}),
            );
        let records = records_from(
            Some(&json!([
                {"id": "1", "userId": "u1", "materialTypeId": "m1", "amount": 10, "remaining": 10, "status": "Open"},
                {"id": "2", "userId": "u1", "materialTypeId": "m1", "amount": 5, "remaining": 5, "status": "Closed"},
                {"id": "3", "userId": "u2", "amount": 2, "remaining": 1, "status": "Open"}
            ])),
            "/accounts",
            "accounts",
        )
        .unwrap();
        let filters: Vec<RuleConfig> = serde_json::from_value(json!([{
            "name": "openOnly", "filter_field": "status", "filter_operator": "EQUALS",
            "filter_value": "Open", "log_error": true, "error_message": "not open"
        }]))
        .unwrap();
        let mut datasets = DatasetStore::default();

        let data_set = build_data_set(
            records,
            4,
            StageRules {
                filters: &filters,
                ..StageRules::default()
            },
            "charge",
            BuildContext {
                backend: &mut backend,
                vars: &NamedConfig::new(),
                datasets: &mut datasets,
            },
        )
        .unwrap();

        assert_eq!(data_set.data.len(), 2);
        assert_eq!(data_set.error.len(), 1);
        assert_eq!(data_set.data[0].get("patron.barcode"), Some(&json!("111")));
        assert_eq!(data_set.data[0].get("material.name"), Some(&json!("book")));
        assert_eq!(data_set.data[1].get("material"), None);

        let summary = data_set.summary.to_json();
        assert_eq!(summary["reportedRecordCount"], json!(4));
        assert_eq!(summary["rawRecordCount"], json!(3));
        assert_eq!(summary["uniquePatronCount"], json!(2));
        assert_eq!(summary["passedopenOnly"], json!(2));
        assert_eq!(summary["failedopenOnly"], json!(1));
        assert_eq!(summary["charge_total"], json!(12.0));
        assert_eq!(summary["charge_record_count"], json!(2));
        assert_eq!(summary["errors_total"], json!(5.0));
        assert_eq!(backend.calls().iter().filter(|c| c.starts_with("GET /users/")).count(), 2);
    }

    #[test]
    fn test_empty_data_set_json_shape() {
        let json = DataSet::empty("credit").to_json();
        assert_eq!(json["data"], json!([]));
        assert_eq!(json["error"], json!([]));
        assert_eq!(json["summary"]["credit_total"], json!(0.0));
        assert_eq!(json["summary"]["errors_record_count"], json!(0));
    }
}
