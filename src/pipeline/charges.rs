//! Charge data set
//!
//! Fetches every open fee/fine created inside the configured age window and
//! runs it through [`build_data_set`](super::build_data_set).

use crate::config::JobSettings;
use crate::core::StageRules;
use crate::pipeline::{build_data_set, records_from, BuildContext, DataSet};
use crate::types::Result;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use tracing::{info, warn};

/// Summary label of accepted charges
pub const CHARGE_LABEL: &str = "charge";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct ChargeBuilder<'a> {
    settings: &'a JobSettings,
    today: NaiveDate,
}

impl<'a> ChargeBuilder<'a> {
    pub fn new(settings: &'a JobSettings, today: NaiveDate) -> Self {
        ChargeBuilder { settings, today }
    }

    /// Account query for open charges created strictly inside
    /// `(today - charges_max_age, today - charge_days_outstanding)`
    pub fn query_path(&self) -> String {
        let newest = self.today - Duration::days(self.settings.charge_days_outstanding);
        let oldest = self.today - Duration::days(self.settings.charges_max_age);
        format!(
            "/accounts?query=(status.name==\"Open\" and metadata.createdDate < {} and metadata.createdDate > {})&limit={}",
            newest.format(DATE_FORMAT),
            oldest.format(DATE_FORMAT),
            self.settings.max_fines_to_be_pulled
        )
    }

    /// Fetch and process the charge data set
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the account listing has no `accounts`
    /// array, and propagates backend and rule errors.
    pub fn build(&self, ctx: BuildContext<'_>) -> Result<DataSet> {
        let path = self.query_path();
        info!("Fetching outstanding charges");
        let response = ctx.backend.get(&path)?;

        let records = records_from(response.get("accounts"), &path, "accounts")?;
        let reported = match response
            .pointer("/resultInfo/totalRecords")
            .and_then(Value::as_u64)
        {
            Some(total) => total as usize,
            None => {
                warn!("Account listing has no resultInfo.totalRecords, using fetched count");
                records.len()
            }
        };
        info!("Reported record count: {}", reported);

        let rules = StageRules {
            formatters: &self.settings.formatters.charge_formatters,
            mergers: &self.settings.mergers.charge_mergers,
            filters: &self.settings.filters.charge_filters,
        };
        build_data_set(records, reported, rules, CHARGE_LABEL, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedBackend;
    use crate::core::NamedConfig;
    use crate::io::DatasetStore;
    use crate::types::FinesError;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_query_path_uses_age_window() {
        let settings = JobSettings {
            charges_max_age: 30,
            charge_days_outstanding: 5,
            max_fines_to_be_pulled: 200,
            ..JobSettings::default()
        };
        assert_eq!(
            ChargeBuilder::new(&settings, today()).query_path(),
            "/accounts?query=(status.name==\"Open\" and metadata.createdDate < 2024-03-10 \
             and metadata.createdDate > 2024-02-14)&limit=200"
        );
    }

    #[test]
    fn test_build_reads_reported_count() {
        let settings = JobSettings::default();
        let builder = ChargeBuilder::new(&settings, today());
        let mut backend = ScriptedBackend::new()
            .on_get(
                &builder.query_path(),
                json!({
                    "accounts": [{"id": "1", "userId": "u1", "amount": 3, "remaining": 3}],
                    "resultInfo": {"totalRecords": 9}
                }),
            )
            .on_get("/users/u1", json!({"id": "u1"}))
            .on_get("/material-types?limit=1000", json!({"mtypes": []}));

        let data_set = builder
            .build(BuildContext {
                backend: &mut backend,
                vars: &NamedConfig::new(),
                datasets: &mut DatasetStore::default(),
            })
            .unwrap();

        assert_eq!(data_set.summary.reported_record_count, 9);
        assert_eq!(data_set.summary.raw_record_count, 1);
        assert_eq!(data_set.data[0].get("patron.id"), Some(&json!("u1")));
        assert_eq!(data_set.summary.accepted.label, CHARGE_LABEL);
    }

    #[test]
    fn test_build_without_accounts_is_malformed() {
        let settings = JobSettings::default();
        let builder = ChargeBuilder::new(&settings, today());
        let mut backend = ScriptedBackend::new().on_get(&builder.query_path(), json!({"errors": []}));

        let err = builder
            .build(BuildContext {
                backend: &mut backend,
                vars: &NamedConfig::new(),
                datasets: &mut DatasetStore::default(),
            })
            .unwrap_err();
        assert!(matches!(err, FinesError::MalformedResponse { .. }));
    }
}
