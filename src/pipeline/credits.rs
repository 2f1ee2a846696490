//! Credit data set
//!
//! Pulls the "refunds to process manually" report for the configured window,
//! replaces each report row with the full fee/fine it refers to (keeping the
//! row under `report_data`), then processes the result like charges.

use crate::config::JobSettings;
use crate::core::StageRules;
use crate::pipeline::{build_data_set, records_from, BuildContext, DataSet};
use crate::types::{FinesError, Record, Result};
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Summary label of accepted credits
pub const CREDIT_LABEL: &str = "credit";

/// Refund report endpoint
pub const REFUND_REPORT_PATH: &str = "/feefine-reports/refund";

/// Field a fee/fine carries its report row under
pub const REPORT_FIELD: &str = "report_data";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CreditBuilder<'a> {
    settings: &'a JobSettings,
    today: NaiveDate,
}

impl<'a> CreditBuilder<'a> {
    pub fn new(settings: &'a JobSettings, today: NaiveDate) -> Self {
        CreditBuilder { settings, today }
    }

    /// Report request covering `[today - credit_days_outstanding, yesterday]`
    pub fn report_body(&self) -> Value {
        let days = self.settings.credit_days_outstanding.max(1);
        let start = self.today - Duration::days(days);
        let end = self.today - Duration::days(1);
        json!({
            "startDate": start.format(DATE_FORMAT).to_string(),
            "endDate": end.format(DATE_FORMAT).to_string(),
            "feeFineOwners": [],
        })
    }

    /// Fetch and process the credit data set
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the report has no `reportData` array,
    /// `MissingField` for a row without `feeFineId`, and propagates backend
    /// and rule errors.
    pub fn build(&self, ctx: BuildContext<'_>) -> Result<DataSet> {
        let body = self.report_body();
        info!("Fetching refund report {}", body);
        let report = ctx.backend.post(REFUND_REPORT_PATH, &body)?;
        let rows = records_from(report.get("reportData"), REFUND_REPORT_PATH, "reportData")?;
        info!("Refund report returned {} rows", rows.len());

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let fee_fine_id = row
                .get("feeFineId")
                .and_then(Value::as_str)
                .ok_or_else(|| FinesError::missing_field(None, "feeFineId", "credit lookup"))?;
            let path = format!("/accounts/{}", fee_fine_id);
            let mut fee_fine = Record::from_value(ctx.backend.get(&path)?)
                .ok_or_else(|| FinesError::malformed_response(&path, "expected an object"))?;
            fee_fine.set(REPORT_FIELD, Value::Object(row.data().clone()));
            debug!("Fee/fine {} attached to its report row", fee_fine_id);
            records.push(fee_fine);
        }

        let rules = StageRules {
            formatters: &self.settings.formatters.credit_formatters,
            mergers: &self.settings.mergers.credit_mergers,
            filters: &self.settings.filters.credit_filters,
        };
        build_data_set(records, rows.len(), rules, CREDIT_LABEL, ctx)
    }
}
