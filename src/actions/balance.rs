//! Balance-bearing actions: pay, refund, transfer and waive
//!
//! All four share one shape and differ only in the backend verb:
//!
//! - `check` rejects a non-positive or missing `amount` locally, otherwise asks
//!   `POST /accounts/{id}/check-{verb}` in soft mode and stores the verdict
//! - `execute` posts to `/accounts/{id}/{verb}` when active, or records the
//!   call it would have made

use crate::core::traits::{Backend, FinancialAction};
use crate::types::{
    decimal_json, decimal_value, ActionConfig, ActionType, CheckResult, FinesError,
    ProcessResult, Record, Result,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// One configured pay/refund/transfer/waive action
#[derive(Debug, Clone)]
pub struct BalanceAction {
    name: String,
    kind: ActionType,
    active: bool,
    comments: String,
    user_name: String,
    service_point_id: String,
    payment_method: String,
}

impl BalanceAction {
    /// # Arguments
    ///
    /// * `config` - The action's configuration
    /// * `kind` - One of `Pay`, `Refund`, `Transfer`, `Waive`
    /// * `transactions_active` - Run-level switch combined with `process_active`
    pub fn new(config: &ActionConfig, kind: ActionType, transactions_active: bool) -> Self {
        let active = config.process_active && transactions_active;
        debug!("{} ({}) active: {}", config.name, kind.verb(), active);
        BalanceAction {
            name: config.name.clone(),
            kind,
            active,
            comments: config.comments.clone(),
            user_name: config.user_name.clone(),
            service_point_id: config.service_point_id.clone(),
            payment_method: config.payment_method.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn verb(&self) -> &'static str {
        self.kind.verb()
    }

    fn record_id<'r>(&self, record: &'r Record) -> Result<&'r str> {
        record
            .id()
            .ok_or_else(|| FinesError::missing_field(None, "id", self.verb()))
    }

    /// Amount to act on, when it is a positive number
    fn positive_amount(record: &Record) -> Option<Decimal> {
        record
            .get("amount")
            .and_then(decimal_value)
            .filter(|amount| *amount > Decimal::ZERO)
    }

    fn request_body(&self, amount: Decimal) -> Value {
        json!({
            "amount": decimal_json(amount),
            "notifyPatron": false,
            "comments": self.comments,
            "userName": self.user_name,
            "servicePointId": self.service_point_id,
            "paymentMethod": self.payment_method,
        })
    }
}

impl FinancialAction for BalanceAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        let Some(amount) = Self::positive_amount(record) else {
            warn!(
                "{} not allowed for non-positive amount, record {}",
                self.verb(),
                record.id().unwrap_or("<unknown>")
            );
            let message = format!("{} not allowed for non-positive amounts", self.verb());
            record.outcome_mut(&self.name).check = Some(CheckResult::local(false, &message));
            return Ok(());
        };

        let url = format!("/accounts/{}/check-{}", self.record_id(record)?, self.verb());
        let response = backend.post_soft(&url, &json!({ "amount": decimal_json(amount) }))?;
        let check = CheckResult::from_response(response);

        if check.allowed {
            info!("{} check passed for record {}", self.verb(), record.id().unwrap_or_default());
        } else {
            warn!("{} check rejected record {}", self.verb(), record.id().unwrap_or_default());
        }
        record.outcome_mut(&self.name).check = Some(check);
        Ok(())
    }

    fn execute(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        let id = self.record_id(record)?.to_string();
        let amount = Self::positive_amount(record).unwrap_or(Decimal::ZERO);
        let url = format!("/accounts/{}/{}", id, self.verb());
        let body = self.request_body(amount);

        let result = if self.active {
            debug!("POST {} {}", url, body);
            let response = backend.post(&url, &body)?;
            info!("{} processed for record {}", self.verb(), id);
            ProcessResult::Processed {
                message: format!("{} processed successfully", self.verb()),
                response,
            }
        } else {
            warn!("{} not processed for record {}: action inactive", self.verb(), id);
            ProcessResult::NotProcessed {
                message: format!("{} NOT PROCESSED", self.verb().to_uppercase()),
                url,
                body,
            }
        };

        record.outcome_mut(&self.name).process = Some(result);
        Ok(())
    }

    fn undo(&self) -> bool {
        info!("Undo requested for {}; no compensating transaction exists", self.name);
        true
    }
}
