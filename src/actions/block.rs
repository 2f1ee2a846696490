//! Patron block actions
//!
//! Neither action has a backend-side check, so both allow every record
//! locally. [`BlockAction`] creates one manual block per record;
//! [`RemoveBlockAction`] deletes every manual block whose staff information
//! names the record.

use crate::core::traits::{Backend, FinancialAction};
use crate::types::{ActionConfig, CheckResult, FinesError, ProcessResult, Record, Result, NOT_PROCESSED};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const MANUAL_BLOCKS_PATH: &str = "/manualblocks";

/// Listing used to find blocks to remove
const MANUAL_BLOCKS_LISTING: &str = "/manualblocks?limit=10000";

pub const DEFAULT_BLOCK_DESCRIPTION: &str = "Automated block VIA the transfer system";

/// Days until a created block expires
pub const BLOCK_EXPIRY_DAYS: i64 = 16;

const BLOCK_TYPE: &str = "Manual";

/// Creates a manual patron block for each record
#[derive(Debug, Clone)]
pub struct BlockAction {
    name: String,
    active: bool,
    staff_note: String,
    user_note: String,
    description: String,
    borrowing: bool,
    renewals: bool,
    requests: bool,
}

impl BlockAction {
    pub fn new(config: &ActionConfig, transactions_active: bool) -> Self {
        BlockAction {
            name: config.name.clone(),
            active: config.process_active && transactions_active,
            staff_note: config.staff_note.clone(),
            user_note: config.user_note.clone(),
            description: config
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_BLOCK_DESCRIPTION.to_string()),
            borrowing: config.block_borrowing,
            renewals: config.block_renewals,
            requests: config.block_requests,
        }
    }

    /// Body of the block-creation call for `record`
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if the record has no `id`, or no patron id in
    /// either `patron.id` or `userId`.
    pub fn block_body(&self, record: &Record, now: DateTime<Utc>) -> Result<Value> {
        let id = record
            .id()
            .ok_or_else(|| FinesError::missing_field(None, "id", "block"))?;
        let user_id = record
            .get("patron.id")
            .or_else(|| record.get("userId"))
            .and_then(Value::as_str)
            .ok_or_else(|| FinesError::missing_field(Some(id), "patron.id", "block"))?;
        let expires = now + Duration::days(BLOCK_EXPIRY_DAYS);

        Ok(json!({
            "desc": self.description,
            "staffInformation": format!("{}\nsystemID: {}", self.staff_note, id),
            "patronMessage": self.user_note,
            "borrowing": self.borrowing,
            "renewals": self.renewals,
            "requests": self.requests,
            "expirationDate": expires.to_rfc3339(),
            "type": BLOCK_TYPE,
            "userId": user_id,
        }))
    }
}

impl FinancialAction for BlockAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, _backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        record.outcome_mut(&self.name).check = Some(CheckResult::local(true, "Block action allowed"));
        Ok(())
    }

    fn execute(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        let body = self.block_body(record, Utc::now())?;
        let id = record.id().unwrap_or_default().to_string();

        let result = if self.active {
            let response = backend.post(MANUAL_BLOCKS_PATH, &body)?;
            info!("Block created for record {}", id);
            ProcessResult::Processed {
                message: "Block processed successfully".to_string(),
                response,
            }
        } else {
            warn!("Block not processed for record {}: action inactive", id);
            ProcessResult::NotProcessed {
                message: "BLOCK NOT PROCESSED".to_string(),
                url: MANUAL_BLOCKS_PATH.to_string(),
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

/// Removes the manual blocks created for each record
#[derive(Debug, Clone)]
pub struct RemoveBlockAction {
    name: String,
    active: bool,
}

impl RemoveBlockAction {
    pub fn new(config: &ActionConfig, transactions_active: bool) -> Self {
        RemoveBlockAction {
            name: config.name.clone(),
            active: config.process_active && transactions_active,
        }
    }
}

/// Accepts both `{"manualblocks": [...]}` and a bare array
fn block_list(response: Value) -> Result<Vec<Value>> {
    match response {
        Value::Array(blocks) => Ok(blocks),
        Value::Object(mut map) => match map.remove("manualblocks") {
            Some(Value::Array(blocks)) => Ok(blocks),
            _ => Err(FinesError::malformed_response(
                MANUAL_BLOCKS_LISTING,
                "expected a 'manualblocks' array",
            )),
        },
        _ => Err(FinesError::malformed_response(
            MANUAL_BLOCKS_LISTING,
            "expected a list of blocks",
        )),
    }
}

fn targets_record(block: &Value, id: &str) -> bool {
    block.get("type").and_then(Value::as_str) == Some(BLOCK_TYPE)
        && block
            .get("staffInformation")
            .and_then(Value::as_str)
            .is_some_and(|info| info.contains(id))
}

impl FinancialAction for RemoveBlockAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, _backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        record.outcome_mut(&self.name).check =
            Some(CheckResult::local(true, "Block removal action allowed"));
        Ok(())
    }

    fn execute(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()> {
        let id = record
            .id()
            .ok_or_else(|| FinesError::missing_field(None, "id", "remove-block"))?
            .to_string();
        let blocks = block_list(backend.get(MANUAL_BLOCKS_LISTING)?)?;
        debug!("Scanning {} manual blocks for record {}", blocks.len(), id);

        let mut removed = Vec::new();
        for block in blocks.into_iter().filter(|b| targets_record(b, &id)) {
            let Some(block_id) = block.get("id").and_then(Value::as_str).map(str::to_string) else {
                warn!("Skipping manual block without an id for record {}: {}", id, block);
                continue;
            };
            let url = format!("{}/{}", MANUAL_BLOCKS_PATH, block_id);
            let status = if self.active {
                backend.delete(&url)?;
                info!("Deleted block {} for record {}", block_id, id);
                "DELETED"
            } else {
                warn!("Block {} for record {} not deleted: action inactive", block_id, id);
                NOT_PROCESSED
            };
            removed.push(json!({
                "status": status,
                "url": url,
                "block_id": block_id,
                "block_data": block,
            }));
        }

        let count = removed.len();
        let ids: Vec<Value> = removed.iter().map(|entry| entry["block_id"].clone()).collect();
        let outcome = record.outcome_mut(&self.name);
        outcome.process = Some(if self.active {
            ProcessResult::Processed {
                message: format!("{} block(s) removed", count),
                response: Value::Array(ids),
            }
        } else {
            ProcessResult::NotProcessed {
                message: "REMOVE-BLOCK NOT PROCESSED".to_string(),
                url: MANUAL_BLOCKS_PATH.to_string(),
                body: json!({ "delete": ids }),
            }
        });
        outcome.deleted = removed;
        Ok(())
    }

    fn undo(&self) -> bool {
        info!("Undo requested for {}; no compensating transaction exists", self.name);
        true
    }
}
