//! Core traits for backend access and financial actions
//!
//! These trait abstractions let the merge engine and the action framework run
//! against the real API client or against scripted fakes in tests.

use crate::types::{Record, Result};
use serde_json::Value;

/// Operations the pipeline needs from the library-services backend
///
/// Implemented by [`crate::client::ApiClient`]. All calls block until the
/// backend has answered (or the client has given up).
pub trait Backend {
    /// GET `path`, returning the parsed JSON body
    fn get(&mut self, path: &str) -> Result<Value>;

    /// POST `body` to `path`, returning the parsed JSON body
    fn post(&mut self, path: &str, body: &Value) -> Result<Value>;

    /// POST in soft mode: a 404 or 422 response body is returned instead of
    /// raised, so the caller can read the business verdict itself
    fn post_soft(&mut self, path: &str, body: &Value) -> Result<Value>;

    /// DELETE `path`
    fn delete(&mut self, path: &str) -> Result<Value>;
}

/// Shared capability of every action variant
///
/// The driver calls `check` on every record, then `execute` on the records
/// whose check allowed them. Both phases record their results on the record
/// under [`FinancialAction::name`].
pub trait FinancialAction {
    /// Configured action name
    fn name(&self) -> &str;

    /// Decide whether the record may be acted on
    fn check(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()>;

    /// Perform (or, when inactive, describe) the mutation
    fn execute(&self, backend: &mut dyn Backend, record: &mut Record) -> Result<()>;

    /// Acknowledged no-op: there is no compensating transaction
    fn undo(&self) -> bool;
}
