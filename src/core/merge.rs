//! Merge engine
//!
//! Enriches records in place:
//!
//! - `FIELD` writes `field_1 + delimiter + field_2` to `new_field`
//! - `FILE` joins each record's key against a named reference data set, either
//!   a mapping or a list of rows keyed by `id_field`
//! - `API` joins against backend lookups, either one call per distinct key
//!   (`BATCH`) or one bulk call re-keyed by an identifier field (`FLATTEN`)
//!
//! A record whose source fields or join key do not resolve, or whose key has
//! no match, is left as it was.

use crate::core::traits::Backend;
use crate::io::DatasetStore;
use crate::types::{ApiMode, FinesError, MergeRule, Record, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, info};

/// Placeholder replaced by each key in `BATCH` paths
pub const ID_PLACEHOLDER: &str = "{{ID}}";

/// Base-URL placeholder allowed at the front of `api_call`; the client already
/// owns the base URL
pub const BASE_PLACEHOLDER: &str = "{{FOLIO}}";

/// Apply one merge rule to every record
///
/// # Arguments
///
/// * `records` - Records to enrich in place
/// * `rule` - The merge step
/// * `backend` - Used by `API` merges only
/// * `datasets` - Used by `FILE` merges only
///
/// # Errors
///
/// Returns an error if a `FILE` data set cannot be loaded or is neither a
/// mapping nor a list of rows,
/// or if a backend call fails. Unmatched keys are not errors.
pub fn apply(
    records: &mut [Record],
    rule: &MergeRule,
    backend: &mut dyn Backend,
    datasets: &mut DatasetStore,
) -> Result<()> {
    match rule {
        MergeRule::Field {
            field_1,
            field_2,
            delimiter,
            new_field,
        } => {
            merge_fields(records, field_1, field_2, delimiter, new_field);
            Ok(())
        }
        MergeRule::File {
            load,
            filter_field,
            new_field,
            id_field,
        } => {
            let mapping = match datasets.load(load)? {
                Value::Object(map) => map.clone(),
                Value::Array(rows) => key_rows(rows, id_field),
                _ => {
                    return Err(FinesError::dataset(
                        load,
                        "FILE merge needs a mapping or a list of rows",
                    ))
                }
            };
            let matched = join(records, &mapping, filter_field, new_field);
            info!("FILE merge '{}' -> '{}': {} of {} matched", load, new_field, matched, records.len());
            Ok(())
        }
        MergeRule::Api {
            api_call,
            mode,
            api_root,
            id_field,
            filter_field,
            new_field,
        } => {
            let mapping = match mode {
                ApiMode::Batch => {
                    batch_lookup(records, backend, api_call, api_root.as_deref(), filter_field)?
                }
                ApiMode::Flatten => {
                    flatten_lookup(backend, api_call, api_root.as_deref(), id_field)?
                }
            };
            let matched = join(records, &mapping, filter_field, new_field);
            info!("API merge '{}' -> '{}': {} of {} matched", api_call, new_field, matched, records.len());
            Ok(())
        }
    }
}

fn merge_fields(records: &mut [Record], field_1: &str, field_2: &str, delimiter: &str, new_field: &str) {
    for record in records.iter_mut() {
        let (Some(first), Some(second)) = (record.get(field_1), record.get(field_2)) else {
            debug!(
                "Record {} lacks '{}' or '{}', not merged",
                record.id().unwrap_or("<unknown>"),
                field_1,
                field_2
            );
            continue;
        };
        let merged = format!("{}{}{}", key_text(first), delimiter, key_text(second));
        record.set(new_field, Value::String(merged));
    }
}

/// Write `mapping[key]` into `new_field` for every record whose key matches
///
/// Returns the number of records enriched.
fn join(records: &mut [Record], mapping: &Map<String, Value>, filter_field: &str, new_field: &str) -> usize {
    let mut matched = 0;
    for record in records.iter_mut() {
        let Some(key) = record.get(filter_field).map(key_text) else {
            continue;
        };
        if let Some(found) = mapping.get(&key) {
            record.set(new_field, found.clone());
            matched += 1;
        }
    }
    matched
}

/// One GET per distinct key, in first-seen order
fn batch_lookup(
    records: &[Record],
    backend: &mut dyn Backend,
    api_call: &str,
    api_root: Option<&str>,
    filter_field: &str,
) -> Result<Map<String, Value>> {
    let mut seen = HashSet::new();
    let keys: Vec<String> = records
        .iter()
        .filter_map(|record| record.get(filter_field))
        .filter(|value| !value.is_null())
        .map(key_text)
        .filter(|key| seen.insert(key.clone()))
        .collect();

    debug!("BATCH lookup '{}' for {} distinct keys", api_call, keys.len());
    let mut mapping = Map::new();
    for key in keys {
        let path = backend_path(api_call).replace(ID_PLACEHOLDER, &key);
        let response = backend.get(&path)?;
        let payload = match api_root {
            Some(root) => response.get(root).cloned().unwrap_or(Value::Null),
            None => response,
        };
        if !payload.is_null() {
            mapping.insert(key, payload);
        }
    }
    Ok(mapping)
}

/// One bulk GET; the array at `api_root` is keyed by `id_field`
fn flatten_lookup(
    backend: &mut dyn Backend,
    api_call: &str,
    api_root: Option<&str>,
    id_field: &str,
) -> Result<Map<String, Value>> {
    let path = backend_path(api_call);
    let response = backend.get(path)?;
    let entries = match api_root {
        Some(root) => response.get(root),
        None => Some(&response),
    }
    .and_then(Value::as_array)
    .ok_or_else(|| {
        FinesError::malformed_response(
            path,
            format!("expected an array at '{}'", api_root.unwrap_or("<root>")),
        )
    })?;

    Ok(key_rows(entries, id_field))
}

/// Re-key a list of rows by `id_field`; rows without it are dropped
fn key_rows(rows: &[Value], id_field: &str) -> Map<String, Value> {
    rows.iter()
        .filter_map(|row| {
            let id = row.get(id_field)?;
            Some((key_text(id), row.clone()))
        })
        .collect()
}

fn backend_path(api_call: &str) -> &str {
    api_call.strip_prefix(BASE_PLACEHOLDER).unwrap_or(api_call)
}

/// Text form of a value used as a join key or concatenation operand
fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
