//! Run-scoped named configuration
//!
//! Rule values of the form `ENV|<name>` are indirections into a set of named
//! values fixed for the duration of a run. [`NamedConfig`] is built once at run
//! start from a snapshot of the process environment overlaid with the
//! `variables` table from settings, and is passed explicitly to every stage
//! that needs it.

use crate::types::{FinesError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Prefix marking an indirection in a rule value
pub const INDIRECTION_PREFIX: &str = "ENV|";

/// Named values available to `ENV|<name>` indirections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedConfig {
    values: HashMap<String, String>,
}

impl NamedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment, then apply `overrides` on top
    pub fn from_env<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values: HashMap<String, String> = std::env::vars().collect();
        values.extend(overrides);
        NamedConfig { values }
    }

    /// Add or replace one named value
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Resolve a rule value, following an `ENV|<name>` indirection if present
    ///
    /// Non-string values and strings without the prefix are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedVariable` when the named value does not exist.
    pub fn resolve(&self, rule: &str, value: &Value) -> Result<Value> {
        let Some(name) = value.as_str().and_then(|s| s.strip_prefix(INDIRECTION_PREFIX)) else {
            return Ok(value.clone());
        };
        let name = name.trim();

        self.lookup(name)
            .map(|resolved| Value::String(resolved.to_string()))
            .ok_or_else(|| FinesError::unresolved_variable(name, rule))
    }
}
