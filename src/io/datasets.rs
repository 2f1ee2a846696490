//! Reference data sets
//!
//! `IN_FILE` filters and `FILE` merges read named reference data from a
//! directory of files. A data set named `patrons` is read from
//! `<dir>/patrons.json` or, failing that, `<dir>/patrons.csv`. Each data set is
//! read at most once per run and cached.
//!
//! CSV files become an array of objects keyed by the header row, every value a
//! string. Fields are trimmed and rows may be ragged, matching how the
//! rest of the crate reads CSV.

use crate::types::{FinesError, Result};
use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cached loader for named reference data
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    dir: PathBuf,
    cache: HashMap<String, Value>,
}

impl DatasetStore {
    /// Create a store reading from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DatasetStore {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Register an in-memory data set under `name`, shadowing any file
    pub fn with_dataset(mut self, name: &str, data: Value) -> Self {
        self.cache.insert(name.to_string(), data);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the data set `name`, reading it from disk on first use
    ///
    /// # Errors
    ///
    /// Returns a `Dataset` error if neither file exists or the file cannot be
    /// parsed.
    pub fn load(&mut self, name: &str) -> Result<&Value> {
        if !self.cache.contains_key(name) {
            let data = self.read(name)?;
            self.cache.insert(name.to_string(), data);
        }
        self.cache
            .get(name)
            .ok_or_else(|| FinesError::dataset(name, "data set vanished from cache"))
    }

    fn read(&self, name: &str) -> Result<Value> {
        let json_path = self.dir.join(format!("{}.json", name));
        if json_path.is_file() {
            debug!("Loading data set '{}' from {}", name, json_path.display());
            let file = File::open(&json_path)
                .map_err(|e| FinesError::dataset(name, format!("{}: {}", json_path.display(), e)))?;
            return serde_json::from_reader(std::io::BufReader::new(file))
                .map_err(|e| FinesError::dataset(name, format!("{}: {}", json_path.display(), e)));
        }

        let csv_path = self.dir.join(format!("{}.csv", name));
        if csv_path.is_file() {
            debug!("Loading data set '{}' from {}", name, csv_path.display());
            return read_csv_rows(&csv_path)
                .map_err(|e| FinesError::dataset(name, format!("{}: {}", csv_path.display(), e)));
        }

        Err(FinesError::dataset(
            name,
            format!("no {0}.json or {0}.csv in {1}", name, self.dir.display()),
        ))
    }
}

/// Read a CSV file into an array of string-valued objects
fn read_csv_rows(path: &Path) -> std::result::Result<Value, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(Value::Object(object));
    }

    Ok(Value::Array(rows))
}
