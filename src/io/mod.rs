//! I/O module
//!
//! Handles reference data input and run output.
//!
//! # Components
//!
//! - `datasets` - Named reference data sets read from JSON or CSV files
//! - `export` - Bundle JSON and per-owner CSV output

pub mod datasets;
pub mod export;

pub use datasets::DatasetStore;
pub use export::{export_bundle, write_bundle_json, write_owner_csv, ExportPaths};
