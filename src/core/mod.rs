//! Core record-transformation logic
//!
//! This module contains the pipeline engines and the seams they run against:
//! - `path` - Dot-path resolution over nested JSON objects
//! - `vars` - Run-scoped named values for `ENV|<name>` indirections
//! - `filter` - Rule evaluation, partitioning and pass/fail tallies
//! - `merge` - Field concatenation and reference-data joins
//! - `update` - String transforms between paths
//! - `summary` - Grand and per-owner money totals
//! - `processor` - Runs formatters, mergers and filters over one data set
//! - `traits` - `Backend` and `FinancialAction` abstractions

pub mod filter;
pub mod merge;
pub mod path;
pub mod processor;
pub mod summary;
pub mod traits;
pub mod update;
pub mod vars;

#[cfg(test)]
pub(crate) mod testing;

pub use filter::FilterEngine;
pub use processor::{Processed, RecordProcessor, StageRules};
pub use summary::summarize;
pub use traits::{Backend, FinancialAction};
pub use vars::NamedConfig;
