//! FOLIO Fines Engine Library
//! # Overview
//!
//! This library fetches outstanding fees/fines and refunds from a FOLIO
//! backend, reshapes them with declarative rules and applies configured
//! financial actions to them.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Record, rule and action configuration, statistics)
//! - [`core`] - Record transformation:
//!   - [`core::path`] - Dot-path field resolution
//!   - [`core::filter`] - Filter rules with pass/fail tallies
//!   - [`core::merge`] - Field concatenation and reference-data joins
//!   - [`core::update`] - String transforms between fields
//!   - [`core::summary`] - Grand and per-owner money totals
//! - [`client`] - Backend session with token renewal and retry
//! - [`actions`] - Pay, refund, transfer, waive, block and block removal
//! - [`pipeline`] - Charge and credit data sets and the job runner
//! - [`io`] - Reference data sets and bundle export
//! - [`config`] - Layered settings
//! - [`cli`] - CLI arguments parsing
//!
//! # Actions
//!
//! Every action runs in two phases per record:
//!
//! - **check**: ask the backend (or decide locally) whether the action is allowed
//! - **execute**: perform the mutation when the action and the run are both
//!   active, or record the call it would have made
//!
//! Outcomes are attached to each record under the action's name.

// Module declarations
pub mod actions;
pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

pub use actions::{build_action, ActionResults, BuildActions};
pub use client::{ApiClient, Credentials, HttpTransport, RetryPolicy};
pub use crate::config::Settings;
pub use crate::core::{Backend, FinancialAction, NamedConfig};
pub use io::{export_bundle, DatasetStore};
pub use pipeline::{JobRunner, RunBundle};
pub use types::{FinesError, Record, Result};
