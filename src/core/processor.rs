//! Record processor
//!
//! Runs the configured rule lists over one data set in a fixed order:
//! formatters (field updates), then mergers, then filters. The filter tallies
//! and the error collection belong to the processor, so one processor is used
//! per data set and its results are read back once with
//! [`RecordProcessor::finish`].

use crate::core::filter::FilterEngine;
use crate::core::traits::Backend;
use crate::core::vars::NamedConfig;
use crate::core::{merge, update};
use crate::io::DatasetStore;
use crate::types::{FilterStats, MergeRule, Record, Result, RuleConfig, UpdateRule};
use tracing::info;

/// Rule lists applied to one data set
#[derive(Debug, Clone, Copy, Default)]
pub struct StageRules<'r> {
    pub formatters: &'r [UpdateRule],
    pub mergers: &'r [MergeRule],
    pub filters: &'r [RuleConfig],
}

/// What is left after every stage has run
#[derive(Debug, Clone, Default)]
pub struct Processed {
    /// Records that passed every filter
    pub accepted: Vec<Record>,
    /// Rejected records from `log_error` rules, with their `errorCode`
    pub errors: Vec<Record>,
    pub stats: FilterStats,
}

/// Coordinates the update, merge and filter engines for one data set
pub struct RecordProcessor<'a> {
    vars: &'a NamedConfig,
    datasets: &'a mut DatasetStore,
    filters: FilterEngine,
}

impl<'a> RecordProcessor<'a> {
    pub fn new(vars: &'a NamedConfig, datasets: &'a mut DatasetStore) -> Self {
        RecordProcessor {
            vars,
            datasets,
            filters: FilterEngine::new(),
        }
    }

    /// Apply field updates in order
    pub fn format(&mut self, records: &mut [Record], rules: &[UpdateRule]) {
        for rule in rules {
            update::apply(records, rule);
        }
    }

    /// Apply merges in order
    ///
    /// # Errors
    ///
    /// Propagates data-set and backend failures from the merge engine.
    pub fn merge(
        &mut self,
        records: &mut [Record],
        rules: &[MergeRule],
        backend: &mut dyn Backend,
    ) -> Result<()> {
        for rule in rules {
            merge::apply(records, rule, backend, self.datasets)?;
        }
        Ok(())
    }

    /// Apply filters in order, each to the survivors of the one before
    ///
    /// # Errors
    ///
    /// Propagates configuration errors from the filter engine.
    pub fn filter(&mut self, mut records: Vec<Record>, rules: &[RuleConfig]) -> Result<Vec<Record>> {
        for rule in rules {
            records = self.filters.apply(records, rule, self.vars, self.datasets)?;
        }
        Ok(records)
    }

    /// Run formatters, mergers and filters over `records`
    pub fn run(
        &mut self,
        mut records: Vec<Record>,
        rules: StageRules<'_>,
        backend: &mut dyn Backend,
    ) -> Result<Vec<Record>> {
        let input = records.len();
        self.format(&mut records, rules.formatters);
        self.merge(&mut records, rules.mergers, backend)?;
        let accepted = self.filter(records, rules.filters)?;
        info!(
            "Processed {} records: {} accepted, {} logged as errors",
            input,
            accepted.len(),
            self.filters.errors().len()
        );
        Ok(accepted)
    }

    /// Hand back the tallies and error collection together with `accepted`
    pub fn finish(self, accepted: Vec<Record>) -> Processed {
        let (stats, errors) = self.filters.into_parts();
        Processed {
            accepted,
            errors,
            stats,
        }
    }
}
