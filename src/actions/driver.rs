//! Action driver
//!
//! [`BuildActions`] runs every configured action in declaration order:
//!
//! 1. take a copy of the pool the action targets (charges or credits)
//! 2. apply the action's filters to it
//! 3. `check` each record and, when the check allowed it, `execute` it
//!    before moving on to the next record
//! 4. keep the result as the action's output set, and copy each record's
//!    outcomes back onto the pool and the full data set
//! 5. with `stop_processing`, drop the output set from the pool so later
//!    actions never see those records
//!
//! Every action type is resolved before the first record is touched, so an
//! unknown type aborts the run with no backend mutation performed.

use crate::actions::build_action;
use crate::core::filter::FilterEngine;
use crate::core::traits::{Backend, FinancialAction};
use crate::core::vars::NamedConfig;
use crate::io::DatasetStore;
use crate::types::{
    ActionConfig, ActionOn, FilterRef, FilterStats, FinesError, Record, Result, RuleConfig,
};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Output set of one action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    pub name: String,
    pub records: Vec<Record>,
}

/// Everything the driver produced, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResults {
    pub outputs: Vec<ActionOutput>,
    /// Tallies of the per-action filters
    pub filters: FilterStats,
    /// Records rejected by per-action filters with `log_error`
    pub errors: Vec<Record>,
}

impl ActionResults {
    /// Output set of the action called `name`
    pub fn output(&self, name: &str) -> Option<&[Record]> {
        self.outputs
            .iter()
            .find(|output| output.name == name)
            .map(|output| output.records.as_slice())
    }

    /// Same shape as a data set: `data` maps each action name to its output
    /// set, `error` holds the filter rejects and `summary` the filter tallies
    pub fn to_json(&self) -> Value {
        let data: Map<String, Value> = self
            .outputs
            .iter()
            .map(|output| {
                let records = output.records.iter().map(Record::to_json).collect();
                (output.name.clone(), Value::Array(records))
            })
            .collect();
        json!({
            "data": data,
            "error": self.errors.iter().map(Record::to_json).collect::<Vec<_>>(),
            "summary": self.filters.to_json(),
        })
    }
}

impl Serialize for ActionResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Charge and credit data sets the actions run over
///
/// Outcomes recorded by the actions are copied back onto these records.
#[derive(Debug)]
pub struct ActionPools<'p> {
    pub charges: &'p mut [Record],
    pub credits: &'p mut [Record],
}

type PlannedAction<'a> = (&'a ActionConfig, Box<dyn FinancialAction>, Vec<RuleConfig>);

/// Sequences configured actions over the record pools
pub struct BuildActions<'a> {
    configs: &'a [ActionConfig],
    catalog: &'a [RuleConfig],
    transactions_active: bool,
}

impl<'a> BuildActions<'a> {
    /// # Arguments
    ///
    /// * `configs` - Actions in the order they run
    /// * `catalog` - Named rules that action filters may refer to
    /// * `transactions_active` - Run-level switch; when false no action mutates
    pub fn new(configs: &'a [ActionConfig], catalog: &'a [RuleConfig], transactions_active: bool) -> Self {
        BuildActions {
            configs,
            catalog,
            transactions_active,
        }
    }

    /// Resolve every action's filter references against the catalog
    fn filters_for(&self, config: &ActionConfig) -> Result<Vec<RuleConfig>> {
        config
            .filters
            .iter()
            .map(|filter| match filter {
                FilterRef::Inline(rule) => Ok((**rule).clone()),
                FilterRef::Named(name) => self
                    .catalog
                    .iter()
                    .find(|rule| &rule.name == name)
                    .cloned()
                    .ok_or_else(|| {
                        FinesError::config(format!(
                            "action '{}' refers to unknown rule '{}'",
                            config.name, name
                        ))
                    }),
            })
            .collect()
    }

    fn plan(&self) -> Result<Vec<PlannedAction<'a>>> {
        self.configs
            .iter()
            .map(|config| {
                let action = build_action(config, self.transactions_active)?;
                let filters = self.filters_for(config)?;
                Ok((config, action, filters))
            })
            .collect()
    }

    /// Check every action type and filter reference without touching records
    ///
    /// # Errors
    ///
    /// Returns `UnknownActionType` or a configuration error for the first
    /// action that cannot be built.
    pub fn validate(&self) -> Result<()> {
        self.plan().map(|_| ())
    }

    /// Run every configured action
    ///
    /// # Errors
    ///
    /// Fails before any record is processed if an action type or a filter
    /// reference is unknown. Afterwards, any backend or filter error aborts the
    /// run; mutations already performed are not reverted.
    pub fn run(
        &self,
        pools: ActionPools<'_>,
        backend: &mut dyn Backend,
        vars: &NamedConfig,
        datasets: &mut DatasetStore,
    ) -> Result<ActionResults> {
        let planned = self.plan()?;

        let ActionPools { charges, credits } = pools;
        let mut charge_pool = charges.to_vec();
        let mut credit_pool = credits.to_vec();
        let mut filter_engine = FilterEngine::new();
        let mut outputs = Vec::with_capacity(planned.len());

        for (config, action, filters) in planned {
            let (pool, data_set) = match config.action_on {
                ActionOn::Charges => (&mut charge_pool, &mut *charges),
                ActionOn::Credits => (&mut credit_pool, &mut *credits),
            };

            let mut working = pool.clone();
            for rule in &filters {
                working = filter_engine.apply(working, rule, vars, datasets)?;
            }

            let executed = run_action(action.as_ref(), backend, &mut working)?;
            info!(
                "Action '{}' ({}): {} records, {} executed",
                config.name,
                config.action_type,
                working.len(),
                executed
            );

            sync_outcomes(pool, &working);
            sync_outcomes(data_set, &working);
            if config.stop_processing {
                remove_records(pool, &working);
                info!(
                    "Action '{}' stops processing: {} records left in pool",
                    config.name,
                    pool.len()
                );
            }

            outputs.push(ActionOutput {
                name: config.name.clone(),
                records: working,
            });
        }

        let (filters, errors) = filter_engine.into_parts();
        Ok(ActionResults {
            outputs,
            filters,
            errors,
        })
    }
}

/// Check every record, execute the allowed ones; returns the execute count
fn run_action(
    action: &dyn FinancialAction,
    backend: &mut dyn Backend,
    records: &mut [Record],
) -> Result<usize> {
    let mut executed = 0;
    for record in records.iter_mut() {
        action.check(backend, record)?;
        let allowed = record
            .outcome(action.name())
            .is_some_and(|outcome| outcome.allowed());
        if allowed {
            action.execute(backend, record)?;
            executed += 1;
        }
    }
    Ok(executed)
}

/// Find the counterpart of `record` in `processed`, by id when it has one
fn counterpart<'p>(
    record: &Record,
    by_id: &HashMap<&str, &'p Record>,
    processed: &'p [Record],
) -> Option<&'p Record> {
    match record.id() {
        Some(id) => by_id.get(id).copied(),
        None => processed.iter().find(|p| p.same_record(record)),
    }
}

fn index_by_id(records: &[Record]) -> HashMap<&str, &Record> {
    records
        .iter()
        .filter_map(|record| record.id().map(|id| (id, record)))
        .collect()
}

fn sync_outcomes(target: &mut [Record], processed: &[Record]) {
    let by_id = index_by_id(processed);
    for record in target.iter_mut() {
        if let Some(source) = counterpart(record, &by_id, processed) {
            record.absorb_outcomes(source);
        }
    }
}

fn remove_records(pool: &mut Vec<Record>, processed: &[Record]) {
    let ids: HashSet<&str> = processed.iter().filter_map(Record::id).collect();
    pool.retain(|record| match record.id() {
        Some(id) => !ids.contains(id),
        None => !processed.iter().any(|p| p.same_record(record)),
    });
}
