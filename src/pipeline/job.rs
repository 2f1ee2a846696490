//! Job runner
//!
//! One run: validate the configured actions, build the charge and credit data
//! sets, run the actions over them and hand back the [`RunBundle`].

use crate::actions::{ActionPools, ActionResults, BuildActions};
use crate::config::JobSettings;
use crate::core::{Backend, NamedConfig};
use crate::io::DatasetStore;
use crate::pipeline::credits::CREDIT_LABEL;
use crate::pipeline::{BuildContext, ChargeBuilder, CreditBuilder, DataSet};
use crate::types::Result;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Everything a run produced, handed to exporters
#[derive(Debug, Clone, PartialEq)]
pub struct RunBundle {
    pub charge_data: DataSet,
    pub refund_data: DataSet,
    pub process_data: ActionResults,
}

impl RunBundle {
    pub fn to_json(&self) -> Value {
        json!({
            "charge_data": self.charge_data.to_json(),
            "refund_data": self.refund_data.to_json(),
            "process_data": self.process_data.to_json(),
        })
    }
}

impl Serialize for RunBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

pub struct JobRunner<'a> {
    job: &'a JobSettings,
    vars: NamedConfig,
    today: NaiveDate,
    transactions_active: bool,
    skip_credits: bool,
}

impl<'a> JobRunner<'a> {
    /// # Arguments
    ///
    /// * `job` - Rules, actions and fetch windows
    /// * `vars` - Named values for `ENV|<name>` filter values
    /// * `today` - Reference date of the fetch windows
    pub fn new(job: &'a JobSettings, vars: NamedConfig, today: NaiveDate) -> Self {
        JobRunner {
            job,
            vars,
            today,
            transactions_active: job.transactions_active,
            skip_credits: false,
        }
    }

    /// Override the configured transactions-active switch
    pub fn transactions_active(mut self, active: bool) -> Self {
        self.transactions_active = active;
        self
    }

    /// Leave the credit data set empty without calling the refund report
    pub fn skip_credits(mut self, skip: bool) -> Self {
        self.skip_credits = skip;
        self
    }

    /// Run the whole job against `backend`
    ///
    /// # Errors
    ///
    /// Configuration errors in the actions abort before any backend call.
    /// Any later error aborts the run; backend mutations already performed
    /// stay in place.
    pub fn run(&self, backend: &mut dyn Backend) -> Result<RunBundle> {
        let actions = BuildActions::new(&self.job.actions, &self.job.rules, self.transactions_active);
        actions.validate()?;
        if !self.transactions_active {
            warn!("Transactions inactive: actions will only record what they would do");
        }

        let mut datasets = DatasetStore::new(&self.job.datasets_dir);

        let mut charge_data = ChargeBuilder::new(self.job, self.today).build(BuildContext {
            backend: &mut *backend,
            vars: &self.vars,
            datasets: &mut datasets,
        })?;

        let mut refund_data = if self.skip_credits {
            info!("Skipping credit data set");
            DataSet::empty(CREDIT_LABEL)
        } else {
            CreditBuilder::new(self.job, self.today).build(BuildContext {
                backend: &mut *backend,
                vars: &self.vars,
                datasets: &mut datasets,
            })?
        };

        let process_data = actions.run(
            ActionPools {
                charges: &mut charge_data.data,
                credits: &mut refund_data.data,
            },
            backend,
            &self.vars,
            &mut datasets,
        )?;
        info!("Run complete: {} actions applied", process_data.outputs.len());

        Ok(RunBundle {
            charge_data,
            refund_data,
            process_data,
        })
    }
}
