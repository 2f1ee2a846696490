//! Run settings
//!
//! Settings are layered with the `config` crate: an optional file (format
//! picked from its extension) and then `FINES_`-prefixed environment variables,
//! with `__` separating nested keys (`FINES_CONNECTION__BASE_URL`). Every key
//! except the connection target has a default.

use crate::types::{ActionConfig, FinesError, MergeRule, Result, RuleConfig, UpdateRule};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FINES";

/// Backend connection settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            tenant: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 30,
            max_attempts: 5,
            backoff_base_ms: 500,
        }
    }
}

impl ConnectionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatterSettings {
    pub charge_formatters: Vec<UpdateRule>,
    pub credit_formatters: Vec<UpdateRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MergerSettings {
    pub charge_mergers: Vec<MergeRule>,
    pub credit_mergers: Vec<MergeRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub charge_filters: Vec<RuleConfig>,
    pub credit_filters: Vec<RuleConfig>,
}

/// What one run fetches and does
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Oldest charge fetched, in days before today
    pub charges_max_age: i64,
    /// Youngest charge fetched, in days before today
    pub charge_days_outstanding: i64,
    pub max_fines_to_be_pulled: u64,
    /// Width of the refund report window, ending yesterday
    pub credit_days_outstanding: i64,
    /// Directory of reference data sets
    pub datasets_dir: PathBuf,
    pub transactions_active: bool,
    pub formatters: FormatterSettings,
    pub mergers: MergerSettings,
    pub filters: FilterSettings,
    /// Named rules that action filters refer to
    pub rules: Vec<RuleConfig>,
    pub actions: Vec<ActionConfig>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            charges_max_age: 365,
            charge_days_outstanding: 0,
            max_fines_to_be_pulled: 10_000_000,
            credit_days_outstanding: 1,
            datasets_dir: PathBuf::from("dataSets"),
            transactions_active: false,
            formatters: FormatterSettings::default(),
            mergers: MergerSettings::default(),
            filters: FilterSettings::default(),
            rules: Vec::new(),
            actions: Vec::new(),
        }
    }
}

/// Everything a run is configured with
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub job: JobSettings,
    /// Named values for `ENV|<name>` indirection; override the process environment
    pub variables: HashMap<String, String>,
}

impl Settings {
    /// Load settings from `path` (if given) and the process environment
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, a value has
    /// the wrong shape, or no backend URL is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`Settings::load`], reading environment variables from `env`
    /// instead of the process when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.connection.base_url.trim().is_empty() {
            return Err(FinesError::config("connection.base_url is not set"));
        }
        if self.job.credit_days_outstanding < 1 {
            return Err(FinesError::config(
                "job.credit_days_outstanding must be at least 1",
            ));
        }
        Ok(())
    }
}
