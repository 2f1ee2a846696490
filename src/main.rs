//! FOLIO Fines Engine CLI
//!
//! Runs one fines job: log in, build the charge and credit data sets, apply the
//! configured actions and export the bundle.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --config fines.toml
//! cargo run -- --config fines.toml --output-dir out --skip-credits
//! cargo run -- --config fines.toml --transactions-active --log-level debug
//! ```
//!
//! Settings are read from the file and from `FINES_`-prefixed environment
//! variables (`FINES_CONNECTION__PASSWORD`, ...). Unless transactions are
//! active, actions only record the calls they would have made.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (bad settings, login failure, backend error, export failure)

use chrono::Local;
use folio_fines_engine::client::{ApiClient, Credentials, HttpTransport, RetryPolicy};
use folio_fines_engine::{cli, export_bundle, JobRunner, NamedConfig, Result, Settings};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run(args: &cli::CliArgs) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let connection = &settings.connection;

    let transport = HttpTransport::new(&connection.base_url, &connection.tenant, connection.timeout())?;
    let credentials = Credentials::new(&connection.username, &connection.password);
    let retry = RetryPolicy::new(connection.max_attempts, connection.backoff_base());
    let mut client = ApiClient::connect(transport, credentials, retry)?;

    let vars = NamedConfig::from_env(settings.variables.clone());
    let transactions_active = settings.job.transactions_active || args.transactions_active;
    let bundle = JobRunner::new(&settings.job, vars, Local::now().date_naive())
        .transactions_active(transactions_active)
        .skip_credits(args.skip_credits)
        .run(&mut client)?;

    let paths = export_bundle(&bundle, &args.output_dir)?;
    info!("Bundle written to {}", paths.bundle.display());
    Ok(())
}

fn main() {
    // Parse command-line arguments using clap
    let args = cli::parse_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&args) {
        error!("Run aborted: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
