use clap::Parser;
use std::path::PathBuf;

/// Apply configured rules and financial actions to outstanding fees/fines
#[derive(Parser, Debug)]
#[command(name = "fines-engine")]
#[command(about = "Apply configured rules and financial actions to outstanding fees/fines", long_about = None)]
pub struct CliArgs {
    /// Settings file (TOML, JSON or YAML)
    #[arg(
        long = "config",
        value_name = "FILE",
        env = "FINES_CONFIG",
        help = "Path to the settings file"
    )]
    pub config: Option<PathBuf>,

    /// Directory the run bundle is exported to
    #[arg(
        long = "output-dir",
        value_name = "DIR",
        default_value = "output",
        help = "Directory for bundle.json and the owner CSVs"
    )]
    pub output_dir: PathBuf,

    /// Perform real mutations, overriding the configured switch
    #[arg(
        long = "transactions-active",
        help = "Let active actions perform real backend mutations"
    )]
    pub transactions_active: bool,

    /// Do not fetch the refund report
    #[arg(long = "skip-credits", help = "Skip the credit data set")]
    pub skip_credits: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        help = "Log level or filter directive (e.g. debug, folio_fines_engine=trace)"
    )]
    pub log_level: String,
}
