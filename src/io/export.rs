//! Bundle export
//!
//! Writes what a run produced for delivery collaborators:
//! - the whole [`RunBundle`] as pretty-printed JSON
//! - one CSV per data set with the per-owner money totals

use crate::pipeline::RunBundle;
use crate::types::{Result, Summary};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const BUNDLE_FILE: &str = "bundle.json";
pub const CHARGE_OWNERS_FILE: &str = "charge_owners.csv";
pub const CREDIT_OWNERS_FILE: &str = "credit_owners.csv";

/// Files written by [`export_bundle`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub bundle: PathBuf,
    pub charge_owners: PathBuf,
    pub credit_owners: PathBuf,
}

/// Write the bundle as pretty JSON
///
/// # Errors
///
/// Returns an I/O or JSON error if writing fails.
pub fn write_bundle_json(bundle: &RunBundle, output: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *output, bundle)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

/// Write per-owner totals in CSV format
///
/// Columns: owner, total, remaining, record_count. Owners are sorted by name
/// for deterministic output; money is written with two decimal places.
///
/// # Arguments
///
/// * `summary` - Summary whose owner statistics are written
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Errors
///
/// Returns a CSV or I/O error if a write fails.
pub fn write_owner_csv(summary: &Summary, output: &mut dyn Write) -> Result<()> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["owner", "total", "remaining", "record_count"])?;

    // BTreeMap keeps owners sorted
    for owner in summary.owner_stats.values() {
        writer.write_record(&[
            owner.name.clone(),
            format!("{:.2}", owner.total),
            format!("{:.2}", owner.remaining),
            owner.record_count.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Write the bundle and both owner CSVs into `dir`, creating it if needed
///
/// # Errors
///
/// Returns an I/O, CSV or JSON error if any file cannot be written.
pub fn export_bundle(bundle: &RunBundle, dir: &Path) -> Result<ExportPaths> {
    fs::create_dir_all(dir)?;
    let paths = ExportPaths {
        bundle: dir.join(BUNDLE_FILE),
        charge_owners: dir.join(CHARGE_OWNERS_FILE),
        credit_owners: dir.join(CREDIT_OWNERS_FILE),
    };

    write_bundle_json(bundle, &mut create(&paths.bundle)?)?;
    write_owner_csv(&bundle.charge_data.summary.accepted, &mut create(&paths.charge_owners)?)?;
    write_owner_csv(&bundle.refund_data.summary.accepted, &mut create(&paths.credit_owners)?)?;

    info!("Exported run bundle to {}", dir.display());
    Ok(paths)
}
