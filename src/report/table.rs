//! CSV export of the aggregated reliability results.

use crate::analysis::ResultStore;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the exported table.
const TABLE_FILE: &str = "iccs.csv";

/// Write one row per (bundle, metric) cell to `iccs.csv` in the output
/// directory, returning the written path.
///
/// Row keys are `<bundle>_<metric>`; values are the ICC estimate and
/// both confidence bounds, rendered so that re-parsing reproduces the
/// stored floats exactly.
pub fn export_icc_table(store: &ResultStore, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(TABLE_FILE);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create table file: {}", path.display()))?;

    writer
        .write_record(["Bundle", "icc", "ci_lower", "ci_upper"])
        .context("Failed to write table header")?;

    for (bundle, metric, result) in store.iter() {
        writer
            .write_record([
                format!("{bundle}_{metric}"),
                result.icc.to_string(),
                result.ci_lower.to_string(),
                result.ci_upper.to_string(),
            ])
            .with_context(|| format!("Failed to write table row for {bundle}/{metric}"))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush table file: {}", path.display()))?;

    info!("Wrote {} rows to {}", store.len(), path.display());
    Ok(path)
}
