//! Merging of per-bundle agreement distributions.
//!
//! Collects the numeric values of each agreement metric across all
//! files belonging to a bundle into one flat sequence, paired with a
//! zero-valued companion sequence of the same length (reserved for a
//! second data series in the renderer).

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Merged values and their zero companion sequence.
pub type MetricSeries = (Vec<f64>, Vec<f64>);

/// Merged distributions: bundle -> metric -> (values, zeros).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct MergedDistributions(pub BTreeMap<String, BTreeMap<String, MetricSeries>>);

impl MergedDistributions {
    /// The merged series for one bundle and metric, if any file
    /// contributed to it.
    pub fn series(&self, bundle: &str, metric: &str) -> Option<&MetricSeries> {
        self.0.get(bundle).and_then(|metrics| metrics.get(metric))
    }

    /// Serialize the merged distributions to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create merged file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Failed to write merged file: {}", path.display()))?;

        info!("Wrote merged distributions to {}", path.display());
        Ok(())
    }
}

/// Merge the agreement metrics of all candidate files, bundle by bundle.
///
/// A file belongs to a bundle when its path contains the bundle id.
/// Files absent from disk are skipped without error, as is a file
/// parsing to an empty JSON object (none of its metrics are taken).
/// Every configured bundle gets an entry, even an empty one.
pub fn merge_distributions(
    bundles: &[String],
    in_jsons: &[PathBuf],
    metrics: &[String],
) -> Result<MergedDistributions> {
    let mut merged = MergedDistributions::default();

    for bundle in bundles {
        let series = merged.0.entry(bundle.clone()).or_default();

        let candidates = in_jsons
            .iter()
            .filter(|path| path.to_string_lossy().contains(bundle.as_str()));

        for path in candidates {
            if !path.is_file() {
                debug!("{}: not on disk, skipped", path.display());
                continue;
            }

            let contents = read_agreement_file(path)?;
            if contents.is_empty() {
                debug!("{}: empty, skipped", path.display());
                continue;
            }

            for metric in metrics {
                let values = match contents.get(metric) {
                    Some(values) => values,
                    None => {
                        debug!("{}: no '{metric}' values", path.display());
                        continue;
                    }
                };

                let (merged_values, zeros) = series.entry(metric.clone()).or_default();
                merged_values.extend_from_slice(values);
                zeros.resize(merged_values.len(), 0.0);
            }
        }
    }

    Ok(merged)
}

/// Read one agreement file as metric -> numeric values.
fn read_agreement_file(path: &Path) -> Result<BTreeMap<String, Vec<f64>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open agreement file: {}", path.display()))?;

    let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse agreement file: {}", path.display()))?;

    let object = match value.as_object() {
        Some(object) => object,
        None => bail!("Agreement file is not a JSON object: {}", path.display()),
    };

    let mut contents = BTreeMap::new();
    for (metric, values) in object {
        let array = match values.as_array() {
            Some(array) => array,
            None => continue, // non-list fields are not distributions
        };

        let numbers: Option<Vec<f64>> = array.iter().map(serde_json::Value::as_f64).collect();
        match numbers {
            Some(numbers) => {
                contents.insert(metric.clone(), numbers);
            }
            None => bail!(
                "Non-numeric '{metric}' values in agreement file: {}",
                path.display()
            ),
        }
    }

    Ok(contents)
}
