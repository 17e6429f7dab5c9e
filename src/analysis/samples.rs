//! Repeated-measures sample construction.
//!
//! Reshapes acquisition-indexed metric values into the long-format
//! (subject, session, value) table the reliability estimator consumes.

use crate::models::{LoadedStats, MetricKind, Observation, SampleTable};
use anyhow::{bail, Context, Result};
use tracing::debug;

/// Build the sample table for one (bundle, metric) pair.
///
/// Subjects are visited in stable (sorted) order and their acquisitions
/// in mapping-list order. Acquisitions lacking the target bundle are
/// skipped; the bundle may not be present for every acquisition, e.g.
/// after an upstream segmentation failure. A subject with no matching
/// acquisition simply contributes no rows.
pub fn build_sample_table(
    bundle: &str,
    metric: MetricKind,
    stats: &LoadedStats,
) -> Result<SampleTable> {
    let table = stats.table_for(metric);
    let mut samples = SampleTable::new();

    for (subject, acquisitions) in stats.subjects.iter() {
        for acquisition in acquisitions {
            let entry = match table.bundle_entry(acquisition, bundle) {
                Some(entry) => entry,
                None => {
                    debug!("{acquisition}: no {bundle} entry, skipped");
                    continue;
                }
            };

            let value = metric_value(entry, metric)
                .with_context(|| format!("In {metric} entry for {acquisition}/{bundle}"))?;

            samples.push(Observation {
                subject: subject.clone(),
                session: session_label(subject, acquisition),
                value,
            });
        }
    }

    Ok(samples)
}

/// Session label: the acquisition id with the subject prefix stripped.
///
/// An acquisition id that does not carry the prefix keeps its full id as
/// the label.
fn session_label(subject: &str, acquisition: &str) -> String {
    acquisition
        .strip_prefix(&format!("{subject}_"))
        .unwrap_or(acquisition)
        .to_string()
}

/// Extract the numeric metric field from a bundle entry.
fn metric_value(entry: &crate::models::BundleFields, metric: MetricKind) -> Result<f64> {
    let field = metric.field_name();
    let value = match entry.get(field) {
        Some(value) => value,
        None => bail!("Missing field '{field}'"),
    };

    match value.as_f64() {
        Some(number) => Ok(number),
        None => bail!("Field '{field}' is not numeric: {value}"),
    }
}
