//! Reliability aggregation across bundles and metrics.
//!
//! Runs the sample builder and estimator once per (bundle, metric) cell
//! and collects the results into the nested store both exporters read.

use crate::analysis::estimator::estimate_reliability;
use crate::analysis::samples::build_sample_table;
use crate::config::EstimatorConfig;
use crate::models::{IccVariant, LoadedStats, MetricKind, ReliabilityResult};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use tracing::debug;

/// Nested reliability results: bundle -> metric -> result.
///
/// The bundle key set is fixed at construction; writing to or reading
/// from an unknown bundle is an error rather than silent map creation.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    results: BTreeMap<String, BTreeMap<MetricKind, ReliabilityResult>>,
}

impl ResultStore {
    /// Create a store covering exactly the given bundles.
    pub fn new(bundles: &[String]) -> Self {
        Self {
            results: bundles
                .iter()
                .map(|bundle| (bundle.clone(), BTreeMap::new()))
                .collect(),
        }
    }

    /// Record the result for one cell. Each cell is written exactly once.
    pub fn insert(
        &mut self,
        bundle: &str,
        metric: MetricKind,
        result: ReliabilityResult,
    ) -> Result<()> {
        let cells = match self.results.get_mut(bundle) {
            Some(cells) => cells,
            None => bail!("Unknown bundle '{bundle}' in result store"),
        };

        if cells.insert(metric, result).is_some() {
            bail!("Result for {bundle}/{metric} written twice");
        }
        Ok(())
    }

    /// Look up one cell.
    pub fn get(&self, bundle: &str, metric: MetricKind) -> Result<&ReliabilityResult> {
        self.results
            .get(bundle)
            .and_then(|cells| cells.get(&metric))
            .with_context(|| format!("No result stored for {bundle}/{metric}"))
    }

    /// The bundles covered by this store, sorted.
    pub fn bundles(&self) -> impl Iterator<Item = &String> {
        self.results.keys()
    }

    /// Iterate all cells in export order: bundles sorted, metrics in
    /// their fixed analysis order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, MetricKind, &ReliabilityResult)> {
        self.results.iter().flat_map(|(bundle, cells)| {
            MetricKind::ALL
                .iter()
                .filter_map(move |metric| cells.get(metric).map(|result| (bundle, *metric, result)))
        })
    }

    /// Total number of stored cells.
    pub fn len(&self) -> usize {
        self.results.values().map(BTreeMap::len).sum()
    }

    /// Whether no cell has been stored yet.
    #[allow(dead_code)] // Utility accessor
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the reliability of every (bundle, metric) cell.
///
/// Returns the filled store and the number of cells that degenerated to
/// the zero sentinel. Cells are independent; the loop order (sorted
/// bundles, fixed metrics) fixes the export order.
pub fn compute_reliability(
    stats: &LoadedStats,
    bundles: &[String],
    variant: IccVariant,
    config: &EstimatorConfig,
    show_progress: bool,
) -> Result<(ResultStore, usize)> {
    let mut store = ResultStore::new(bundles);
    let mut shortfalls = 0;

    let progress = if show_progress {
        let pb = ProgressBar::new((bundles.len() * MetricKind::ALL.len()) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    for bundle in bundles {
        for metric in MetricKind::ALL {
            if let Some(ref pb) = progress {
                pb.set_message(format!("{bundle}/{metric}"));
            }

            let samples = build_sample_table(bundle, metric, stats)?;
            debug!(
                "{bundle}/{metric}: {} rows from {} subjects",
                samples.len(),
                samples.subject_count()
            );

            let estimate = estimate_reliability(&samples, variant, config);
            if estimate.shortfall.is_some() {
                shortfalls += 1;
            }
            store.insert(bundle, metric, estimate.reliability)?;

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    Ok((store, shortfalls))
}
