//! Reliability estimation with degenerate-sample recovery.
//!
//! Wraps the ICC computation and converts its failure modes into the
//! zero sentinel so a single unusable (bundle, metric) cell never aborts
//! the batch.

use crate::analysis::icc::{intraclass_corr, IccFailure};
use crate::config::EstimatorConfig;
use crate::models::{IccVariant, ReliabilityResult, SampleTable};
use tracing::{debug, warn};

/// Outcome of estimating one (bundle, metric) cell.
#[derive(Debug, Clone)]
pub struct Estimate {
    /// The reported reliability (the sentinel when `shortfall` is set).
    pub reliability: ReliabilityResult,
    /// Why the estimate degenerated, if it did.
    pub shortfall: Option<IccFailure>,
}

/// Estimate the requested ICC form for one sample table.
///
/// Degenerate samples (too few ratings, or coverage the ANOVA cannot
/// tolerate) yield the 0.0/[0.0, 0.0] sentinel instead of an error.
/// Note that the sentinel is indistinguishable from a genuine zero
/// estimate in the exported table; only the logs record which one
/// happened.
pub fn estimate_reliability(
    samples: &SampleTable,
    variant: IccVariant,
    config: &EstimatorConfig,
) -> Estimate {
    match intraclass_corr(samples, config.confidence, config.min_ratings) {
        Ok(rows) => {
            for row in &rows {
                debug!(
                    "{}: icc={:.4} ci=[{:.4}, {:.4}] F={:.3} df=({}, {})",
                    row.variant, row.icc, row.ci_lower, row.ci_upper, row.f_value, row.df1, row.df2
                );
            }

            let row = &rows[variant.row_index()];
            Estimate {
                reliability: ReliabilityResult {
                    icc: row.icc,
                    ci_lower: row.ci_lower,
                    ci_upper: row.ci_upper,
                },
                shortfall: None,
            }
        }
        Err(failure) => {
            warn!("ICC not computable ({failure}), reporting zero sentinel");
            Estimate {
                reliability: ReliabilityResult::sentinel(),
                shortfall: Some(failure),
            }
        }
    }
}
