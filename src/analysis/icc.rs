//! Intraclass correlation estimation.
//!
//! Computes the six standard ICC forms (McGraw & Wong) with confidence
//! intervals from a long-format sample table, treating the subject as
//! the target and the session label as the rater. Subjects with
//! incomplete session coverage are omitted before the ANOVA, matching an
//! "omit missing" policy.

use crate::models::{IccVariant, SampleTable};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// One row of the estimator's output table.
#[derive(Debug, Clone)]
pub struct IccRow {
    /// The ICC form this row reports.
    pub variant: IccVariant,
    /// Point estimate.
    pub icc: f64,
    /// Lower confidence bound.
    pub ci_lower: f64,
    /// Upper confidence bound.
    pub ci_upper: f64,
    /// F statistic of the form's significance test.
    pub f_value: f64,
    /// Numerator degrees of freedom.
    pub df1: f64,
    /// Denominator degrees of freedom.
    pub df2: f64,
}

/// Why an ICC table could not be computed from a sample table.
///
/// Every variant is recovered by the caller with the zero sentinel; the
/// distinction only matters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IccFailure {
    /// Fewer usable ratings than the estimator's minimum.
    #[error("only {available} usable ratings, {required} required")]
    TooFewRatings { required: usize, available: usize },

    /// After omitting subjects with incomplete session coverage, the
    /// design is too sparse for a two-way ANOVA.
    #[error("{subjects} complete subjects x {sessions} sessions left after omitting missing values")]
    SparseCoverage { subjects: usize, sessions: usize },

    /// The same (subject, session) pair was observed twice.
    #[error("duplicate observation for {subject}/{session}")]
    DuplicateObservation { subject: String, session: String },
}

/// Compute all six ICC forms and their confidence intervals.
///
/// Rows are returned in `IccVariant::ALL` order; `IccVariant::row_index`
/// indexes into the result.
pub fn intraclass_corr(
    samples: &SampleTable,
    confidence: f64,
    min_ratings: usize,
) -> Result<Vec<IccRow>, IccFailure> {
    if samples.len() < min_ratings {
        return Err(IccFailure::TooFewRatings {
            required: min_ratings,
            available: samples.len(),
        });
    }

    let (matrix, n, k) = pivot(samples)?;

    // Two-way ANOVA mean squares on the complete n x k matrix.
    let n_f = n as f64;
    let k_f = k as f64;
    let grand_mean = matrix.iter().flatten().sum::<f64>() / (n_f * k_f);

    let row_means: Vec<f64> = matrix
        .iter()
        .map(|row| row.iter().sum::<f64>() / k_f)
        .collect();
    let col_means: Vec<f64> = (0..k)
        .map(|j| matrix.iter().map(|row| row[j]).sum::<f64>() / n_f)
        .collect();

    let ss_subjects: f64 = k_f
        * row_means
            .iter()
            .map(|m| (m - grand_mean).powi(2))
            .sum::<f64>();
    let ss_sessions: f64 = n_f
        * col_means
            .iter()
            .map(|m| (m - grand_mean).powi(2))
            .sum::<f64>();
    let ss_total: f64 = matrix
        .iter()
        .flatten()
        .map(|x| (x - grand_mean).powi(2))
        .sum();
    let ss_error = ss_total - ss_subjects - ss_sessions;

    let df_subjects = n_f - 1.0;
    let df_sessions = k_f - 1.0;
    let df_error = (n_f - 1.0) * (k_f - 1.0);
    let df_within = n_f * (k_f - 1.0);

    let msb = ss_subjects / df_subjects;
    let msj = ss_sessions / df_sessions;
    let mse = ss_error / df_error;
    let msw = (ss_sessions + ss_error) / df_within;

    // Point estimates (McGraw & Wong).
    let icc1 = (msb - msw) / (msb + (k_f - 1.0) * msw);
    let icc2 = (msb - mse) / (msb + (k_f - 1.0) * mse + k_f * (msj - mse) / n_f);
    let icc3 = (msb - mse) / (msb + (k_f - 1.0) * mse);
    let icc1k = (msb - msw) / msb;
    let icc2k = (msb - mse) / (msb + (msj - mse) / n_f);
    let icc3k = (msb - mse) / msb;

    let f1 = msb / msw;
    let f23 = msb / mse;

    // Confidence bounds.
    let alpha = 1.0 - confidence;
    let p = 1.0 - alpha / 2.0;

    let f1_lower = f1 / f_quantile(p, df_subjects, df_within);
    let f1_upper = f1 * f_quantile(p, df_within, df_subjects);
    let l1 = (f1_lower - 1.0) / (f1_lower + k_f - 1.0);
    let u1 = (f1_upper - 1.0) / (f1_upper + k_f - 1.0);

    let f3_lower = f23 / f_quantile(p, df_subjects, df_error);
    let f3_upper = f23 * f_quantile(p, df_error, df_subjects);
    let l3 = (f3_lower - 1.0) / (f3_lower + k_f - 1.0);
    let u3 = (f3_upper - 1.0) / (f3_upper + k_f - 1.0);

    // Case 2 uses a Satterthwaite approximation of the denominator
    // degrees of freedom.
    let fj = msj / mse;
    let scale = n_f * (1.0 + (k_f - 1.0) * icc2) - k_f * icc2;
    let v_num = df_error * (k_f * icc2 * fj + scale).powi(2);
    let v_den = df_subjects * k_f.powi(2) * icc2.powi(2) * fj.powi(2) + scale.powi(2);
    let v = v_num / v_den;

    let f2_upper = f_quantile(p, df_subjects, v);
    let f2_lower = f_quantile(p, v, df_subjects);
    let l2 = n_f * (msb - f2_upper * mse)
        / (f2_upper * (k_f * msj + (k_f * n_f - k_f - n_f) * mse) + n_f * msb);
    let u2 = n_f * (f2_lower * msb - mse)
        / (k_f * msj + (k_f * n_f - k_f - n_f) * mse + n_f * f2_lower * msb);

    let rows = vec![
        IccRow {
            variant: IccVariant::Icc1,
            icc: icc1,
            ci_lower: l1,
            ci_upper: u1,
            f_value: f1,
            df1: df_subjects,
            df2: df_within,
        },
        IccRow {
            variant: IccVariant::Icc2,
            icc: icc2,
            ci_lower: l2,
            ci_upper: u2,
            f_value: f23,
            df1: df_subjects,
            df2: df_error,
        },
        IccRow {
            variant: IccVariant::Icc3,
            icc: icc3,
            ci_lower: l3,
            ci_upper: u3,
            f_value: f23,
            df1: df_subjects,
            df2: df_error,
        },
        IccRow {
            variant: IccVariant::Icc1k,
            icc: icc1k,
            ci_lower: 1.0 - 1.0 / f1_lower,
            ci_upper: 1.0 - 1.0 / f1_upper,
            f_value: f1,
            df1: df_subjects,
            df2: df_within,
        },
        IccRow {
            variant: IccVariant::Icc2k,
            icc: icc2k,
            ci_lower: l2 * k_f / (1.0 + l2 * (k_f - 1.0)),
            ci_upper: u2 * k_f / (1.0 + u2 * (k_f - 1.0)),
            f_value: f23,
            df1: df_subjects,
            df2: df_error,
        },
        IccRow {
            variant: IccVariant::Icc3k,
            icc: icc3k,
            ci_lower: l3 * k_f / (1.0 + l3 * (k_f - 1.0)),
            ci_upper: u3 * k_f / (1.0 + u3 * (k_f - 1.0)),
            f_value: f23,
            df1: df_subjects,
            df2: df_error,
        },
    ];

    Ok(rows)
}

/// Pivot the long-format table into a complete subject x session matrix.
///
/// The session axis is the sorted union of session labels; subjects
/// missing any of them are omitted.
fn pivot(samples: &SampleTable) -> Result<(Vec<Vec<f64>>, usize, usize), IccFailure> {
    let sessions: BTreeSet<&str> = samples.iter().map(|row| row.session.as_str()).collect();

    let mut by_subject: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    for row in samples.iter() {
        let cells = by_subject.entry(row.subject.as_str()).or_default();
        if cells.insert(row.session.as_str(), row.value).is_some() {
            return Err(IccFailure::DuplicateObservation {
                subject: row.subject.clone(),
                session: row.session.clone(),
            });
        }
    }

    let matrix: Vec<Vec<f64>> = by_subject
        .values()
        .filter(|cells| cells.len() == sessions.len())
        .map(|cells| cells.values().copied().collect())
        .collect();

    let n = matrix.len();
    let k = sessions.len();
    if n < 2 || k < 2 {
        return Err(IccFailure::SparseCoverage {
            subjects: n,
            sessions: k,
        });
    }

    Ok((matrix, n, k))
}

/// Quantile of the F distribution, NaN when the distribution cannot be
/// constructed (mirrors the permissive behavior of scipy's `f.ppf`).
fn f_quantile(p: f64, df1: f64, df2: f64) -> f64 {
    if !(0.0..1.0).contains(&p) {
        return f64::NAN;
    }

    FisherSnedecor::new(df1, df2)
        .map(|dist| dist.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;

    fn sample_table(rows: &[(&str, &str, f64)]) -> SampleTable {
        let mut table = SampleTable::new();
        for (subject, session, value) in rows {
            table.push(Observation {
                subject: subject.to_string(),
                session: session.to_string(),
                value: *value,
            });
        }
        table
    }

    /// Three subjects, two sessions, clearly separated subjects with
    /// small within-subject noise.
    fn clean_samples() -> SampleTable {
        sample_table(&[
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
            ("sub-02", "ses-2", 58.0),
            ("sub-03", "ses-1", 100.0),
            ("sub-03", "ses-2", 103.0),
        ])
    }

    #[test]
    fn test_output_rows_match_variant_enumeration_order() {
        let rows = intraclass_corr(&clean_samples(), 0.95, 5).unwrap();

        assert_eq!(rows.len(), IccVariant::ALL.len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.variant, IccVariant::ALL[i]);
            assert_eq!(row.variant.row_index(), i);
        }
    }

    #[test]
    fn test_too_few_ratings() {
        let samples = sample_table(&[
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
            ("sub-02", "ses-2", 58.0),
        ]);

        let err = intraclass_corr(&samples, 0.95, 5).unwrap_err();
        assert_eq!(
            err,
            IccFailure::TooFewRatings {
                required: 5,
                available: 4
            }
        );
    }

    #[test]
    fn test_sparse_coverage_after_omission() {
        // Only sub-01 covers both sessions; everyone else is omitted.
        let samples = sample_table(&[
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
            ("sub-03", "ses-2", 70.0),
            ("sub-04", "ses-1", 90.0),
        ]);

        let err = intraclass_corr(&samples, 0.95, 5).unwrap_err();
        assert_eq!(
            err,
            IccFailure::SparseCoverage {
                subjects: 1,
                sessions: 2
            }
        );
    }

    #[test]
    fn test_duplicate_observation() {
        let samples = sample_table(&[
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-1", 81.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
            ("sub-02", "ses-2", 58.0),
        ]);

        let err = intraclass_corr(&samples, 0.95, 5).unwrap_err();
        assert!(matches!(err, IccFailure::DuplicateObservation { .. }));
    }

    #[test]
    fn test_clean_data_point_estimates() {
        let rows = intraclass_corr(&clean_samples(), 0.95, 5).unwrap();

        // Hand-computed from the ANOVA mean squares of the fixture
        // (msb = 903.5, msj = 1.5, mse = 3.5, msw = 8.5/3).
        let icc2 = rows[IccVariant::Icc2.row_index()].icc;
        assert!((icc2 - 0.993743).abs() < 1e-5, "icc2 = {icc2}");

        let icc3 = rows[IccVariant::Icc3.row_index()].icc;
        assert!((icc3 - 900.0 / 907.0).abs() < 1e-9, "icc3 = {icc3}");

        let icc3k = rows[IccVariant::Icc3k.row_index()].icc;
        assert!((icc3k - 900.0 / 903.5).abs() < 1e-9, "icc3k = {icc3k}");
    }

    #[test]
    fn test_clean_data_interval_brackets_estimate() {
        let rows = intraclass_corr(&clean_samples(), 0.95, 5).unwrap();

        for row in &rows {
            assert!(
                (-1.0..=1.0).contains(&row.icc),
                "{}: icc {} out of range",
                row.variant,
                row.icc
            );
            assert!(
                row.ci_lower <= row.icc && row.icc <= row.ci_upper,
                "{}: [{}, {}] does not bracket {}",
                row.variant,
                row.ci_lower,
                row.ci_upper,
                row.icc
            );
        }
    }

    #[test]
    fn test_separated_subjects_yield_high_icc() {
        let rows = intraclass_corr(&clean_samples(), 0.95, 5).unwrap();
        assert!(rows[IccVariant::Icc2.row_index()].icc > 0.9);
    }

    #[test]
    fn test_lower_min_ratings_admits_two_by_two() {
        let samples = sample_table(&[
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
            ("sub-02", "ses-2", 58.0),
        ]);

        let rows = intraclass_corr(&samples, 0.95, 4).unwrap();
        let icc2 = rows[IccVariant::Icc2.row_index()].icc;
        assert!((icc2 - 480.0 / 484.0).abs() < 1e-9);
    }

    #[test]
    fn test_f_quantile_handles_bad_inputs() {
        assert!(f_quantile(1.5, 2.0, 2.0).is_nan());
        assert!(f_quantile(0.975, 0.0, 2.0).is_nan());
        assert!(f_quantile(0.975, 2.0, 2.0) > 1.0);
    }
}
