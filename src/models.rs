//! Data models for the reliability pipeline.
//!
//! This module contains the core data structures used throughout
//! the application for representing metric tables, repeated-measures
//! samples, and reliability results.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// One of the three tractometry metrics analyzed per bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    /// Mean streamline length of the bundle.
    Length,
    /// Bundle volume.
    Volume,
    /// Number of streamlines in the bundle.
    StreamlineCount,
}

impl MetricKind {
    /// Fixed analysis order; every loop and exporter iterates metrics in
    /// this order.
    pub const ALL: [MetricKind; 3] = [
        MetricKind::Length,
        MetricKind::Volume,
        MetricKind::StreamlineCount,
    ];

    /// Name of the numeric field carrying this metric in its source table.
    pub fn field_name(&self) -> &'static str {
        match self {
            MetricKind::Length => "mean_length",
            MetricKind::Volume => "volume",
            MetricKind::StreamlineCount => "streamline_count",
        }
    }

    /// Short label used in table row keys and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Length => "length",
            MetricKind::Volume => "volume",
            MetricKind::StreamlineCount => "streamline_count",
        }
    }

    /// Capitalized label for the chart legend.
    pub fn legend_label(&self) -> &'static str {
        match self {
            MetricKind::Length => "Length",
            MetricKind::Volume => "Volume",
            MetricKind::StreamlineCount => "Streamline_count",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One of the six standard ICC forms (McGraw & Wong).
///
/// The declaration order is the row order of the estimator's output
/// table; `row_index` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IccVariant {
    /// One-way random effects, single measures.
    Icc1,
    /// Two-way random effects, single measures, absolute agreement.
    Icc2,
    /// Two-way mixed effects, single measures, consistency.
    Icc3,
    /// One-way random effects, average measures.
    Icc1k,
    /// Two-way random effects, average measures, absolute agreement.
    Icc2k,
    /// Two-way mixed effects, average measures, consistency.
    Icc3k,
}

impl IccVariant {
    /// All variants in estimator output order.
    pub const ALL: [IccVariant; 6] = [
        IccVariant::Icc1,
        IccVariant::Icc2,
        IccVariant::Icc3,
        IccVariant::Icc1k,
        IccVariant::Icc2k,
        IccVariant::Icc3k,
    ];

    /// Index of this variant's row in the estimator's output table.
    pub fn row_index(&self) -> usize {
        match self {
            IccVariant::Icc1 => 0,
            IccVariant::Icc2 => 1,
            IccVariant::Icc3 => 2,
            IccVariant::Icc1k => 3,
            IccVariant::Icc2k => 4,
            IccVariant::Icc3k => 5,
        }
    }

    /// Conventional display name (e.g. "ICC2k").
    pub fn label(&self) -> &'static str {
        match self {
            IccVariant::Icc1 => "ICC1",
            IccVariant::Icc2 => "ICC2",
            IccVariant::Icc3 => "ICC3",
            IccVariant::Icc1k => "ICC1k",
            IccVariant::Icc2k => "ICC2k",
            IccVariant::Icc3k => "ICC3k",
        }
    }
}

impl fmt::Display for IccVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Arbitrary per-bundle fields of one acquisition entry.
///
/// Source tables may carry fields beyond the one metric we read, so the
/// values stay untyped JSON.
pub type BundleFields = BTreeMap<String, serde_json::Value>;

/// One loaded metric table: acquisition id -> bundle id -> fields.
///
/// Backed by ordered maps so every downstream iteration is deterministic.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StatsTable(pub BTreeMap<String, BTreeMap<String, BundleFields>>);

impl StatsTable {
    /// Iterate the acquisition ids present in this table.
    pub fn acquisition_ids(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Whether the table has an entry for this acquisition.
    pub fn contains_acquisition(&self, acquisition: &str) -> bool {
        self.0.contains_key(acquisition)
    }

    /// The fields recorded for one bundle of one acquisition, if the
    /// bundle was segmented for it.
    pub fn bundle_entry(&self, acquisition: &str, bundle: &str) -> Option<&BundleFields> {
        self.0.get(acquisition).and_then(|entry| entry.get(bundle))
    }

    /// Number of acquisitions in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[allow(dead_code)] // Utility accessor
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Subject id -> ordered acquisition ids, as supplied by the subject
/// mapping file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SubjectMap(pub BTreeMap<String, Vec<String>>);

impl SubjectMap {
    /// Iterate (subject, acquisitions) in stable (sorted) subject order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// All acquisition ids listed under any subject.
    pub fn acquisition_ids(&self) -> impl Iterator<Item = &String> {
        self.0.values().flatten()
    }

    /// Number of subjects in the mapping.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty.
    #[allow(dead_code)] // Utility accessor
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The three loaded metric tables plus the subject mapping.
#[derive(Debug, Clone, Default)]
pub struct LoadedStats {
    /// Length statistics table.
    pub length: StatsTable,
    /// Volume statistics table.
    pub volume: StatsTable,
    /// Streamline count statistics table.
    pub streamline_count: StatsTable,
    /// Subject -> acquisitions mapping.
    pub subjects: SubjectMap,
}

impl LoadedStats {
    /// The source table holding the given metric.
    pub fn table_for(&self, metric: MetricKind) -> &StatsTable {
        match metric {
            MetricKind::Length => &self.length,
            MetricKind::Volume => &self.volume,
            MetricKind::StreamlineCount => &self.streamline_count,
        }
    }
}

/// One repeated-measures row: a metric value observed for one subject in
/// one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Subject id (the reliability target).
    pub subject: String,
    /// Session label (the reliability rater), unique per subject.
    pub session: String,
    /// Observed metric value.
    pub value: f64,
}

/// Long-format sample table for one (bundle, metric) pair.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    rows: Vec<Observation>,
}

impl SampleTable {
    /// Create an empty sample table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one observation row.
    pub fn push(&mut self, row: Observation) {
        self.rows.push(row);
    }

    /// Iterate rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.rows.iter()
    }

    /// Total number of rows (usable ratings).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[allow(dead_code)] // Utility accessor
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct subjects contributing rows.
    pub fn subject_count(&self) -> usize {
        let mut subjects: Vec<&str> = self.rows.iter().map(|r| r.subject.as_str()).collect();
        subjects.sort_unstable();
        subjects.dedup();
        subjects.len()
    }
}

/// Reliability estimate for one (bundle, metric) pair: an ICC point
/// estimate with its confidence interval. Computed once, immutable
/// thereafter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReliabilityResult {
    /// ICC point estimate.
    pub icc: f64,
    /// Lower confidence bound.
    pub ci_lower: f64,
    /// Upper confidence bound.
    pub ci_upper: f64,
}

impl ReliabilityResult {
    /// The "no evidence" placeholder used when estimation is not possible
    /// from the available data.
    pub const fn sentinel() -> Self {
        Self {
            icc: 0.0,
            ci_lower: 0.0,
            ci_upper: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_field_names() {
        assert_eq!(MetricKind::Length.field_name(), "mean_length");
        assert_eq!(MetricKind::Volume.field_name(), "volume");
        assert_eq!(MetricKind::StreamlineCount.field_name(), "streamline_count");
    }

    #[test]
    fn test_metric_fixed_order() {
        let labels: Vec<&str> = MetricKind::ALL.iter().map(|m| m.label()).collect();
        assert_eq!(labels, vec!["length", "volume", "streamline_count"]);
    }

    #[test]
    fn test_variant_row_indices_match_declaration_order() {
        for (i, variant) in IccVariant::ALL.iter().enumerate() {
            assert_eq!(variant.row_index(), i, "{variant} out of order");
        }
    }

    #[test]
    fn test_stats_table_lookup() {
        let json = r#"{
            "sub-01_ses-1": {"AF_L": {"mean_length": 80.5, "std_length": 2.0}},
            "sub-01_ses-2": {"AF_L": {"mean_length": 82.0}}
        }"#;
        let table: StatsTable = serde_json::from_str(json).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.contains_acquisition("sub-01_ses-1"));
        assert!(table.bundle_entry("sub-01_ses-1", "AF_L").is_some());
        assert!(table.bundle_entry("sub-01_ses-1", "CST_R").is_none());
        assert!(table.bundle_entry("sub-02_ses-1", "AF_L").is_none());
    }

    #[test]
    fn test_subject_map_iteration_is_sorted() {
        let json = r#"{
            "sub-02": ["sub-02_ses-1"],
            "sub-01": ["sub-01_ses-1", "sub-01_ses-2"]
        }"#;
        let map: SubjectMap = serde_json::from_str(json).unwrap();

        let subjects: Vec<&String> = map.iter().map(|(s, _)| s).collect();
        assert_eq!(subjects, vec!["sub-01", "sub-02"]);
        assert_eq!(map.acquisition_ids().count(), 3);
    }

    #[test]
    fn test_sample_table_subject_count() {
        let mut table = SampleTable::new();
        for (subject, session, value) in [
            ("sub-01", "ses-1", 80.0),
            ("sub-01", "ses-2", 82.0),
            ("sub-02", "ses-1", 60.0),
        ] {
            table.push(Observation {
                subject: subject.to_string(),
                session: session.to_string(),
                value,
            });
        }

        assert_eq!(table.len(), 3);
        assert_eq!(table.subject_count(), 2);
    }

    #[test]
    fn test_sentinel_result() {
        let sentinel = ReliabilityResult::sentinel();
        assert_eq!(sentinel.icc, 0.0);
        assert_eq!(sentinel.ci_lower, 0.0);
        assert_eq!(sentinel.ci_upper, 0.0);
    }
}
