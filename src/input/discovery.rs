//! Bundle discovery.
//!
//! Enumerates the bundle ids observed in the length table, separating
//! whole-bundle entries from per-label entries (which are tracked but
//! never analyzed).

use crate::models::StatsTable;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Substring marking a per-label entry (e.g. "AF_L_label-12").
const LABEL_MARKER: &str = "label";

/// The bundle ids found in the loaded tables.
#[derive(Debug, Clone, Default)]
pub struct BundleUniverse {
    /// Whole-bundle ids, sorted; the analysis unit set.
    pub bundles: Vec<String>,
    /// Bundle+label ids, tracked separately and excluded from analysis.
    pub per_label: BTreeSet<String>,
}

impl BundleUniverse {
    /// Whether no analyzable bundle was found.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

/// Enumerate the bundle universe from the length table.
///
/// An acquisition entry whose keys contain the label marker contributes
/// to the per-label set; all other entries contribute to the analyzed
/// bundle set.
pub fn discover_bundles(length: &StatsTable) -> BundleUniverse {
    let mut bundles = BTreeSet::new();
    let mut per_label = BTreeSet::new();

    for (acquisition, entry) in &length.0 {
        if entry.keys().any(|name| name.contains(LABEL_MARKER)) {
            debug!("{acquisition}: per-label entry");
            per_label.extend(entry.keys().cloned());
        } else {
            bundles.extend(entry.keys().cloned());
        }
    }

    let universe = BundleUniverse {
        bundles: bundles.into_iter().collect(),
        per_label,
    };

    info!(
        "Discovered {} bundles ({} per-label entries excluded)",
        universe.bundles.len(),
        universe.per_label.len()
    );

    universe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(json: &str) -> StatsTable {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_discovers_sorted_bundles() {
        let length = table(
            r#"{
                "sub-01_ses-1": {"CST_R": {"mean_length": 1.0}, "AF_L": {"mean_length": 2.0}},
                "sub-01_ses-2": {"AF_L": {"mean_length": 3.0}, "IFOF_L": {"mean_length": 4.0}}
            }"#,
        );

        let universe = discover_bundles(&length);
        assert_eq!(universe.bundles, vec!["AF_L", "CST_R", "IFOF_L"]);
        assert!(universe.per_label.is_empty());
    }

    #[test]
    fn test_separates_per_label_entries() {
        let length = table(
            r#"{
                "sub-01_ses-1": {"AF_L": {"mean_length": 1.0}},
                "sub-02_ses-1": {"AF_L_label-1": {"mean_length": 2.0}, "AF_L_label-2": {"mean_length": 3.0}}
            }"#,
        );

        let universe = discover_bundles(&length);
        assert_eq!(universe.bundles, vec!["AF_L"]);
        assert_eq!(universe.per_label.len(), 2);
        assert!(universe.per_label.contains("AF_L_label-1"));
    }

    #[test]
    fn test_empty_table_yields_empty_universe() {
        let universe = discover_bundles(&table("{}"));
        assert!(universe.is_empty());
    }
}
