//! Loading of the metric tables and subject mapping.
//!
//! The three metric tables must reference the same acquisition universe,
//! and every acquisition listed in the subject mapping must be present in
//! the tables; either mismatch aborts the run before any computation.

use crate::models::{LoadedStats, StatsTable, SubjectMap};
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// How many offending ids to name in a validation error before eliding.
const MAX_REPORTED_IDS: usize = 5;

/// Load the three metric tables and the subject mapping, validating that
/// they agree on the acquisition universe.
pub fn load_stats(
    length_stats: &Path,
    volume_stats: &Path,
    streamline_count: &Path,
    subjects: &Path,
) -> Result<LoadedStats> {
    let stats = LoadedStats {
        length: load_table(length_stats)?,
        volume: load_table(volume_stats)?,
        streamline_count: load_table(streamline_count)?,
        subjects: load_subject_map(subjects)?,
    };

    validate_universe(&stats)?;

    info!(
        "Loaded {} acquisitions across {} subjects",
        stats.length.len(),
        stats.subjects.len()
    );

    Ok(stats)
}

/// Load one metric table from a JSON file.
fn load_table(path: &Path) -> Result<StatsTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open statistics file: {}", path.display()))?;

    let table: StatsTable = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse statistics file: {}", path.display()))?;

    debug!("{}: {} acquisitions", path.display(), table.len());
    Ok(table)
}

/// Load the subject -> acquisitions mapping from a JSON file.
fn load_subject_map(path: &Path) -> Result<SubjectMap> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open subjects file: {}", path.display()))?;

    let subjects: SubjectMap = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse subjects file: {}", path.display()))?;

    debug!("{}: {} subjects", path.display(), subjects.len());
    Ok(subjects)
}

/// Load a JSON array of bundle ids (agreements bundles config).
pub fn load_bundle_list(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open bundles config: {}", path.display()))?;

    let bundles: Vec<String> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse bundles config: {}", path.display()))?;

    Ok(bundles)
}

/// Check that all tables reference the same acquisition ids and that the
/// subject mapping only lists acquisitions that exist.
fn validate_universe(stats: &LoadedStats) -> Result<()> {
    let length_ids: BTreeSet<&String> = stats.length.acquisition_ids().collect();

    for (name, table) in [
        ("volume", &stats.volume),
        ("streamline count", &stats.streamline_count),
    ] {
        let ids: BTreeSet<&String> = table.acquisition_ids().collect();
        if ids != length_ids {
            let mismatched: Vec<&str> = length_ids
                .symmetric_difference(&ids)
                .map(|id| id.as_str())
                .collect();
            bail!(
                "Length and {} statistics do not reference the same acquisitions \
                 (mismatched: {})",
                name,
                format_ids(&mismatched)
            );
        }
    }

    let unknown: Vec<&str> = stats
        .subjects
        .acquisition_ids()
        .filter(|id| !stats.length.contains_acquisition(id))
        .map(|id| id.as_str())
        .collect();
    if !unknown.is_empty() {
        bail!(
            "Subject mapping lists acquisitions absent from the statistics files: {}",
            format_ids(&unknown)
        );
    }

    Ok(())
}

/// Render a short, bounded list of ids for error messages.
fn format_ids(ids: &[&str]) -> String {
    if ids.len() > MAX_REPORTED_IDS {
        format!(
            "{}, ... ({} total)",
            ids[..MAX_REPORTED_IDS].join(", "),
            ids.len()
        )
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_json(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const TABLE: &str = r#"{
        "sub-01_ses-1": {"AF_L": {"mean_length": 80.0, "volume": 1200.0, "streamline_count": 450}},
        "sub-01_ses-2": {"AF_L": {"mean_length": 82.0, "volume": 1250.0, "streamline_count": 470}}
    }"#;

    #[test]
    fn test_load_stats_accepts_matching_tables() {
        let dir = tempfile::tempdir().unwrap();
        let length = write_json(dir.path(), "length.json", TABLE);
        let volume = write_json(dir.path(), "volume.json", TABLE);
        let count = write_json(dir.path(), "count.json", TABLE);
        let subjects = write_json(
            dir.path(),
            "subjects.json",
            r#"{"sub-01": ["sub-01_ses-1", "sub-01_ses-2"]}"#,
        );

        let stats = load_stats(&length, &volume, &count, &subjects).unwrap();
        assert_eq!(stats.length.len(), 2);
        assert_eq!(stats.subjects.len(), 1);
    }

    #[test]
    fn test_load_stats_rejects_mismatched_universe() {
        let dir = tempfile::tempdir().unwrap();
        let length = write_json(dir.path(), "length.json", TABLE);
        let volume = write_json(
            dir.path(),
            "volume.json",
            r#"{"sub-01_ses-1": {"AF_L": {"volume": 1200.0}}}"#,
        );
        let count = write_json(dir.path(), "count.json", TABLE);
        let subjects = write_json(dir.path(), "subjects.json", r#"{"sub-01": ["sub-01_ses-1"]}"#);

        let err = load_stats(&length, &volume, &count, &subjects).unwrap_err();
        assert!(err.to_string().contains("volume"));
        assert!(err.to_string().contains("sub-01_ses-2"));
    }

    #[test]
    fn test_load_stats_rejects_unknown_mapped_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let length = write_json(dir.path(), "length.json", TABLE);
        let volume = write_json(dir.path(), "volume.json", TABLE);
        let count = write_json(dir.path(), "count.json", TABLE);
        let subjects = write_json(
            dir.path(),
            "subjects.json",
            r#"{"sub-01": ["sub-01_ses-1", "sub-01_ses-9"]}"#,
        );

        let err = load_stats(&length, &volume, &count, &subjects).unwrap_err();
        assert!(err.to_string().contains("sub-01_ses-9"));
    }

    #[test]
    fn test_load_stats_tolerates_unmapped_acquisitions() {
        // Acquisitions present in the tables but not in the mapping are
        // excluded from analysis, not an error.
        let dir = tempfile::tempdir().unwrap();
        let length = write_json(dir.path(), "length.json", TABLE);
        let volume = write_json(dir.path(), "volume.json", TABLE);
        let count = write_json(dir.path(), "count.json", TABLE);
        let subjects = write_json(dir.path(), "subjects.json", r#"{"sub-01": ["sub-01_ses-1"]}"#);

        assert!(load_stats(&length, &volume, &count, &subjects).is_ok());
    }

    #[test]
    fn test_load_bundle_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), "bundles.json", r#"["AF_L", "AF_R"]"#);

        let bundles = load_bundle_list(&path).unwrap();
        assert_eq!(bundles, vec!["AF_L", "AF_R"]);
    }

    #[test]
    fn test_format_ids_elides_long_lists() {
        let ids: Vec<String> = (0..8).map(|i| format!("acq-{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();

        let formatted = format_ids(&refs);
        assert!(formatted.contains("acq-0"));
        assert!(formatted.contains("(8 total)"));
        assert!(!formatted.contains("acq-7"));
    }
}
