//! Result export and rendering.
//!
//! Writers for the reliability table and the grouped bar chart, plus
//! output directory preparation shared by both pipelines.

pub mod chart;
pub mod table;

pub use chart::render_icc_chart;
pub use table::export_icc_table;

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Ensure the output directory exists and may be written to.
///
/// A missing directory is created; an existing non-empty directory is
/// rejected unless overwriting was requested.
pub fn prepare_output_dir(dir: &Path, overwrite: bool) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            bail!("Output path is not a directory: {}", dir.display());
        }

        let occupied = dir
            .read_dir()
            .with_context(|| format!("Failed to inspect output directory: {}", dir.display()))?
            .next()
            .is_some();
        if occupied && !overwrite {
            bail!(
                "Output directory is not empty: {} (use --force to overwrite)",
                dir.display()
            );
        }
    } else {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");

        prepare_output_dir(&out, false).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_accepts_existing_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(prepare_output_dir(dir.path(), false).is_ok());
    }

    #[test]
    fn test_rejects_non_empty_directory_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leftover.csv"), "x").unwrap();

        assert!(prepare_output_dir(dir.path(), false).is_err());
        assert!(prepare_output_dir(dir.path(), true).is_ok());
    }

    #[test]
    fn test_rejects_file_as_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        assert!(prepare_output_dir(&file, true).is_err());
    }
}
