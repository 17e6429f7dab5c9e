//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tracto-Retest - test-retest reliability statistics for tractometry
///
/// Computes intraclass-correlation reliability of tractometry metrics
/// (length, volume, streamline count) across repeated acquisitions, and
/// merges agreement distributions into box plots.
///
/// Examples:
///   tracto-retest icc --length-stats length.json --volume-stats volume.json \
///       --streamline-count count.json --subjects subjects.json -o results/
///   tracto-retest icc ... --icc-variant icc2k --show
///   tracto-retest agreements sub-*/AF_L.json --bundles-config bundles.json -o plots/
///   tracto-retest --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    ///
    /// If not specified, looks for .tracto-retest.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .tracto-retest.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute per-bundle ICC reliability with a table and bar chart
    Icc(IccArgs),
    /// Merge agreement distributions and render per-metric box plots
    Agreements(AgreementsArgs),
}

/// Arguments for the `icc` subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct IccArgs {
    /// Tractometry length statistics (JSON)
    #[arg(long, value_name = "FILE")]
    pub length_stats: PathBuf,

    /// Tractometry volume statistics (JSON)
    #[arg(long, value_name = "FILE")]
    pub volume_stats: PathBuf,

    /// Streamline count statistics (JSON)
    #[arg(long, value_name = "FILE")]
    pub streamline_count: PathBuf,

    /// JSON file mapping a single subject to all its acquisition ids
    /// (e.g. {"sub-01": ["sub-01_ses-1_run-1", "sub-01_ses-1_run-2"]})
    #[arg(long, value_name = "FILE")]
    pub subjects: PathBuf,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// ICC form to report
    #[arg(long, value_enum, default_value = "icc2", value_name = "VARIANT")]
    pub icc_variant: IccChoice,

    /// Open the rendered chart after saving
    #[arg(long)]
    pub show: bool,

    /// Overwrite a non-empty output directory
    #[arg(short, long)]
    pub force: bool,

    /// Load and validate inputs, list discovered bundles, and exit
    /// without computing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `agreements` subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct AgreementsArgs {
    /// Per-bundle agreement JSON files to merge
    #[arg(value_name = "IN_JSONS", required = true, num_args = 1..)]
    pub in_jsons: Vec<PathBuf>,

    /// JSON array of bundle ids to aggregate
    #[arg(long, value_name = "FILE")]
    pub bundles_config: PathBuf,

    /// Output directory for the merged distributions and box plots
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Open the rendered box plots after saving
    #[arg(long)]
    pub show: bool,

    /// Overwrite a non-empty output directory
    #[arg(short, long)]
    pub force: bool,
}

/// ICC form selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IccChoice {
    /// One-way random, single measures
    Icc1,
    /// Two-way random, single measures, absolute agreement
    Icc2,
    /// Two-way mixed, single measures, consistency
    Icc3,
    /// One-way random, average measures
    Icc1k,
    /// Two-way random, average measures, absolute agreement
    Icc2k,
    /// Two-way mixed, average measures, consistency
    Icc3k,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Skip the rest for --init-config
        if self.init_config {
            return Ok(());
        }

        let command = match &self.command {
            Some(command) => command,
            None => return Err("A subcommand is required (icc or agreements)".to_string()),
        };

        match command {
            Command::Icc(args) => {
                for (name, path) in [
                    ("--length-stats", &args.length_stats),
                    ("--volume-stats", &args.volume_stats),
                    ("--streamline-count", &args.streamline_count),
                    ("--subjects", &args.subjects),
                ] {
                    if !path.is_file() {
                        return Err(format!(
                            "Input file for {} does not exist: {}",
                            name,
                            path.display()
                        ));
                    }
                }
            }
            Command::Agreements(args) => {
                if !args.bundles_config.is_file() {
                    return Err(format!(
                        "Bundles config does not exist: {}",
                        args.bundles_config.display()
                    ));
                }
                // in_jsons entries are allowed to be missing; absent files
                // are skipped during merging.
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
