//! Tracto-Retest - Test-Retest Reliability for Tractometry
//!
//! A CLI tool that computes intraclass-correlation reliability of
//! tractometry metrics across repeated acquisitions, exporting a CSV
//! table and a grouped bar chart, and merges agreement distributions
//! into interactive box plots.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (input validation, parsing, export failure, etc.)

mod agreements;
mod analysis;
mod cli;
mod config;
mod input;
mod models;
mod report;

use anyhow::{bail, Context, Result};
use cli::{AgreementsArgs, Cli, Command, IccArgs, IccChoice};
use config::Config;
use models::{IccVariant, MetricKind};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Validate arguments
    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if cli.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&cli);

    info!("Tracto-Retest v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", cli);

    // Run the requested pipeline
    match run(cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .tracto-retest.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".tracto-retest.toml");

    if path.exists() {
        eprintln!("⚠️  .tracto-retest.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .tracto-retest.toml")?;

    println!("✅ Created .tracto-retest.toml with default settings.");
    println!("   Edit it to customize chart colors, axis ranges, and estimator settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(cli: &Cli) {
    let level = cli.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch to the requested subcommand.
fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let quiet = cli.quiet;

    match cli.command {
        Some(Command::Icc(args)) => run_icc(args, &config, quiet),
        Some(Command::Agreements(args)) => run_agreements(args, &config),
        None => bail!("A subcommand is required (icc or agreements)"),
    }
}

/// Run the reliability pipeline: load, discover, estimate, export.
fn run_icc(args: IccArgs, config: &Config, quiet: bool) -> Result<()> {
    report::prepare_output_dir(&args.output, args.force)?;

    // Step 1: Load and validate the inputs
    println!("📥 Loading tractometry statistics...");
    let stats = input::load_stats(
        &args.length_stats,
        &args.volume_stats,
        &args.streamline_count,
        &args.subjects,
    )?;

    // Step 2: Discover the bundle universe
    let universe = input::discover_bundles(&stats.length);
    println!("   Subjects: {}", stats.subjects.len());
    println!(
        "   Bundles: {} ({} per-label entries excluded)",
        universe.bundles.len(),
        universe.per_label.len()
    );

    // Handle --dry-run: list bundles and exit
    if args.dry_run {
        return handle_dry_run(&universe);
    }

    // Step 3: Estimate reliability per bundle and metric
    let variant = icc_choice_to_variant(args.icc_variant);
    println!(
        "\n🔬 Computing {} for {} bundles x {} metrics...",
        variant,
        universe.bundles.len(),
        MetricKind::ALL.len()
    );

    let (store, shortfalls) = analysis::compute_reliability(
        &stats,
        &universe.bundles,
        variant,
        &config.estimator,
        !quiet,
    )?;
    if shortfalls > 0 {
        warn!(
            "{shortfalls} of {} cells degenerated to the zero sentinel",
            store.len()
        );
    }

    // Step 4: Export the table and the chart
    println!("📝 Writing reliability table...");
    let table_path = report::export_icc_table(&store, &args.output)?;

    println!("📊 Rendering bar chart...");
    let chart_path = report::render_icc_chart(&store, &config.chart, &args.output)?;

    // Print summary
    println!(
        "\n✅ Reliability results saved to: {}",
        args.output.display()
    );
    println!("   Table: {}", table_path.display());
    println!("   Chart: {}", chart_path.display());
    if shortfalls > 0 {
        println!("   ⚠️  {shortfalls} cells had insufficient data (reported as 0.0)");
    }

    if args.show {
        show_artifact(&chart_path);
    }

    Ok(())
}

/// Handle --dry-run: list the discovered bundles, exit.
fn handle_dry_run(universe: &input::BundleUniverse) -> Result<()> {
    println!("\n🔍 Dry run: inputs validated, nothing computed.\n");

    if universe.is_empty() {
        println!("   No analyzable bundles found.");
    } else {
        println!("   Found {} bundles that would be analyzed:\n", universe.bundles.len());
        for bundle in &universe.bundles {
            println!("     🧠 {bundle}");
        }
    }

    println!("\n✅ Dry run complete.");
    Ok(())
}

/// Run the agreements pipeline: merge distributions, render box plots.
fn run_agreements(args: AgreementsArgs, config: &Config) -> Result<()> {
    report::prepare_output_dir(&args.output, args.force)?;

    let bundles = input::load_bundle_list(&args.bundles_config)?;
    println!(
        "📥 Merging {} candidate files across {} bundles...",
        args.in_jsons.len(),
        bundles.len()
    );

    let merged =
        agreements::merge_distributions(&bundles, &args.in_jsons, &config.agreements.metrics)?;
    merged.save(&args.output.join("metrics.json"))?;

    println!("📊 Rendering box plots...");
    let written = agreements::render_box_plots(&merged, &bundles, &config.agreements, &args.output);

    println!(
        "\n✅ Wrote {} of {} box plots to: {}",
        written.len(),
        config.agreements.metrics.len(),
        args.output.display()
    );

    if args.show {
        for path in &written {
            show_artifact(path);
        }
    }

    Ok(())
}

/// Convert the CLI choice to the analysis-side ICC variant.
fn icc_choice_to_variant(choice: IccChoice) -> IccVariant {
    match choice {
        IccChoice::Icc1 => IccVariant::Icc1,
        IccChoice::Icc2 => IccVariant::Icc2,
        IccChoice::Icc3 => IccVariant::Icc3,
        IccChoice::Icc1k => IccVariant::Icc1k,
        IccChoice::Icc2k => IccVariant::Icc2k,
        IccChoice::Icc3k => IccVariant::Icc3k,
    }
}

/// Open a rendered artifact with the system viewer (best effort).
fn show_artifact(path: &Path) {
    if let Err(e) = open::that(path) {
        warn!("Could not open {}: {e}", path.display());
    }
}

/// Load configuration from file or use defaults.
fn load_config(cli: &Cli) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = cli.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .tracto-retest.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
