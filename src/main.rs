//! PageMerger - landing page merge recommendations
//!
//! A CLI tool that reads search query performance rows, picks the
//! best-ranked landing page for every query and recommends folding the
//! weaker pages into it.
//!
//! Exit codes:
//!   0 - Success (or no candidates, or no --fail-on-candidates set)
//!   1 - Runtime error (bad input, bad config, API failure, etc.)
//!   2 - Merge candidates found and --fail-on-candidates set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod source;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use models::{AggregatedEntry, MergeSummary, Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("PageMerger v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pagemerger.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to change thresholds, output format and search console settings.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so stdout can carry the report.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Aggregated input plus the counts the report needs.
struct LoadedInput {
    rows_read: usize,
    entries: Vec<AggregatedEntry>,
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if args.list_sites {
        return handle_list_sites(&args).await;
    }

    let min_impressions = config.thresholds.min_impressions;
    let position_threshold = config.thresholds.position_threshold;
    analysis::validate_thresholds(min_impressions, position_threshold)
        .context("Invalid thresholds")?;
    let source_label = args.source_label();

    eprintln!("📥 Loading rows from {}", source_label);
    let input = load_input(&args, &config).await?;

    let observations_kept: usize = input.entries.iter().map(|e| e.observations).sum();
    let queries = analysis::distinct_queries(&input.entries);
    info!(
        "{} rows read, {} kept (min impressions {}), {} query/page pairs across {} queries",
        input.rows_read,
        observations_kept,
        min_impressions,
        input.entries.len(),
        queries
    );

    if args.dry_run {
        return handle_dry_run(&input, observations_kept, queries);
    }

    eprintln!("🔬 Looking for pages ranked worse than position {}...", position_threshold);
    let recommendations = analysis::recommend(&input.entries, position_threshold)
        .context("Recommendation failed")?;
    let groups = analysis::group_by_query(&recommendations);
    let summary = MergeSummary::from_recommendations(&recommendations);

    let metadata = ReportMetadata {
        source: source_label,
        analysis_date: Utc::now(),
        min_impressions,
        position_threshold,
        observations_read: input.rows_read,
        observations_kept,
        aggregated_entries: input.entries.len(),
        queries,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = Report {
        metadata,
        summary: summary.clone(),
        recommendations,
        groups,
    };

    let output = match config.general.format {
        OutputFormat::Csv => report::generate_csv_report(&report, config.general.group_by_query)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
        OutputFormat::Json => report::generate_json_report(&report)?,
    };

    let output_path = PathBuf::from(&config.general.output);
    report::write_output(&output_path, &output)?;

    if summary.total == 0 {
        warn!("No merge recommendations found with the current criteria.");
        eprintln!("\n✅ Nothing to merge: no page ranks worse than the threshold and its query's best page.");
    } else {
        eprintln!("\n📊 Merge Summary:");
        eprintln!("   Recommendations: {}", summary.total);
        eprintln!("   Queries affected: {}", summary.queries_with_candidates);
        eprintln!("   Pages to merge: {}", summary.distinct_pages_to_merge);
        eprintln!(
            "   Impressions at stake: {} | Clicks at stake: {}",
            summary.impressions_at_stake, summary.clicks_at_stake
        );
    }

    if output_path != Path::new("-") {
        eprintln!("\n✅ Report saved to: {}", output_path.display());
    }

    if args.fail_on_candidates && summary.total > 0 {
        eprintln!("\n⛔ Merge candidates found. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Read and aggregate rows from whichever source was selected.
async fn load_input(args: &Args, config: &Config) -> Result<LoadedInput> {
    let min_impressions = config.thresholds.min_impressions;

    if let Some(ref path) = args.input {
        let rows = source::read_observations(path)?;
        let entries = analysis::aggregate_raw(&rows, min_impressions)
            .with_context(|| format!("Failed to aggregate rows from {}", args.source_label()))?;
        return Ok(LoadedInput {
            rows_read: rows.len(),
            entries,
        });
    }

    let site = args
        .site
        .as_deref()
        .ok_or_else(|| anyhow!("No search console property given"))?;
    let token = args
        .access_token
        .as_deref()
        .ok_or_else(|| anyhow!("No access token given"))?;

    let range = source::DateRange::resolve(
        args.start_date,
        args.end_date,
        config.search_console.days,
        Utc::now().date_naive(),
    )?;

    let client = source::SearchConsoleClient::new(token)?;
    let observations = client
        .fetch_observations(site, range, config.search_console.row_limit, !args.quiet)
        .await?;
    let entries = analysis::aggregate(&observations, min_impressions)
        .with_context(|| format!("Failed to aggregate rows from {}", site))?;

    Ok(LoadedInput {
        rows_read: observations.len(),
        entries,
    })
}

/// Handle --list-sites: print readable properties and exit.
async fn handle_list_sites(args: &Args) -> Result<i32> {
    let token = args
        .access_token
        .as_deref()
        .ok_or_else(|| anyhow!("No access token given"))?;

    let sites = source::SearchConsoleClient::new(token)?.list_sites().await?;

    if sites.is_empty() {
        println!("No properties available for this token.");
    }
    for site in &sites {
        println!("{}\t{}", site.site_url, site.permission_level);
    }

    Ok(0)
}

/// Handle --dry-run: print what would be analyzed, exit.
fn handle_dry_run(input: &LoadedInput, observations_kept: usize, queries: usize) -> Result<i32> {
    eprintln!("\n🔍 Dry run: input is valid, nothing written.\n");
    eprintln!("   Rows read: {}", input.rows_read);
    eprintln!("   Rows kept: {}", observations_kept);
    eprintln!("   Query/page pairs: {}", input.entries.len());
    eprintln!("   Queries: {}", queries);
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
