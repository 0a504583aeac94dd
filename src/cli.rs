//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Thresholds and output settings are optional
//! here so that config file values apply unless a flag is given.

use chrono::NaiveDate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// PageMerger - find landing pages competing for the same queries
///
/// Reads query/page performance rows, picks the best-ranked page per
/// query and recommends merging the pages that rank worse than a
/// position threshold.
///
/// Examples:
///   pagemerger --input export.csv
///   pagemerger --input export.csv --min-impressions 100 --position-threshold 15
///   pagemerger --site sc-domain:example.com --start-date 2024-01-01 --format markdown
///   cat export.csv | pagemerger --input - --output -
///   pagemerger --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV file with query performance rows (`-` for stdin)
    ///
    /// Needs a header with query, page, impressions, clicks and position
    /// columns. Search console export names are accepted too.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Search console property to fetch rows from
    ///
    /// e.g. https://example.com/ or sc-domain:example.com
    #[arg(short, long, value_name = "PROPERTY")]
    pub site: Option<String>,

    /// List the search console properties the access token can read
    #[arg(long)]
    pub list_sites: bool,

    /// OAuth access token for the search console API
    #[arg(long, env = "PAGEMERGER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// First day of the reporting window (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the reporting window (YYYY-MM-DD), defaults to today
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<NaiveDate>,

    /// Length of the reporting window when --start-date is not given
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Maximum number of rows to fetch from search console
    #[arg(long, value_name = "ROWS")]
    pub row_limit: Option<usize>,

    /// Drop rows with fewer impressions than this before grouping
    #[arg(long, value_name = "COUNT", allow_negative_numbers = true)]
    pub min_impressions: Option<i64>,

    /// Flag pages whose average position is worse than this
    #[arg(long, value_name = "POSITION", allow_negative_numbers = true)]
    pub position_threshold: Option<f64>,

    /// Output file path for the report (`-` for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (csv, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// One row per query, listing all pages to merge together
    #[arg(long)]
    pub group_by_query: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pagemerger.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Load and aggregate the input, print counts, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when any merge candidate is found
    #[arg(long)]
    pub fail_on_candidates: bool,

    /// Generate a default .pagemerger.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma-separated table (default)
    #[default]
    Csv,
    /// Markdown report
    Markdown,
    /// JSON report
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.list_sites {
            if self.access_token.is_none() {
                return Err("--list-sites needs --access-token or PAGEMERGER_ACCESS_TOKEN".to_string());
            }
            return Ok(());
        }

        match (&self.input, &self.site) {
            (Some(_), Some(_)) => {
                return Err("Use either --input or --site, not both".to_string());
            }
            (None, None) => {
                return Err("One of --input or --site is required".to_string());
            }
            _ => {}
        }

        if let Some(ref input) = self.input {
            if input.as_os_str() != "-" && !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        if let Some(ref site) = self.site {
            if site.trim().is_empty() {
                return Err("--site cannot be empty".to_string());
            }
            if self.access_token.is_none() {
                return Err("--site needs --access-token or PAGEMERGER_ACCESS_TOKEN".to_string());
            }
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(format!("--start-date {} is after --end-date {}", start, end));
            }
        }

        if self.row_limit == Some(0) {
            return Err("Row limit must be at least 1".to_string());
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
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

    /// Human-readable name of the input source.
    pub fn source_label(&self) -> String {
        match (&self.input, &self.site) {
            (Some(path), _) if path.as_os_str() == "-" => "stdin".to_string(),
            (Some(path), _) => path.display().to_string(),
            (None, Some(site)) => site.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("-")),
            site: None,
            list_sites: false,
            access_token: None,
            start_date: None,
            end_date: None,
            days: None,
            row_limit: None,
            min_impressions: None,
            position_threshold: None,
            output: None,
            format: None,
            group_by_query: false,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            fail_on_candidates: false,
            init_config: false,
        }
    }

    #[test]
    fn test_stdin_input_is_valid() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_requires_one_source() {
        let mut args = make_args();
        args.input = None;
        assert!(args.validate().is_err());

        args.input = Some(PathBuf::from("-"));
        args.site = Some("sc-domain:example.com".to_string());
        args.access_token = Some("token".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_input_file() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("no/such/file.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_site_needs_token() {
        let mut args = make_args();
        args.input = None;
        args.site = Some("sc-domain:example.com".to_string());
        assert!(args.validate().is_err());

        args.access_token = Some("token".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_inverted_dates() {
        let mut args = make_args();
        args.start_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        args.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_thresholds_left_to_engine() {
        let mut args = make_args();
        args.min_impressions = Some(-5);
        args.position_threshold = Some(0.0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_negative_threshold() {
        let args = Args::try_parse_from([
            "pagemerger",
            "--input",
            "-",
            "--min-impressions",
            "-1",
            "--format",
            "markdown",
        ])
        .unwrap();
        assert_eq!(args.min_impressions, Some(-1));
        assert_eq!(args.format, Some(OutputFormat::Markdown));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_source_label() {
        let mut args = make_args();
        assert_eq!(args.source_label(), "stdin");

        args.input = None;
        args.site = Some("sc-domain:example.com".to_string());
        assert_eq!(args.source_label(), "sc-domain:example.com");
    }
}
