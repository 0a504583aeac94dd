//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pagemerger.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".pagemerger.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Merge thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Search console source settings.
    #[serde(default)]
    pub search_console: SearchConsoleConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// One output row per query.
    #[serde(default)]
    pub group_by_query: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            group_by_query: false,
        }
    }
}

fn default_output() -> String {
    "merge_recommendations.csv".to_string()
}

/// Thresholds passed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Rows below this many impressions are dropped before grouping.
    #[serde(default = "default_min_impressions")]
    pub min_impressions: i64,

    /// Pages ranked worse than this are merge candidates.
    #[serde(default = "default_position_threshold")]
    pub position_threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_impressions: default_min_impressions(),
            position_threshold: default_position_threshold(),
        }
    }
}

fn default_min_impressions() -> i64 {
    500
}

fn default_position_threshold() -> f64 {
    20.0
}

/// Search console settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConsoleConfig {
    /// Cap on fetched rows.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Reporting window length in days.
    #[serde(default = "default_days")]
    pub days: u32,
}

impl Default for SearchConsoleConfig {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            days: default_days(),
        }
    }
}

fn default_row_limit() -> usize {
    25_000
}

fn default_days() -> u32 {
    28
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(min) = args.min_impressions {
            self.thresholds.min_impressions = min;
        }
        if let Some(threshold) = args.position_threshold {
            self.thresholds.position_threshold = threshold;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.group_by_query {
            self.general.group_by_query = true;
        }

        if let Some(limit) = args.row_limit {
            self.search_console.row_limit = limit;
        }
        if let Some(days) = args.days {
            self.search_console.days = days;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
