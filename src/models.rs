//! Data models for the merge recommender.
//!
//! Raw input rows, their validated form, the per-(query, page) aggregate,
//! and the recommendation records handed to the report layer.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A validated query/page observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Search term.
    pub query: String,
    /// Landing page URL or path.
    pub page: String,
    /// Times the page appeared in results for the query.
    pub impressions: u64,
    /// Click-throughs from results. Not checked against `impressions`.
    pub clicks: u64,
    /// Average rank in results, 1.0 is best.
    pub position: f64,
}

/// An unvalidated input row, every cell kept as text.
///
/// Column names follow both the canonical schema and the naming used by
/// search console exports.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawObservation {
    /// 1-based data row number, assigned by the reader.
    #[serde(skip)]
    pub row: usize,
    #[serde(alias = "Query", alias = "Top queries")]
    pub query: Option<String>,
    #[serde(alias = "Landing Page", alias = "Page", alias = "Top pages")]
    pub page: Option<String>,
    #[serde(alias = "Impressions")]
    pub impressions: Option<String>,
    #[serde(alias = "Url Clicks", alias = "Clicks")]
    pub clicks: Option<String>,
    #[serde(alias = "Average Position", alias = "Position")]
    pub position: Option<String>,
}

impl RawObservation {
    /// Validate and convert into an [`Observation`].
    pub fn parse(&self) -> Result<Observation, EngineError> {
        let query = required(self.row, "query", &self.query)?;
        let page = required(self.row, "page", &self.page)?;
        let impressions = parse_count(self.row, "impressions", &self.impressions)?;
        let clicks = parse_count(self.row, "clicks", &self.clicks)?;
        let position = parse_position(self.row, &self.position)?;

        Ok(Observation {
            query: query.to_string(),
            page: page.to_string(),
            impressions,
            clicks,
            position,
        })
    }
}

fn required<'a>(
    row: usize,
    field: &'static str,
    cell: &'a Option<String>,
) -> Result<&'a str, EngineError> {
    match cell.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(EngineError::schema(row, field, "missing value")),
    }
}

fn parse_count(
    row: usize,
    field: &'static str,
    cell: &Option<String>,
) -> Result<u64, EngineError> {
    let text = required(row, field, cell)?;

    if let Ok(value) = text.parse::<u64>() {
        return Ok(value);
    }

    // Spreadsheet exports sometimes write integers as `120.0`.
    // `u64::MAX as f64` rounds up to 2^64, which is already out of range.
    match text.parse::<f64>() {
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value < u64::MAX as f64
                && value.fract() == 0.0 =>
        {
            Ok(value as u64)
        }
        _ => Err(EngineError::schema(
            row,
            field,
            format!("`{}` is not a non-negative integer", text),
        )),
    }
}

fn parse_position(row: usize, cell: &Option<String>) -> Result<f64, EngineError> {
    let text = required(row, "position", cell)?;

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(EngineError::schema(
            row,
            "position",
            format!("`{}` is not a positive number", text),
        )),
    }
}

/// One summary record per unique (query, page) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntry {
    pub query: String,
    pub page: String,
    /// Sum of impressions across the pair's observations.
    pub total_impressions: u64,
    /// Sum of clicks across the pair's observations.
    pub total_clicks: u64,
    /// Unweighted mean of the observed positions.
    pub mean_position: f64,
    /// Number of observations folded into this entry.
    pub observations: usize,
}

/// A suggestion to fold one page into the best-ranked page for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecommendation {
    /// Shared search term.
    pub query: String,
    /// Page recommended for consolidation.
    pub page_to_merge: String,
    /// Best-ranked page for the query.
    pub merge_into: String,
    pub impressions: u64,
    pub clicks: u64,
    pub mean_position: f64,
    pub merge_into_impressions: u64,
    pub merge_into_clicks: u64,
    pub merge_into_mean_position: f64,
}

/// A page listed under a [`QueryMergeGroup`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeCandidate {
    pub page: String,
    pub impressions: u64,
    pub clicks: u64,
    pub mean_position: f64,
}

/// All recommendations for a single query, collapsed into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMergeGroup {
    pub query: String,
    pub merge_into: String,
    pub merge_into_impressions: u64,
    pub merge_into_clicks: u64,
    pub merge_into_mean_position: f64,
    pub pages: Vec<MergeCandidate>,
}

impl QueryMergeGroup {
    /// Number of pages to fold into `merge_into`.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Impressions carried by the pages to merge, capped at `u64::MAX`.
    pub fn impressions_at_stake(&self) -> u64 {
        self.pages
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.impressions))
    }
}

/// Summary statistics over a set of recommendations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Total number of recommendations.
    pub total: usize,
    /// Queries with at least one page to merge.
    pub queries_with_candidates: usize,
    /// Distinct pages recommended for merging (across queries).
    pub distinct_pages_to_merge: usize,
    /// Distinct pages acting as merge targets.
    pub distinct_targets: usize,
    /// Impressions carried by the pages to merge.
    pub impressions_at_stake: u64,
    /// Clicks carried by the pages to merge.
    pub clicks_at_stake: u64,
}

impl MergeSummary {
    /// Creates a summary from a list of recommendations.
    ///
    /// The at-stake totals add up counts from different queries and cap at
    /// `u64::MAX` rather than fail.
    pub fn from_recommendations(recommendations: &[MergeRecommendation]) -> Self {
        let mut queries = HashSet::new();
        let mut pages = HashSet::new();
        let mut targets = HashSet::new();
        let mut summary = Self {
            total: recommendations.len(),
            ..Self::default()
        };

        for rec in recommendations {
            queries.insert(rec.query.as_str());
            pages.insert(rec.page_to_merge.as_str());
            targets.insert(rec.merge_into.as_str());
            summary.impressions_at_stake =
                summary.impressions_at_stake.saturating_add(rec.impressions);
            summary.clicks_at_stake = summary.clicks_at_stake.saturating_add(rec.clicks);
        }

        summary.queries_with_candidates = queries.len();
        summary.distinct_pages_to_merge = pages.len();
        summary.distinct_targets = targets.len();
        summary
    }
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Input file path or search console property.
    pub source: String,
    /// Date and time of the run.
    pub analysis_date: DateTime<Utc>,
    pub min_impressions: i64,
    pub position_threshold: f64,
    /// Rows read from the source.
    pub observations_read: usize,
    /// Rows surviving the impression filter.
    pub observations_kept: usize,
    /// Unique (query, page) pairs after aggregation.
    pub aggregated_entries: usize,
    /// Distinct queries after aggregation.
    pub queries: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete merge report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: MergeSummary,
    pub recommendations: Vec<MergeRecommendation>,
    pub groups: Vec<QueryMergeGroup>,
}
