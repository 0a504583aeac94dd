//! Report generation.
//!
//! Renders a [`Report`] as a CSV table (flat or one row per query),
//! a Markdown document, or JSON.

use crate::analysis::top_queries_by_impressions;
use crate::models::{MergeSummary, QueryMergeGroup, Report, ReportMetadata};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::io::Write;
use std::path::Path;

/// Columns of the flat CSV layout, one row per page to merge.
pub const FLAT_HEADERS: [&str; 9] = [
    "Query",
    "Page to Merge",
    "Merge Into",
    "Impressions",
    "Url Clicks",
    "Average Position",
    "Impressions (Merge Into)",
    "Url Clicks (Merge Into)",
    "Average Position (Merge Into)",
];

/// Columns of the grouped CSV layout, one row per query.
pub const GROUPED_HEADERS: [&str; 10] = [
    "Query",
    "Pages to Merge",
    "Impressions (Pages to Merge)",
    "Url Clicks (Pages to Merge)",
    "Average Positions (Pages to Merge)",
    "Number of Pages to Merge",
    "Merge Into",
    "Average Position (Merge Into)",
    "Impressions (Merge Into)",
    "Url Clicks (Merge Into)",
];

const LIST_SEPARATOR: &str = ", ";

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Generate the CSV table. The header row is always present.
pub fn generate_csv_report(report: &Report, grouped: bool) -> Result<String> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    if grouped {
        writer.write_record(GROUPED_HEADERS)?;
        for group in &report.groups {
            writer.write_record([
                group.query.clone(),
                join(group.pages.iter().map(|p| p.page.as_str())),
                join(group.pages.iter().map(|p| p.impressions)),
                join(group.pages.iter().map(|p| p.clicks)),
                join(group.pages.iter().map(|p| p.mean_position)),
                group.page_count().to_string(),
                group.merge_into.clone(),
                group.merge_into_mean_position.to_string(),
                group.merge_into_impressions.to_string(),
                group.merge_into_clicks.to_string(),
            ])?;
        }
    } else {
        writer.write_record(FLAT_HEADERS)?;
        for rec in &report.recommendations {
            writer.write_record([
                rec.query.clone(),
                rec.page_to_merge.clone(),
                rec.merge_into.clone(),
                rec.impressions.to_string(),
                rec.clicks.to_string(),
                rec.mean_position.to_string(),
                rec.merge_into_impressions.to_string(),
                rec.merge_into_clicks.to_string(),
                rec.merge_into_mean_position.to_string(),
            ])?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Landing Page Merge Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, &report.groups));
    output.push_str(&generate_recommendations_section(&report.groups));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Minimum Impressions:** {}\n",
        metadata.min_impressions
    ));
    section.push_str(&format!(
        "- **Position Threshold:** {}\n",
        metadata.position_threshold
    ));
    section.push_str(&format!(
        "- **Rows Read:** {} ({} kept)\n",
        metadata.observations_read, metadata.observations_kept
    ));
    section.push_str(&format!(
        "- **Query/Page Pairs:** {} across {} queries\n",
        metadata.aggregated_entries, metadata.queries
    ));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &MergeSummary, groups: &[QueryMergeGroup]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Recommendations | Queries | Pages to Merge | Target Pages | Impressions | Clicks |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.total,
        summary.queries_with_candidates,
        summary.distinct_pages_to_merge,
        summary.distinct_targets,
        summary.impressions_at_stake,
        summary.clicks_at_stake
    ));

    let top = top_queries_by_impressions(groups, 5);
    if !top.is_empty() {
        section.push_str("### Top Queries by Impressions at Stake\n\n");
        section.push_str("| Query | Pages to Merge | Impressions |\n");
        section.push_str("|:---|:---:|:---:|\n");

        for group in top {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                escape_cell(&group.query),
                group.page_count(),
                group.impressions_at_stake()
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the per-query recommendations section.
fn generate_recommendations_section(groups: &[QueryMergeGroup]) -> String {
    let mut section = String::new();

    section.push_str("## Merge Recommendations\n\n");

    if groups.is_empty() {
        section.push_str("No merge recommendations found with the current criteria.\n\n");
        return section;
    }

    for group in groups {
        section.push_str(&generate_group_block(group));
    }

    section
}

/// Generate the block for a single query.
fn generate_group_block(group: &QueryMergeGroup) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", escape_cell(&group.query)));
    block.push_str(&format!(
        "**Merge into:** `{}` (position {:.1}, {} impressions, {} clicks)\n\n",
        group.merge_into,
        group.merge_into_mean_position,
        group.merge_into_impressions,
        group.merge_into_clicks
    ));

    block.push_str("| Page to Merge | Average Position | Impressions | Url Clicks |\n");
    block.push_str("|:---|:---:|:---:|:---:|\n");
    for page in &group.pages {
        block.push_str(&format!(
            "| `{}` | {:.1} | {} | {} |\n",
            escape_cell(&page.page),
            page.mean_position,
            page.impressions,
            page.clicks
        ));
    }
    block.push('\n');

    block
}

/// Pipes would split a Markdown table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by PageMerger*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered output to a file, `-` meaning stdout.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if path == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
