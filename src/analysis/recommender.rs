//! Merge recommendation.
//!
//! For every query the best-ranked page (lowest mean position, first seen
//! on ties) is the merge target. Any other page of the query is flagged
//! when its mean position is worse than both the threshold and the target.

use crate::error::EngineError;
use crate::models::{AggregatedEntry, MergeCandidate, MergeRecommendation, QueryMergeGroup};
use std::collections::HashMap;
use tracing::debug;

/// Partition entries by query, keeping first-seen query order and the
/// input order within each partition.
fn partition_by_query(entries: &[AggregatedEntry]) -> Vec<Vec<&AggregatedEntry>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut partitions: Vec<Vec<&AggregatedEntry>> = Vec::new();

    for entry in entries {
        let slot = *index.entry(entry.query.as_str()).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(entry);
    }

    partitions
}

/// Index of the entry with the lowest mean position; the earliest wins ties.
fn best_index(partition: &[&AggregatedEntry]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (i, entry) in partition.iter().enumerate() {
        match best {
            Some(b) if entry.mean_position >= partition[b].mean_position => {}
            _ => best = Some(i),
        }
    }

    best
}

/// Recommendations for a single query partition.
fn recommend_partition(
    partition: &[&AggregatedEntry],
    position_threshold: f64,
) -> Vec<MergeRecommendation> {
    let Some(best_at) = best_index(partition) else {
        return Vec::new();
    };
    let best = partition[best_at];

    partition
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != best_at)
        .map(|(_, entry)| *entry)
        .filter(|entry| {
            entry.mean_position > position_threshold && entry.mean_position > best.mean_position
        })
        .map(|entry| MergeRecommendation {
            query: entry.query.clone(),
            page_to_merge: entry.page.clone(),
            merge_into: best.page.clone(),
            impressions: entry.total_impressions,
            clicks: entry.total_clicks,
            mean_position: entry.mean_position,
            merge_into_impressions: best.total_impressions,
            merge_into_clicks: best.total_clicks,
            merge_into_mean_position: best.mean_position,
        })
        .collect()
}

/// Produce merge recommendations for aggregated entries.
///
/// Output follows first-seen query order, then input order within a query.
pub fn recommend(
    entries: &[AggregatedEntry],
    position_threshold: f64,
) -> Result<Vec<MergeRecommendation>, EngineError> {
    super::check_position_threshold(position_threshold)?;

    let partitions = partition_by_query(entries);
    let recommendations: Vec<MergeRecommendation> = partitions
        .iter()
        .flat_map(|partition| recommend_partition(partition, position_threshold))
        .collect();

    debug!(
        "{} recommendations across {} queries (threshold {})",
        recommendations.len(),
        partitions.len(),
        position_threshold
    );

    Ok(recommendations)
}

/// Collapse recommendations into one record per query.
///
/// Groups keep the order in which their query first appears.
pub fn group_by_query(recommendations: &[MergeRecommendation]) -> Vec<QueryMergeGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<QueryMergeGroup> = Vec::new();

    for rec in recommendations {
        let slot = *index.entry(rec.query.as_str()).or_insert_with(|| {
            groups.push(QueryMergeGroup {
                query: rec.query.clone(),
                merge_into: rec.merge_into.clone(),
                merge_into_impressions: rec.merge_into_impressions,
                merge_into_clicks: rec.merge_into_clicks,
                merge_into_mean_position: rec.merge_into_mean_position,
                pages: Vec::new(),
            });
            groups.len() - 1
        });

        groups[slot].pages.push(MergeCandidate {
            page: rec.page_to_merge.clone(),
            impressions: rec.impressions,
            clicks: rec.clicks,
            mean_position: rec.mean_position,
        });
    }

    groups
}

/// Get the top N query groups by impressions carried by their candidates.
pub fn top_queries_by_impressions(groups: &[QueryMergeGroup], n: usize) -> Vec<&QueryMergeGroup> {
    let mut ranked: Vec<&QueryMergeGroup> = groups.iter().collect();
    ranked.sort_by_key(|g| std::cmp::Reverse(g.impressions_at_stake()));
    ranked.truncate(n);
    ranked
}
