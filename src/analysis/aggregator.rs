//! Observation aggregation.
//!
//! Collapses raw per-row observations into one entry per (query, page)
//! pair. Entries come out in the order their pair was first seen.

use crate::error::EngineError;
use crate::models::{AggregatedEntry, Observation, RawObservation};
use std::collections::HashMap;
use tracing::debug;

/// Running totals for one (query, page) pair.
struct Accumulator<'a> {
    query: &'a str,
    page: &'a str,
    impressions: u64,
    clicks: u64,
    position_sum: f64,
    count: usize,
}

impl Accumulator<'_> {
    fn finish(self) -> AggregatedEntry {
        AggregatedEntry {
            query: self.query.to_string(),
            page: self.page.to_string(),
            total_impressions: self.impressions,
            total_clicks: self.clicks,
            mean_position: self.position_sum / self.count as f64,
            observations: self.count,
        }
    }
}

/// Filter out low-impression rows and group the rest by (query, page).
///
/// Impressions and clicks are summed; position is the unweighted mean of
/// the surviving rows in each group.
pub fn aggregate(
    observations: &[Observation],
    min_impressions: i64,
) -> Result<Vec<AggregatedEntry>, EngineError> {
    super::check_min_impressions(min_impressions)?;
    let min_impressions = min_impressions as u64;

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Accumulator<'_>> = Vec::new();
    let mut dropped = 0usize;

    for obs in observations {
        if obs.impressions < min_impressions {
            dropped += 1;
            continue;
        }

        let key = (obs.query.as_str(), obs.page.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Accumulator {
                query: key.0,
                page: key.1,
                impressions: 0,
                clicks: 0,
                position_sum: 0.0,
                count: 0,
            });
            groups.len() - 1
        });

        let acc = &mut groups[slot];
        acc.impressions = acc
            .impressions
            .checked_add(obs.impressions)
            .ok_or_else(|| overflow(obs, "impressions"))?;
        acc.clicks = acc
            .clicks
            .checked_add(obs.clicks)
            .ok_or_else(|| overflow(obs, "clicks"))?;
        acc.position_sum += obs.position;
        acc.count += 1;
    }

    debug!(
        "Aggregated {} observations into {} entries ({} below {} impressions)",
        observations.len(),
        groups.len(),
        dropped,
        min_impressions
    );

    Ok(groups.into_iter().map(Accumulator::finish).collect())
}

fn overflow(obs: &Observation, field: &'static str) -> EngineError {
    EngineError::Overflow {
        query: obs.query.clone(),
        page: obs.page.clone(),
        field,
    }
}

/// Validate raw rows, then aggregate them.
///
/// A single malformed row fails the whole pass.
pub fn aggregate_raw(
    rows: &[RawObservation],
    min_impressions: i64,
) -> Result<Vec<AggregatedEntry>, EngineError> {
    let observations = validate_rows(rows)?;
    aggregate(&observations, min_impressions)
}

/// Convert every raw row, stopping at the first schema error.
pub fn validate_rows(rows: &[RawObservation]) -> Result<Vec<Observation>, EngineError> {
    rows.iter().map(RawObservation::parse).collect()
}

/// Number of distinct queries among aggregated entries.
pub fn distinct_queries(entries: &[AggregatedEntry]) -> usize {
    let mut seen: Vec<&str> = entries.iter().map(|e| e.query.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
