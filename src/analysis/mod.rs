//! Merge-recommendation engine.
//!
//! Aggregation feeds recommendation; both are pure functions over
//! in-memory rows.

pub mod aggregator;
pub mod recommender;

pub use aggregator::*;
pub use recommender::*;

use crate::error::EngineError;

/// Reject a negative impression floor.
pub fn check_min_impressions(min_impressions: i64) -> Result<(), EngineError> {
    if min_impressions < 0 {
        return Err(EngineError::Validation(format!(
            "min_impressions must be >= 0, got {}",
            min_impressions
        )));
    }
    Ok(())
}

/// Reject a position threshold that is not a positive finite number.
pub fn check_position_threshold(position_threshold: f64) -> Result<(), EngineError> {
    if !position_threshold.is_finite() || position_threshold <= 0.0 {
        return Err(EngineError::Validation(format!(
            "position_threshold must be a positive number, got {}",
            position_threshold
        )));
    }
    Ok(())
}

/// Check both thresholds up front, before any input is read.
pub fn validate_thresholds(
    min_impressions: i64,
    position_threshold: f64,
) -> Result<(), EngineError> {
    check_min_impressions(min_impressions)?;
    check_position_threshold(position_threshold)
}
