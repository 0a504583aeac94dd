//! Typed errors raised by the merge-recommendation engine.
//!
//! The application layer wraps these in `anyhow` with context; the engine
//! itself never recovers from them.

use thiserror::Error;

/// Errors produced by aggregation and recommendation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// An input row is missing a required field or carries a value that
    /// does not parse.
    #[error("schema error in row {row}, field `{field}`: {reason}")]
    Schema {
        /// 1-based data row number (header excluded).
        row: usize,
        /// Column that failed.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A configuration value is out of its domain.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A (query, page) total no longer fits in a 64-bit counter.
    #[error("{field} total for query `{query}`, page `{page}` overflows")]
    Overflow {
        query: String,
        page: String,
        field: &'static str,
    },
}

impl EngineError {
    pub(crate) fn schema(row: usize, field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Schema {
            row,
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_message() {
        let err = EngineError::schema(3, "clicks", "`abc` is not a non-negative integer");
        assert_eq!(
            err.to_string(),
            "schema error in row 3, field `clicks`: `abc` is not a non-negative integer"
        );
    }

    #[test]
    fn test_validation_error_message() {
        let err = EngineError::Validation("position_threshold must be > 0".to_string());
        assert!(err.to_string().contains("position_threshold"));
    }

    #[test]
    fn test_overflow_error_message() {
        let err = EngineError::Overflow {
            query: "cats".to_string(),
            page: "/a".to_string(),
            field: "impressions",
        };
        assert_eq!(
            err.to_string(),
            "impressions total for query `cats`, page `/a` overflows"
        );
    }
}
