use thiserror::Error;

/// Unified error type for `evstudy` operations.
///
/// Degenerate designs (too few rows, no variation in the post indicator) are
/// not errors; estimators report those through NaN sentinels or empty tables.
#[derive(Debug, Error)]
pub enum EventStudyError {
    /// Raised when a column the caller asked for is absent from the panel.
    #[error("required column `{column}` is missing from the panel")]
    MissingColumn { column: String },

    /// Raised when panel columns or matrices have incompatible lengths.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension, usually the panel row count.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when a cross-product matrix cannot be factorized even after
    /// collinear columns were pruned.
    #[error("matrix in {context} is singular")]
    SingularMatrix { context: &'static str },

    /// Raised when event-time bins are malformed.
    #[error("invalid event-time bins: {reason}")]
    InvalidBins { reason: String },

    /// Raised when a study configuration fails validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Raised when a date join keeps fewer than half of the base dates.
    #[error("catastrophic merge: match rate {match_rate:.4} is below 0.5; check date alignment")]
    CatastrophicMerge { match_rate: f64 },

    /// Raised when an operation needs at least one row.
    #[error("{context} requires a non-empty panel")]
    EmptyPanel { context: &'static str },
}

impl EventStudyError {
    /// Helper to format a [`MissingColumn`](EventStudyError::MissingColumn) error.
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Helper to format a [`DimensionMismatch`](EventStudyError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper to raise when a matrix factorization fails due to singularity.
    pub fn singular(context: &'static str) -> Self {
        Self::SingularMatrix { context }
    }

    /// Helper to reject a study configuration with a reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, EventStudyError>;
