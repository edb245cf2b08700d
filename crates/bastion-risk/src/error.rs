//! Error types for risk calculations.

use bastion_core::CoreError;
use thiserror::Error;

/// Result type for risk calculations.
pub type RiskResult<T> = Result<T, RiskError>;

/// Errors that can occur during risk calculations.
#[derive(Debug, Clone, Error)]
pub enum RiskError {
    /// Invalid input parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Sample too small for the estimator
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Minimum number of observations.
        required: usize,
        /// Observations supplied.
        actual: usize,
    },

    /// Return series could not be aligned on common dates
    #[error("alignment failed: {0}")]
    Alignment(String),

    /// Division by zero
    #[error("division by zero in {context}")]
    DivisionByZero {
        /// Where the zero denominator appeared.
        context: String,
    },

    /// Calculation failed
    #[error("calculation failed: {0}")]
    CalculationFailed(String),

    /// Malformed domain input
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RiskError {
    /// Create an insufficient data error.
    #[must_use]
    pub fn insufficient(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Create a division by zero error.
    #[must_use]
    pub fn division_by_zero(context: impl Into<String>) -> Self {
        Self::DivisionByZero {
            context: context.into(),
        }
    }

    /// Returns true when the error only reflects a too-small sample.
    #[must_use]
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
