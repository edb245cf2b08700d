//! Error types for core domain types.

use thiserror::Error;

/// A specialized Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised when constructing or parsing domain types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Return series dates are not strictly increasing.
    #[error("Invalid return series: {reason}")]
    InvalidSeries {
        /// Description of the problem.
        reason: String,
    },

    /// A value that must be finite was NaN or infinite.
    #[error("Non-finite value for {field}: {value}")]
    NonFinite {
        /// The field holding the value.
        field: String,
        /// The offending value.
        value: f64,
    },

    /// A severity label could not be parsed.
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    /// Invalid trade order.
    #[error("Invalid trade order: {reason}")]
    InvalidOrder {
        /// Description of the problem.
        reason: String,
    },
}

impl CoreError {
    /// Create an invalid series error.
    #[must_use]
    pub fn invalid_series(reason: impl Into<String>) -> Self {
        Self::InvalidSeries {
            reason: reason.into(),
        }
    }

    /// Create a non-finite value error.
    #[must_use]
    pub fn non_finite(field: impl Into<String>, value: f64) -> Self {
        Self::NonFinite {
            field: field.into(),
            value,
        }
    }

    /// Create an invalid order error.
    #[must_use]
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidOrder {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_series("dates out of order");
        assert!(err.to_string().contains("dates out of order"));

        let err = CoreError::non_finite("return", f64::NAN);
        assert!(err.to_string().contains("return"));

        let err = CoreError::UnknownSeverity("FATAL".into());
        assert_eq!(err.to_string(), "Unknown severity: FATAL");
    }
}
