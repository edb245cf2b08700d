//! Error types for compliance checks and the audit trail.

use bastion_core::CoreError;
use thiserror::Error;

/// Result type for compliance operations.
pub type ComplianceResult<T> = Result<T, ComplianceError>;

/// Errors that can occur in the compliance layer.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// Rule type label not recognized.
    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    /// Rule parameters could not be interpreted.
    #[error("invalid parameters for rule '{rule}': {reason}")]
    InvalidParameters {
        /// Rule name.
        rule: String,
        /// What was wrong.
        reason: String,
    },

    /// Neither an IP address nor a CIDR range.
    #[error("invalid IP address or range: {0}")]
    InvalidAddress(String),

    /// Audit record could not be written or read.
    #[error("audit storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed domain input.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ComplianceError {
    /// Create an invalid parameters error.
    #[must_use]
    pub fn invalid_parameters(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ComplianceError::UnknownRuleType("insider".into());
        assert_eq!(err.to_string(), "unknown rule type: insider");

        let err = ComplianceError::invalid_parameters("trading_hours", "bad time '25:00'");
        assert_eq!(
            err.to_string(),
            "invalid parameters for rule 'trading_hours': bad time '25:00'"
        );
    }
}
