//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid price.
    #[error("Invalid price: {0}. Must be positive.")]
    InvalidPrice(f64),

    /// Invalid order quantity.
    #[error("Invalid quantity: {0}. Must be non-zero and finite.")]
    InvalidQuantity(f64),

    /// Invalid portfolio value.
    #[error("Invalid portfolio value: {0}. Must be positive.")]
    InvalidPortfolioValue(f64),

    /// Malformed input file.
    #[error("Invalid input in {path}: {message}")]
    Input {
        /// File being read.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },

    /// Symbol absent from the supplied data.
    #[error("No returns for symbol '{0}'")]
    UnknownSymbol(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Compliance blocked the order.
    #[error("Trade blocked by {0} compliance violation(s)")]
    TradeBlocked(usize),

    /// Pre-trade risk checks rejected the order.
    #[error("Trade rejected by risk checks: {0}")]
    RiskRejected(String),

    /// Audit log failed verification.
    #[error("Audit log integrity check failed: {corrupted} corrupted, {missing} without checksum")]
    IntegrityFailure {
        /// Events whose checksum did not match.
        corrupted: usize,
        /// Events with no checksum.
        missing: usize,
    },
}

impl CliError {
    /// Creates an input error for `path`.
    pub fn input(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
