//! Return statistics primitives.
//!
//! Every estimator operates on a single return sample and comes in two forms:
//!
//! - a fallible form returning [`RiskResult`], which distinguishes
//!   "insufficient data" from a computed value at the type level
//! - an `*_or_default` form that logs the failure and returns the documented
//!   default (0.0, or 1.0 for beta), for callers that must keep running
//!
//! Sample moments use the `n - 1` denominator throughout.

mod correlation;
mod performance;
mod var;

pub use correlation::*;
pub use performance::*;
pub use var::*;

use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Descriptive statistics for a return sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    /// Number of observations
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Smallest return
    pub min: f64,
    /// Largest return
    pub max: f64,
}

impl ReturnStats {
    /// Computes descriptive statistics; needs at least two observations.
    pub fn from_returns(returns: &[f64]) -> RiskResult<Self> {
        ensure_len(returns, 2)?;
        Ok(Self {
            count: returns.len(),
            mean: mean(returns),
            std_dev: sample_std(returns),
            min: returns.iter().copied().fold(f64::INFINITY, f64::min),
            max: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Arithmetic mean; 0.0 for an empty sample.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with `n - 1` denominator; 0.0 below two observations.
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Sample standard deviation with `n - 1` denominator.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Sample covariance of two equal-length samples.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> RiskResult<f64> {
    if x.len() != y.len() {
        return Err(RiskError::InvalidInput(format!(
            "sample lengths differ: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    ensure_len(x, 2)?;
    let mx = mean(x);
    let my = mean(y);
    let sum: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Ok(sum / (x.len() - 1) as f64)
}

/// Copies and sorts a sample ascending (worst returns first).
pub(crate) fn sorted_ascending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

pub(crate) fn ensure_len(values: &[f64], required: usize) -> RiskResult<()> {
    if values.len() < required {
        return Err(RiskError::insufficient(required, values.len()));
    }
    Ok(())
}

pub(crate) fn ensure_confidence(confidence: f64) -> RiskResult<()> {
    if confidence <= 0.0 || confidence >= 1.0 || confidence.is_nan() {
        return Err(RiskError::InvalidInput(
            "confidence level must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        // Sample variance: 32 / 7
        assert_relative_eq!(sample_variance(&values), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(sample_std(&values), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_samples() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(sample_variance(&[1.0]), 0.0);
        assert!(ReturnStats::from_returns(&[0.01]).is_err());
    }

    #[test]
    fn test_covariance() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(sample_covariance(&x, &y).unwrap(), 2.0 * sample_variance(&x));
        assert!(sample_covariance(&x, &y[..3]).is_err());
    }

    #[test]
    fn test_return_stats() {
        let stats = ReturnStats::from_returns(&[-0.02, 0.01, 0.04]).unwrap();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 0.01, epsilon = 1e-12);
        assert_relative_eq!(stats.min, -0.02);
        assert_relative_eq!(stats.max, 0.04);
        assert_relative_eq!(stats.std_dev, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_confidence_validation() {
        assert!(ensure_confidence(0.95).is_ok());
        assert!(ensure_confidence(0.0).is_err());
        assert!(ensure_confidence(1.0).is_err());
        assert!(ensure_confidence(f64::NAN).is_err());
    }
}
