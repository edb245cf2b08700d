//! Value at Risk and Expected Shortfall estimators.
//!
//! All estimators report VaR as a non-negative loss fraction: a cutoff
//! return of `-0.023` yields a VaR of `0.023`, and a sample whose tail
//! cutoff is a gain yields zero.

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::warn;

use super::{ensure_confidence, ensure_len, mean, sample_std, sorted_ascending};
use crate::error::{RiskError, RiskResult};

/// Minimum sample size for any VaR or CVaR estimate.
pub const MIN_VAR_OBSERVATIONS: usize = 30;

// Absorbs representation error in (1 - c) * n, e.g. (1 - 0.95) * 100.
const INDEX_TOLERANCE: f64 = 1e-9;

/// Index of the VaR cutoff in an ascending sample of `n` returns.
///
/// Uses `ceil(n * (1 - c)) - 1`, floored at zero.
#[must_use]
pub fn tail_index(n: usize, confidence: f64) -> usize {
    let raw = (1.0 - confidence) * n as f64;
    let count = (raw - INDEX_TOLERANCE).ceil().max(1.0) as usize;
    (count - 1).min(n.saturating_sub(1))
}

/// Standard normal quantile at probability `p`.
pub fn z_score(p: f64) -> RiskResult<f64> {
    ensure_confidence(p)?;
    let normal =
        Normal::new(0.0, 1.0).map_err(|e| RiskError::CalculationFailed(e.to_string()))?;
    Ok(normal.inverse_cdf(p))
}

/// Historical VaR as a loss fraction.
///
/// # Arguments
///
/// * `returns` - Daily returns (as decimals, e.g., -0.01 for -1%)
/// * `confidence` - Confidence level (e.g., 0.95 for 95%)
///
/// # Errors
///
/// `InsufficientData` below [`MIN_VAR_OBSERVATIONS`] returns.
pub fn historical_var(returns: &[f64], confidence: f64) -> RiskResult<f64> {
    ensure_confidence(confidence)?;
    ensure_len(returns, MIN_VAR_OBSERVATIONS)?;

    let sorted = sorted_ascending(returns);
    let cutoff = sorted[tail_index(sorted.len(), confidence)];

    Ok((-cutoff).max(0.0))
}

/// Historical VaR in currency terms.
pub fn historical_var_amount(returns: &[f64], confidence: f64, investment: f64) -> RiskResult<f64> {
    Ok(historical_var(returns, confidence)? * investment.abs())
}

/// Parametric (variance-covariance) VaR in currency terms.
///
/// `VaR = -(mean + z(1 - c) * std) * investment`, clipped at zero.
pub fn parametric_var(returns: &[f64], confidence: f64, investment: f64) -> RiskResult<f64> {
    ensure_confidence(confidence)?;
    ensure_len(returns, MIN_VAR_OBSERVATIONS)?;

    let z = z_score(1.0 - confidence)?;
    let var = -(mean(returns) + z * sample_std(returns)) * investment.abs();

    Ok(var.max(0.0))
}

/// Conditional VaR (Expected Shortfall) as a loss fraction.
///
/// Mean of every sorted return at or below the VaR cutoff index.
pub fn conditional_var(returns: &[f64], confidence: f64) -> RiskResult<f64> {
    ensure_confidence(confidence)?;
    ensure_len(returns, MIN_VAR_OBSERVATIONS)?;

    let sorted = sorted_ascending(returns);
    let idx = tail_index(sorted.len(), confidence);
    let tail_mean = mean(&sorted[..=idx]);

    Ok((-tail_mean).max(0.0))
}

/// [`historical_var`], logging failures and returning 0.0.
#[must_use]
pub fn historical_var_or_default(returns: &[f64], confidence: f64) -> f64 {
    historical_var(returns, confidence).unwrap_or_else(|e| {
        warn!(error = %e, confidence, "historical VaR unavailable, using 0.0");
        0.0
    })
}

/// [`parametric_var`], logging failures and returning 0.0.
#[must_use]
pub fn parametric_var_or_default(returns: &[f64], confidence: f64, investment: f64) -> f64 {
    parametric_var(returns, confidence, investment).unwrap_or_else(|e| {
        warn!(error = %e, confidence, "parametric VaR unavailable, using 0.0");
        0.0
    })
}

/// [`conditional_var`], logging failures and returning 0.0.
#[must_use]
pub fn conditional_var_or_default(returns: &[f64], confidence: f64) -> f64 {
    conditional_var(returns, confidence).unwrap_or_else(|e| {
        warn!(error = %e, confidence, "CVaR unavailable, using 0.0");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 100 returns: -0.050, -0.049, ..., 0.049
    fn ladder() -> Vec<f64> {
        (0..100).map(|i| (i as f64 - 50.0) / 1000.0).collect()
    }

    #[test]
    fn test_tail_index() {
        assert_eq!(tail_index(100, 0.95), 4);
        assert_eq!(tail_index(100, 0.99), 0);
        assert_eq!(tail_index(30, 0.95), 1);
        assert_eq!(tail_index(252, 0.95), 12);
        assert_eq!(tail_index(10, 0.999), 0);
    }

    #[test]
    fn test_historical_var() {
        let var = historical_var(&ladder(), 0.95).unwrap();
        // Fifth worst return is -0.046
        assert_relative_eq!(var, 0.046, epsilon = 1e-12);

        let var_99 = historical_var(&ladder(), 0.99).unwrap();
        assert_relative_eq!(var_99, 0.050, epsilon = 1e-12);

        let amount = historical_var_amount(&ladder(), 0.95, 1_000_000.0).unwrap();
        assert_relative_eq!(amount, 46_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_historical_var_all_gains() {
        let returns: Vec<f64> = (1..=40).map(|i| i as f64 / 1000.0).collect();
        assert_eq!(historical_var(&returns, 0.95).unwrap(), 0.0);
        assert_eq!(conditional_var(&returns, 0.95).unwrap(), 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let short = vec![-0.01; 29];
        assert!(matches!(
            historical_var(&short, 0.95),
            Err(RiskError::InsufficientData { required: 30, actual: 29 })
        ));
        assert_eq!(historical_var_or_default(&short, 0.95), 0.0);
        assert_eq!(parametric_var_or_default(&short, 0.95, 1e6), 0.0);
        assert_eq!(conditional_var_or_default(&[], 0.95), 0.0);
    }

    #[test]
    fn test_invalid_confidence() {
        assert!(matches!(
            historical_var(&ladder(), 1.5),
            Err(RiskError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_conditional_var() {
        let cvar = conditional_var(&ladder(), 0.95).unwrap();
        // Mean of -0.050 .. -0.046
        assert_relative_eq!(cvar, 0.048, epsilon = 1e-12);
        assert!(cvar >= historical_var(&ladder(), 0.95).unwrap());
    }

    #[test]
    fn test_z_score() {
        assert_relative_eq!(z_score(0.95).unwrap(), 1.6448536269514722, epsilon = 1e-9);
        assert_relative_eq!(z_score(0.05).unwrap(), -1.6448536269514722, epsilon = 1e-9);
        assert!(z_score(0.0).is_err());
    }

    #[test]
    fn test_parametric_var() {
        let returns = ladder();
        let std = sample_std(&returns);
        let expected = -(mean(&returns) - 1.6448536269514722 * std) * 1_000_000.0;

        let var = parametric_var(&returns, 0.95, 1_000_000.0).unwrap();
        assert_relative_eq!(var, expected, epsilon = 1e-3);
        assert!(var > 0.0);
    }

    #[test]
    fn test_parametric_var_clipped() {
        // Strong positive drift, tiny dispersion
        let returns: Vec<f64> = (0..40).map(|i| 0.05 + (i % 2) as f64 * 1e-4).collect();
        assert_eq!(parametric_var(&returns, 0.95, 1_000.0).unwrap(), 0.0);
    }
}
