//! Correlation and covariance matrices over aligned return columns.

use bastion_core::Symbol;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{ensure_len, mean, sample_std};
use crate::error::{RiskError, RiskResult};

/// Builds the `T x N` sample matrix from equal-length columns.
fn sample_matrix(columns: &[&[f64]]) -> RiskResult<DMatrix<f64>> {
    let Some(first) = columns.first() else {
        return Err(RiskError::InvalidInput("no return columns".to_string()));
    };
    let rows = first.len();
    if columns.iter().any(|c| c.len() != rows) {
        return Err(RiskError::InvalidInput(
            "return columns must have equal length".to_string(),
        ));
    }
    ensure_len(first, 2)?;
    Ok(DMatrix::from_fn(rows, columns.len(), |i, j| columns[j][i]))
}

/// Sample covariance matrix (`n - 1` denominator).
pub fn covariance_matrix(columns: &[&[f64]]) -> RiskResult<DMatrix<f64>> {
    let samples = sample_matrix(columns)?;
    let means = DVector::from_iterator(columns.len(), columns.iter().map(|c| mean(c)));

    let mut centered = samples;
    for (j, mut col) in centered.column_iter_mut().enumerate() {
        col.add_scalar_mut(-means[j]);
    }

    let n = centered.nrows() as f64;
    Ok(centered.transpose() * &centered / (n - 1.0))
}

/// Pearson correlation matrix.
///
/// A column with zero variance is uncorrelated with every other column.
pub fn correlation_matrix(columns: &[&[f64]]) -> RiskResult<DMatrix<f64>> {
    let cov = covariance_matrix(columns)?;
    let std: Vec<f64> = columns.iter().map(|c| sample_std(c)).collect();
    let n = columns.len();

    Ok(DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            1.0
        } else if std[i] == 0.0 || std[j] == 0.0 {
            0.0
        } else {
            (cov[(i, j)] / (std[i] * std[j])).clamp(-1.0, 1.0)
        }
    }))
}

/// Covariance from per-asset volatilities and a correlation matrix:
/// `Σ = (σ σᵀ) ∘ ρ`.
pub fn covariance_from_correlation(
    volatilities: &[f64],
    correlation: &DMatrix<f64>,
) -> RiskResult<DMatrix<f64>> {
    let n = volatilities.len();
    if correlation.nrows() != n || correlation.ncols() != n {
        return Err(RiskError::InvalidInput(format!(
            "correlation matrix is {}x{}, expected {n}x{n}",
            correlation.nrows(),
            correlation.ncols()
        )));
    }
    let vol = DVector::from_column_slice(volatilities);
    Ok((&vol * vol.transpose()).component_mul(correlation))
}

/// Portfolio variance `wᵀ Σ w`.
pub fn portfolio_variance(weights: &[f64], covariance: &DMatrix<f64>) -> RiskResult<f64> {
    if covariance.nrows() != weights.len() || covariance.ncols() != weights.len() {
        return Err(RiskError::InvalidInput(
            "weights and covariance dimensions differ".to_string(),
        ));
    }
    let w = DVector::from_column_slice(weights);
    Ok((w.transpose() * covariance * &w)[(0, 0)])
}

/// Labelled correlation matrix suitable for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Row and column labels.
    pub symbols: Vec<Symbol>,
    /// Row-major correlation values.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Labels a square matrix.
    pub fn new(symbols: Vec<Symbol>, matrix: &DMatrix<f64>) -> Self {
        let values = matrix
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect();
        Self { symbols, values }
    }

    /// Correlation between two symbols.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s.as_str() == a)?;
        let j = self.symbols.iter().position(|s| s.as_str() == b)?;
        Some(self.values[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::sample_variance;
    use approx::assert_relative_eq;

    #[test]
    fn test_covariance_matrix() {
        let a = [0.01, -0.02, 0.03, 0.00];
        let b = [0.02, -0.04, 0.06, 0.00];
        let cov = covariance_matrix(&[&a[..], &b[..]]).unwrap();

        assert_relative_eq!(cov[(0, 0)], sample_variance(&a), epsilon = 1e-15);
        assert_relative_eq!(cov[(0, 1)], 2.0 * sample_variance(&a), epsilon = 1e-15);
        assert_relative_eq!(cov[(1, 0)], cov[(0, 1)]);
    }

    #[test]
    fn test_correlation_matrix() {
        let a = [0.01, -0.02, 0.03, 0.00];
        let b = [-0.01, 0.02, -0.03, 0.00];
        let flat = [0.01, 0.01, 0.01, 0.01];
        let corr = correlation_matrix(&[&a[..], &b[..], &flat[..]]).unwrap();

        assert_relative_eq!(corr[(0, 1)], -1.0, epsilon = 1e-12);
        assert_relative_eq!(corr[(2, 2)], 1.0);
        assert_eq!(corr[(0, 2)], 0.0);
    }

    #[test]
    fn test_portfolio_variance() {
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let cov = covariance_from_correlation(&[0.02, 0.03], &corr).unwrap();
        let var = portfolio_variance(&[0.6, 0.4], &cov).unwrap();

        let expected = 0.36 * 0.0004 + 0.16 * 0.0009 + 2.0 * 0.6 * 0.4 * 0.5 * 0.02 * 0.03;
        assert_relative_eq!(var, expected, epsilon = 1e-15);
    }

    #[test]
    fn test_dimension_errors() {
        let corr = DMatrix::identity(3, 3);
        assert!(covariance_from_correlation(&[0.1, 0.2], &corr).is_err());
        assert!(portfolio_variance(&[0.5, 0.5], &corr).is_err());
        let ragged: [&[f64]; 2] = [&[0.1, 0.2], &[0.1]];
        assert!(correlation_matrix(&ragged).is_err());
    }

    #[test]
    fn test_labelled_matrix() {
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.3, 1.0]);
        let labelled = CorrelationMatrix::new(vec!["A".into(), "B".into()], &corr);
        assert_eq!(labelled.get("A", "B"), Some(0.3));
        assert_eq!(labelled.get("A", "Z"), None);
    }
}
