//! Portfolio-level risk metrics.
//!
//! [`RiskCalculator`] turns positions and per-instrument returns into a
//! [`RiskMetrics`] bundle in one pass:
//!
//! ```ignore
//! use bastion_risk::prelude::*;
//!
//! let calc = RiskCalculator::new(RiskParameters::default());
//! let metrics = calc.portfolio_risk(&portfolio, &returns)?;
//! println!("VaR(95%): {:.4}", metrics.var_95);
//! ```

use bastion_core::{Portfolio, ReturnSeries, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::aggregation::{align_returns, herfindahl_index, portfolio_returns, ReturnMap};
use crate::error::RiskResult;
use crate::stats::{
    beta_or_default, conditional_var_or_default, correlation_matrix,
    daily_volatility_or_default, downside_deviation_or_default, historical_var_or_default,
    max_drawdown_or_default, sharpe_ratio_or_default, CorrelationMatrix,
    DEFAULT_VOLATILITY_WINDOW,
};

/// Parameters for metric computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Annual risk-free rate used by the Sharpe ratio.
    pub risk_free_rate: f64,
    /// Trailing window for VaR and CVaR, in observations.
    pub var_lookback: usize,
    /// Trailing window for volatility, in observations.
    pub volatility_window: usize,
    /// Whether to attach the instrument correlation matrix.
    pub include_correlation: bool,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            var_lookback: 252,
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
            include_correlation: true,
        }
    }
}

/// Fixed record of portfolio risk metrics.
///
/// VaR and CVaR are non-negative loss fractions; `max_drawdown` is
/// negative-signed. Produced fresh by every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Historical VaR at 95%.
    pub var_95: f64,
    /// Historical VaR at 99%.
    pub var_99: f64,
    /// Expected shortfall at 95%.
    pub cvar_95: f64,
    /// Expected shortfall at 99%.
    pub cvar_99: f64,
    /// Daily standard deviation.
    pub daily_volatility: f64,
    /// Daily standard deviation × √252.
    pub annualized_volatility: f64,
    /// Most negative peak-to-trough decline.
    pub max_drawdown: f64,
    /// Daily semi-deviation of negative returns.
    pub downside_deviation: f64,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Herfindahl index of position weights.
    pub concentration_risk: f64,
    /// Beta against the benchmark, when one is supplied.
    pub beta: Option<f64>,
    /// Instrument correlations, when requested and computable.
    pub correlation: Option<CorrelationMatrix>,
    /// Number of aggregated return observations.
    pub observations: usize,
    /// Computation timestamp.
    pub computed_at: DateTime<Utc>,
}

impl RiskMetrics {
    /// Computes every single-series metric for a return path.
    #[must_use]
    pub fn from_returns(returns: &[f64], params: &RiskParameters) -> Self {
        let start = returns.len().saturating_sub(params.var_lookback);
        let tail = &returns[start..];
        let daily_volatility = daily_volatility_or_default(returns, params.volatility_window);

        Self {
            var_95: historical_var_or_default(tail, 0.95),
            var_99: historical_var_or_default(tail, 0.99),
            cvar_95: conditional_var_or_default(tail, 0.95),
            cvar_99: conditional_var_or_default(tail, 0.99),
            daily_volatility,
            annualized_volatility: daily_volatility
                * bastion_core::types::TRADING_DAYS_PER_YEAR.sqrt(),
            max_drawdown: max_drawdown_or_default(returns),
            downside_deviation: downside_deviation_or_default(returns),
            sharpe_ratio: sharpe_ratio_or_default(returns, params.risk_free_rate),
            concentration_risk: 0.0,
            beta: None,
            correlation: None,
            observations: returns.len(),
            computed_at: Utc::now(),
        }
    }
}

/// Calculator for portfolio risk metrics.
#[derive(Debug, Clone, Default)]
pub struct RiskCalculator {
    params: RiskParameters,
    benchmark: Option<ReturnSeries>,
}

impl RiskCalculator {
    /// Creates a calculator.
    #[must_use]
    pub fn new(params: RiskParameters) -> Self {
        Self {
            params,
            benchmark: None,
        }
    }

    /// Sets a benchmark series; metrics then carry a portfolio beta.
    #[must_use]
    pub fn with_benchmark(mut self, benchmark: ReturnSeries) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    /// Computes portfolio risk metrics.
    ///
    /// # Errors
    ///
    /// `Alignment` when the held instruments share no return dates or the
    /// portfolio has zero gross value. Every other data problem degrades to
    /// the documented per-metric default.
    pub fn portfolio_risk(
        &self,
        portfolio: &Portfolio,
        returns: &ReturnMap,
    ) -> RiskResult<RiskMetrics> {
        let port = portfolio_returns(portfolio, returns).map_err(|e| {
            error!(error = %e, positions = portfolio.len(), "portfolio risk unavailable");
            e
        })?;

        let mut metrics = RiskMetrics::from_returns(port.values(), &self.params);
        metrics.concentration_risk = herfindahl_index(portfolio);
        metrics.beta = self.benchmark.as_ref().map(|b| beta_or_default(&port, b));

        if self.params.include_correlation {
            metrics.correlation = correlations(portfolio.symbols(), returns);
        }

        debug!(
            var_95 = metrics.var_95,
            volatility = metrics.annualized_volatility,
            concentration = metrics.concentration_risk,
            observations = metrics.observations,
            "computed portfolio risk"
        );

        Ok(metrics)
    }
}

fn correlations<'a>(
    symbols: impl IntoIterator<Item = &'a Symbol>,
    returns: &ReturnMap,
) -> Option<CorrelationMatrix> {
    let aligned = align_returns(symbols, returns).ok()?;
    if aligned.columns.len() < 2 {
        return None;
    }
    let labels: Vec<Symbol> = aligned.symbols().cloned().collect();
    let columns: Vec<&[f64]> = aligned.columns.values().map(Vec::as_slice).collect();
    let matrix = correlation_matrix(&columns).ok()?;
    Some(CorrelationMatrix::new(labels, &matrix))
}

/// Computes portfolio risk metrics with default parameters.
pub fn compute_portfolio_risk(portfolio: &Portfolio, returns: &ReturnMap) -> RiskResult<RiskMetrics> {
    RiskCalculator::default().portfolio_risk(portfolio, returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::stats::historical_var;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn wave(n: usize, amplitude: f64, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * ((i as f64) * 0.7 + phase).sin())
            .collect()
    }

    fn returns_for(entries: &[(&str, Vec<f64>)]) -> ReturnMap {
        entries
            .iter()
            .map(|(s, v)| (Symbol::from(*s), ReturnSeries::from_values(start(), v).unwrap()))
            .collect()
    }

    #[test]
    fn test_portfolio_risk_bundle() {
        let portfolio = Portfolio::from_iter([("A", 600_000.0), ("B", 400_000.0)]);
        let returns = returns_for(&[("A", wave(60, 0.02, 0.0)), ("B", wave(60, 0.01, 1.3))]);

        let metrics = compute_portfolio_risk(&portfolio, &returns).unwrap();

        assert_eq!(metrics.observations, 60);
        assert!(metrics.var_95 > 0.0);
        assert!(metrics.var_99 >= metrics.var_95);
        assert!(metrics.cvar_95 >= metrics.var_95);
        assert!(metrics.max_drawdown <= 0.0);
        assert_relative_eq!(metrics.concentration_risk, 0.36 + 0.16, epsilon = 1e-12);
        assert_relative_eq!(
            metrics.annualized_volatility,
            metrics.daily_volatility * 252f64.sqrt(),
            epsilon = 1e-15
        );

        let corr = metrics.correlation.unwrap();
        assert_eq!(corr.symbols.len(), 2);
        assert_relative_eq!(corr.get("A", "A").unwrap(), 1.0);
    }

    #[test]
    fn test_var_matches_weighted_path() {
        let portfolio = Portfolio::from_iter([("A", 600_000.0), ("B", 400_000.0)]);
        let a = wave(80, 0.015, 0.2);
        let b = wave(80, 0.025, 2.1);
        let returns = returns_for(&[("A", a.clone()), ("B", b.clone())]);

        let path: Vec<f64> = a.iter().zip(&b).map(|(x, y)| 0.6 * x + 0.4 * y).collect();
        let expected = historical_var(&path, 0.95).unwrap();

        let metrics = compute_portfolio_risk(&portfolio, &returns).unwrap();
        assert_relative_eq!(metrics.var_95, expected, max_relative = 1e-6);
    }

    #[test]
    fn test_short_history_degrades_to_defaults() {
        let portfolio = Portfolio::from_iter([("A", 1.0)]);
        let returns = returns_for(&[("A", wave(10, 0.02, 0.0))]);

        let metrics = compute_portfolio_risk(&portfolio, &returns).unwrap();
        assert_eq!(metrics.var_95, 0.0);
        assert_eq!(metrics.cvar_99, 0.0);
        assert!(metrics.daily_volatility > 0.0);
        assert!(metrics.correlation.is_none());
    }

    #[test]
    fn test_alignment_error_is_distinguishable() {
        let portfolio = Portfolio::from_iter([("A", 1.0)]);
        let result = compute_portfolio_risk(&portfolio, &ReturnMap::new());
        assert!(matches!(result, Err(RiskError::Alignment(_))));
    }

    #[test]
    fn test_benchmark_beta() {
        let portfolio = Portfolio::from_iter([("A", 1.0)]);
        let a = wave(40, 0.02, 0.0);
        let returns = returns_for(&[("A", a.clone())]);
        let market: Vec<f64> = a.iter().map(|r| r / 2.0).collect();
        let benchmark = ReturnSeries::from_values(start(), &market).unwrap();

        let calc = RiskCalculator::new(RiskParameters::default()).with_benchmark(benchmark);
        let metrics = calc.portfolio_risk(&portfolio, &returns).unwrap();
        assert_relative_eq!(metrics.beta.unwrap(), 2.0, epsilon = 1e-9);
    }
}
