//! Portfolio risk report.

use bastion_core::{MarketData, Portfolio};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregation::ReturnMap;
use crate::error::RiskResult;
use crate::limits::{RiskAlert, RiskMonitor};
use crate::metrics::{RiskCalculator, RiskMetrics};
use crate::portfolio_var::{portfolio_var, PortfolioVaR};
use crate::stress::{run_stress_tests, StressResult, StressScenario};

/// Snapshot of a portfolio's risk: metrics, fresh alerts and stress results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Report time.
    pub generated_at: DateTime<Utc>,
    /// Number of positions.
    pub positions: usize,
    /// Sum of absolute position values.
    pub gross_value: f64,
    /// Sum of signed position values.
    pub net_value: f64,
    /// Portfolio risk metrics.
    pub metrics: RiskMetrics,
    /// 95% portfolio VaR in currency, when computable.
    pub portfolio_var: Option<PortfolioVaR>,
    /// Alerts raised while building the report.
    pub alerts: Vec<RiskAlert>,
    /// One result per stress scenario.
    pub stress: Vec<StressResult>,
}

impl RiskReport {
    /// Builds a report and runs the monitor's limits against it.
    ///
    /// # Errors
    ///
    /// Propagates the metrics error when the portfolio returns cannot be
    /// aggregated.
    pub fn generate(
        calculator: &RiskCalculator,
        monitor: &mut RiskMonitor,
        portfolio: &Portfolio,
        returns: &ReturnMap,
        scenarios: &[StressScenario],
        market: Option<&MarketData>,
    ) -> RiskResult<Self> {
        let metrics = calculator.portfolio_risk(portfolio, returns)?;
        let alerts = monitor.check_limits(&metrics, portfolio);
        let portfolio_var = portfolio_var(
            portfolio,
            returns,
            0.95,
            calculator.params().include_correlation,
        )
        .map_err(|e| warn!(error = %e, "portfolio VaR unavailable"))
        .ok();

        Ok(Self {
            generated_at: Utc::now(),
            positions: portfolio.len(),
            gross_value: portfolio.gross_value(),
            net_value: portfolio.net_value(),
            metrics,
            portfolio_var,
            alerts,
            stress: run_stress_tests(portfolio, scenarios, market),
        })
    }

    /// Worst stress P&L, if any scenario ran.
    #[must_use]
    pub fn worst_stress(&self) -> Option<&StressResult> {
        self.stress.iter().min_by(|a, b| a.pnl.total_cmp(&b.pnl))
    }

    /// Returns true if any alert was raised.
    #[must_use]
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }
}
