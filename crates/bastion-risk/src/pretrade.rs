//! Pre-trade risk checks.
//!
//! These checks approve, shrink or reject a proposed position before it
//! reaches the compliance rule engine.

use std::collections::BTreeMap;

use bastion_core::{MarketData, Portfolio, TradeOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stats::{sample_std, z_score, MIN_VAR_OBSERVATIONS};

/// Limits applied by the pre-trade checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreTradeLimits {
    /// Largest position as a fraction of portfolio value.
    pub max_position_size_pct: f64,
    /// Largest single-position VaR as a fraction of portfolio value.
    pub max_position_var_pct: f64,
    /// Largest sector exposure as a fraction of portfolio value.
    pub max_sector_exposure: f64,
    /// Maximum number of distinct positions.
    pub max_positions: usize,
    /// Confidence level for the position VaR.
    pub confidence_level: f64,
}

impl Default for PreTradeLimits {
    fn default() -> Self {
        Self {
            max_position_size_pct: 0.05,
            max_position_var_pct: 0.01,
            max_sector_exposure: 0.25,
            max_positions: 20,
            confidence_level: 0.95,
        }
    }
}

/// Outcome of a pre-trade check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRiskDecision {
    /// Whether the trade may proceed (possibly at the adjusted size).
    pub approved: bool,
    /// Explanation.
    pub message: String,
    /// Reduced position value, when the requested size was cut.
    pub adjusted_value: Option<f64>,
    /// Metrics computed during the check.
    pub metrics: BTreeMap<String, f64>,
}

impl TradeRiskDecision {
    fn approve(message: impl Into<String>) -> Self {
        Self {
            approved: true,
            message: message.into(),
            adjusted_value: None,
            metrics: BTreeMap::new(),
        }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self {
            approved: false,
            ..Self::approve(message)
        }
    }

    fn adjusted(message: impl Into<String>, value: f64) -> Self {
        Self {
            adjusted_value: Some(value),
            ..Self::approve(message)
        }
    }

    fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }
}

/// Checks a trade against the position cap and the single-position VaR limit.
///
/// The VaR check runs only with more than 30 returns; position VaR is
/// `z(c) · σ · |value|`. Oversized trades are approved at a reduced value.
#[must_use]
pub fn check_trade_risk(
    order: &TradeOrder,
    portfolio_value: f64,
    returns: Option<&[f64]>,
    limits: &PreTradeLimits,
) -> TradeRiskDecision {
    if portfolio_value <= 0.0 {
        return TradeRiskDecision::reject("portfolio value must be positive");
    }

    let position_value = order.notional();
    let position_pct = position_value / portfolio_value;

    if position_pct > limits.max_position_size_pct {
        let adjusted = portfolio_value * limits.max_position_size_pct;
        info!(
            symbol = %order.symbol,
            requested = position_value,
            adjusted,
            "trade reduced to position cap"
        );
        return TradeRiskDecision::adjusted(
            format!(
                "Position size reduced from {:.2}% to {:.2}%",
                position_pct * 100.0,
                limits.max_position_size_pct * 100.0
            ),
            adjusted,
        )
        .with_metric("position_pct", position_pct);
    }

    let Some(returns) = returns.filter(|r| r.len() > MIN_VAR_OBSERVATIONS) else {
        return TradeRiskDecision::approve("Trade approved").with_metric("position_pct", position_pct);
    };

    let daily_volatility = sample_std(returns);
    let z = z_score(limits.confidence_level).unwrap_or(1.645);
    let var = z * daily_volatility * position_value;
    let var_pct = var / portfolio_value;

    debug!(symbol = %order.symbol, var, var_pct, "position VaR");

    let decision = if var_pct > limits.max_position_var_pct {
        let adjusted = limits.max_position_var_pct / var_pct * position_value;
        TradeRiskDecision::adjusted(
            format!(
                "Position VaR {:.2}% exceeds {:.2}%, size reduced",
                var_pct * 100.0,
                limits.max_position_var_pct * 100.0
            ),
            adjusted,
        )
    } else {
        TradeRiskDecision::approve("Trade approved")
    };

    decision
        .with_metric("position_pct", position_pct)
        .with_metric("daily_volatility", daily_volatility)
        .with_metric("var", var)
        .with_metric("var_pct", var_pct)
}

/// Checks a new position against the position cap, sector exposure and
/// position count.
///
/// Sector exposure is skipped when `market` has no sector for the symbol.
#[must_use]
pub fn check_position_risk(
    order: &TradeOrder,
    portfolio: &Portfolio,
    portfolio_value: f64,
    market: Option<&MarketData>,
    limits: &PreTradeLimits,
) -> TradeRiskDecision {
    if portfolio_value <= 0.0 {
        return TradeRiskDecision::reject("portfolio value must be positive");
    }

    let position_value = order.notional();
    let position_pct = position_value / portfolio_value;

    if position_pct > limits.max_position_size_pct {
        let adjusted = portfolio_value * limits.max_position_size_pct;
        return TradeRiskDecision::adjusted(
            format!(
                "Position size reduced from {:.2}% to {:.2}%",
                position_pct * 100.0,
                limits.max_position_size_pct * 100.0
            ),
            adjusted,
        )
        .with_metric("position_pct", position_pct);
    }

    if let Some((market, sector)) =
        market.and_then(|m| m.sector_of(order.symbol.as_str()).map(|s| (m, s)))
    {
        let existing: f64 = portfolio
            .iter()
            .filter(|(s, _)| market.sector_of(s.as_str()) == Some(sector))
            .map(|(_, v)| v.abs())
            .sum();
        let sector_pct = (existing + position_value) / portfolio_value;

        if sector_pct > limits.max_sector_exposure {
            return TradeRiskDecision::reject(format!(
                "Sector '{sector}' exposure would exceed {:.2}%",
                limits.max_sector_exposure * 100.0
            ))
            .with_metric("sector_exposure", sector_pct);
        }
    }

    if !order.is_sell()
        && !portfolio.contains(order.symbol.as_str())
        && portfolio.len() >= limits.max_positions
    {
        return TradeRiskDecision::reject(format!(
            "Maximum number of positions ({}) reached",
            limits.max_positions
        ))
        .with_metric("position_count", portfolio.len() as f64);
    }

    TradeRiskDecision::approve("Position risk check passed").with_metric("position_pct", position_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_trade_reduced_to_cap() {
        let order = TradeOrder::new("AAPL", 100_000.0);
        let decision = check_trade_risk(&order, 1_000_000.0, None, &PreTradeLimits::default());

        assert!(decision.approved);
        assert_eq!(decision.adjusted_value, Some(50_000.0));
        assert_relative_eq!(decision.metrics["position_pct"], 0.10);
    }

    #[test]
    fn test_trade_var_limit() {
        // σ ≈ 0.029, z ≈ 1.645: VaR of $40k ≈ $1.9k, 0.19% of $1M
        let returns: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
        let order = TradeOrder::new("AAPL", 40_000.0);

        let loose = check_trade_risk(&order, 1_000_000.0, Some(&returns), &PreTradeLimits::default());
        assert!(loose.approved);
        assert!(loose.adjusted_value.is_none());
        assert!(loose.metrics.contains_key("var_pct"));

        let tight = PreTradeLimits {
            max_position_var_pct: 0.001,
            ..PreTradeLimits::default()
        };
        let cut = check_trade_risk(&order, 1_000_000.0, Some(&returns), &tight);
        let adjusted = cut.adjusted_value.unwrap();
        assert!(adjusted < 40_000.0);
        let var_pct = cut.metrics["var_pct"];
        assert_relative_eq!(adjusted, 0.001 / var_pct * 40_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_short_history_skips_var() {
        let order = TradeOrder::new("AAPL", 10_000.0);
        let returns = vec![-0.5; 30];
        let decision =
            check_trade_risk(&order, 1_000_000.0, Some(&returns), &PreTradeLimits::default());
        assert!(decision.approved);
        assert!(!decision.metrics.contains_key("var"));
    }

    #[test]
    fn test_sector_exposure_rejected() {
        let portfolio = Portfolio::from_iter([("MSFT", 220_000.0), ("XOM", 100_000.0)]);
        let market = MarketData::with_sectors([("MSFT", "tech"), ("AAPL", "tech"), ("XOM", "energy")]);
        let order = TradeOrder::new("AAPL", 40_000.0);

        let decision = check_position_risk(
            &order,
            &portfolio,
            1_000_000.0,
            Some(&market),
            &PreTradeLimits::default(),
        );
        assert!(!decision.approved);
        assert_relative_eq!(decision.metrics["sector_exposure"], 0.26, epsilon = 1e-12);
    }

    #[test]
    fn test_position_count_limit() {
        let portfolio: Portfolio = (0..20).map(|i| (format!("S{i}"), 1_000.0)).collect();
        let limits = PreTradeLimits::default();

        let new_name = TradeOrder::new("NEW", 1_000.0);
        assert!(!check_position_risk(&new_name, &portfolio, 1_000_000.0, None, &limits).approved);

        let existing = TradeOrder::new("S3", 1_000.0);
        assert!(check_position_risk(&existing, &portfolio, 1_000_000.0, None, &limits).approved);

        let sell = TradeOrder::new("NEW", -1_000.0);
        assert!(check_position_risk(&sell, &portfolio, 1_000_000.0, None, &limits).approved);
    }
}
