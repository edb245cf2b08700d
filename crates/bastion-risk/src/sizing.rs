//! Risk-budgeted position sizing.
//!
//! Inverts a risk budget into a trade size by taking the most conservative of
//! three candidates:
//!
//! - **VaR budget**: `portfolio · max_var_contribution / VaR per $1`
//! - **Volatility budget**: `portfolio · risk_per_trade / daily volatility`
//! - **Max position**: `portfolio · max_position_size_pct`
//!
//! Shares are floored; the position value is recomputed from the floored
//! share count and never rounded up.

use std::fmt;

use bastion_core::Symbol;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RiskError, RiskResult};
use crate::stats::{
    conditional_var_or_default, historical_var_or_default, sample_std, MIN_VAR_OBSERVATIONS,
};
use bastion_core::types::TRADING_DAYS_PER_YEAR;

/// Risk budget for sizing a single position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudget {
    /// Fraction of portfolio value that may be lost on one trade at 1σ.
    pub risk_per_trade: f64,
    /// Fraction of portfolio value allowed as this position's VaR.
    pub max_var_contribution: f64,
    /// Largest position as a fraction of portfolio value.
    pub max_position_size_pct: f64,
    /// Confidence level for the VaR budget.
    pub confidence_level: f64,
}

impl Default for RiskBudget {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.01,
            max_var_contribution: 0.002,
            max_position_size_pct: 0.05,
            confidence_level: 0.95,
        }
    }
}

/// Which candidate determined the final size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingConstraint {
    /// VaR contribution budget.
    VarBudget,
    /// Per-trade volatility budget.
    VolatilityBudget,
    /// Maximum position percentage.
    MaxPosition,
}

impl fmt::Display for SizingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizingConstraint::VarBudget => "VaR budget",
            SizingConstraint::VolatilityBudget => "volatility budget",
            SizingConstraint::MaxPosition => "max position",
        };
        f.write_str(name)
    }
}

/// Risk metrics and candidate sizes behind a sizing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingBreakdown {
    /// Return observations used.
    pub observations: usize,
    /// Historical VaR at 95% (loss fraction).
    pub var_95: f64,
    /// Historical VaR at 99% (loss fraction).
    pub var_99: f64,
    /// Expected shortfall at 95%.
    pub cvar_95: f64,
    /// Expected shortfall at 99%.
    pub cvar_99: f64,
    /// Daily volatility (0.0 below the minimum sample).
    pub daily_volatility: f64,
    /// Annualized volatility.
    pub annualized_volatility: f64,
    /// VaR per $1 at the budget's confidence level.
    pub var_per_dollar: f64,
    /// Candidate value from the VaR budget.
    pub var_based_value: f64,
    /// Candidate value from the volatility budget.
    pub volatility_based_value: f64,
    /// Candidate value from the max position cap.
    pub max_position_value: f64,
    /// Final position value over portfolio value.
    pub position_to_portfolio: f64,
}

/// Result of a sizing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSizingResult {
    /// Instrument sized.
    pub symbol: Symbol,
    /// Whole shares to trade.
    pub shares: u64,
    /// Position value (shares × price), truncated to cents.
    pub position_value: Decimal,
    /// Position value × VaR per $1, truncated to cents.
    pub risk_amount: Decimal,
    /// Risk amount over portfolio value.
    pub risk_pct: f64,
    /// Confidence level used.
    pub confidence_level: f64,
    /// Candidate that bound the size.
    pub binding_constraint: SizingConstraint,
    /// Metrics used to derive the size.
    pub breakdown: SizingBreakdown,
}

impl fmt::Display for PositionSizingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} shares (${}, risk ${}, {})",
            self.symbol, self.shares, self.position_value, self.risk_amount, self.binding_constraint
        )
    }
}

/// Sizes a position for `symbol` at `price`.
///
/// With fewer than 30 returns, VaR and volatility are zero and the size falls
/// back to the max position cap.
///
/// # Errors
///
/// `InvalidInput` for a non-positive price or portfolio value, or a budget
/// with a confidence level outside (0, 1).
pub fn size_position(
    symbol: impl Into<Symbol>,
    price: f64,
    returns: &[f64],
    portfolio_value: f64,
    budget: &RiskBudget,
) -> RiskResult<PositionSizingResult> {
    let symbol = symbol.into();
    if !(price.is_finite() && price > 0.0) {
        return Err(RiskError::InvalidInput(format!("price must be positive, got {price}")));
    }
    if !(portfolio_value.is_finite() && portfolio_value > 0.0) {
        return Err(RiskError::InvalidInput(format!(
            "portfolio value must be positive, got {portfolio_value}"
        )));
    }
    crate::stats::ensure_confidence(budget.confidence_level)?;

    let max_position_value = portfolio_value * budget.max_position_size_pct.max(0.0);
    let max_var_amount = portfolio_value * budget.max_var_contribution.max(0.0);
    let max_risk_amount = portfolio_value * budget.risk_per_trade.max(0.0);

    let var_per_dollar = historical_var_or_default(returns, budget.confidence_level);
    let daily_volatility = if returns.len() >= MIN_VAR_OBSERVATIONS {
        sample_std(returns)
    } else {
        0.0
    };

    let var_based_value = if var_per_dollar > 0.0 {
        max_var_amount / var_per_dollar
    } else {
        max_position_value
    };

    // Shares from the volatility budget, converted back to value
    let volatility_based_value = if daily_volatility > 0.0 {
        max_risk_amount / (price * daily_volatility) * price
    } else {
        max_position_value
    };

    let (final_value, binding_constraint) = [
        (max_position_value, SizingConstraint::MaxPosition),
        (var_based_value, SizingConstraint::VarBudget),
        (volatility_based_value, SizingConstraint::VolatilityBudget),
    ]
    .into_iter()
    .fold((f64::INFINITY, SizingConstraint::MaxPosition), |best, candidate| {
        if candidate.0 < best.0 {
            candidate
        } else {
            best
        }
    });

    let shares = (final_value / price).floor().max(0.0) as u64;
    let actual_value = shares as f64 * price;
    let risk_amount = actual_value * var_per_dollar;

    let breakdown = SizingBreakdown {
        observations: returns.len(),
        var_95: historical_var_or_default(returns, 0.95),
        var_99: historical_var_or_default(returns, 0.99),
        cvar_95: conditional_var_or_default(returns, 0.95),
        cvar_99: conditional_var_or_default(returns, 0.99),
        daily_volatility,
        annualized_volatility: daily_volatility * TRADING_DAYS_PER_YEAR.sqrt(),
        var_per_dollar,
        var_based_value,
        volatility_based_value,
        max_position_value,
        position_to_portfolio: actual_value / portfolio_value,
    };

    debug!(
        symbol = %symbol,
        shares,
        value = actual_value,
        constraint = %binding_constraint,
        "sized position"
    );

    Ok(PositionSizingResult {
        symbol,
        shares,
        position_value: to_cents(actual_value),
        risk_amount: to_cents(risk_amount),
        risk_pct: risk_amount / portfolio_value,
        confidence_level: budget.confidence_level,
        binding_constraint,
        breakdown,
    })
}

fn to_cents(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn ladder(scale: f64) -> Vec<f64> {
        (0..100).map(|i| (i as f64 - 50.0) / 1000.0 * scale).collect()
    }

    #[test]
    fn test_var_budget_binds() {
        // VaR(95%) = 0.046; budget = 2_000 / 0.046 ≈ 43_478 < 50_000 cap
        let result = size_position("AAPL", 100.0, &ladder(1.0), 1_000_000.0, &RiskBudget::default())
            .unwrap();

        assert_eq!(result.binding_constraint, SizingConstraint::VarBudget);
        assert_eq!(result.shares, 434);
        assert_eq!(result.position_value, dec!(43400));
        assert_relative_eq!(result.breakdown.var_per_dollar, 0.046, epsilon = 1e-12);
        assert_relative_eq!(result.risk_pct, 43_400.0 * 0.046 / 1_000_000.0, epsilon = 1e-12);
    }

    #[test]
    fn test_short_history_falls_back_to_cap() {
        let returns = vec![-0.03; 10];
        let result = size_position("AAPL", 33.0, &returns, 1_000_000.0, &RiskBudget::default())
            .unwrap();

        assert_eq!(result.binding_constraint, SizingConstraint::MaxPosition);
        assert_eq!(result.breakdown.var_per_dollar, 0.0);
        assert_eq!(result.breakdown.daily_volatility, 0.0);
        // floor(50_000 / 33) = 1515 shares
        assert_eq!(result.shares, 1515);
        assert_eq!(result.position_value, dec!(49995));
        assert_eq!(result.risk_amount, Decimal::ZERO);
    }

    #[test]
    fn test_volatility_budget_binds() {
        // Tiny VaR but large dispersion on the upside
        let returns: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 0.4 } else { 0.0 }).collect();
        let budget = RiskBudget {
            risk_per_trade: 0.001,
            ..RiskBudget::default()
        };
        let result = size_position("X", 10.0, &returns, 100_000.0, &budget).unwrap();

        assert_eq!(result.binding_constraint, SizingConstraint::VolatilityBudget);
        let expected = 100.0 / sample_std(&returns);
        assert_relative_eq!(result.breakdown.volatility_based_value, expected, epsilon = 1e-9);
        assert_eq!(result.shares, (expected / 10.0).floor() as u64);
    }

    #[test]
    fn test_never_exceeds_cap() {
        let result = size_position("A", 0.37, &[], 250_000.0, &RiskBudget::default()).unwrap();
        let value = result.position_value.to_f64().unwrap();
        assert!(value <= 250_000.0 * 0.05);
    }

    #[test]
    fn test_invalid_inputs() {
        let budget = RiskBudget::default();
        assert!(size_position("A", 0.0, &[], 1e6, &budget).is_err());
        assert!(size_position("A", 10.0, &[], -1.0, &budget).is_err());
        let bad = RiskBudget {
            confidence_level: 1.2,
            ..RiskBudget::default()
        };
        assert!(size_position("A", 10.0, &[], 1e6, &bad).is_err());
    }
}
