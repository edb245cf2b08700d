//! Stress testing with instantaneous return shocks.
//!
//! A scenario maps shock keys to returns. A key matches a position by
//! symbol first, then by sector (via [`MarketData`]), then the wildcard `*`.

use std::collections::BTreeMap;

use bastion_core::{MarketData, Portfolio, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Wildcard shock key applied to every unmatched position.
pub const WILDCARD: &str = "*";

/// A named set of instantaneous return shocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Shock key (symbol, sector or `*`) to return.
    pub shocks: BTreeMap<String, f64>,
}

impl StressScenario {
    /// Creates a scenario with no shocks.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            shocks: BTreeMap::new(),
        }
    }

    /// Adds a shock.
    #[must_use]
    pub fn with_shock(mut self, key: impl Into<String>, shock: f64) -> Self {
        self.shocks.insert(key.into(), shock);
        self
    }

    /// Broad market decline of 20%.
    #[must_use]
    pub fn market_crash() -> Self {
        Self::new("market_crash", "20% market decline").with_shock(WILDCARD, -0.20)
    }

    /// Tech down 15%, value up 5%.
    #[must_use]
    pub fn sector_rotation() -> Self {
        Self::new("sector_rotation", "Tech down 15%, value up 5%")
            .with_shock("tech", -0.15)
            .with_shock("value", 0.05)
    }

    /// The standard scenario set.
    #[must_use]
    pub fn standard_set() -> Vec<Self> {
        vec![Self::market_crash(), Self::sector_rotation()]
    }

    /// Shock applied to `symbol`, if any key matches.
    #[must_use]
    pub fn shock_for(&self, symbol: &str, market: Option<&MarketData>) -> Option<f64> {
        self.shocks
            .get(symbol)
            .or_else(|| {
                market
                    .and_then(|m| m.sector_of(symbol))
                    .and_then(|sector| self.shocks.get(sector))
            })
            .or_else(|| self.shocks.get(WILDCARD))
            .copied()
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    /// Scenario name.
    pub scenario: String,
    /// Total P&L.
    pub pnl: f64,
    /// P&L over gross portfolio value.
    pub pnl_pct: f64,
    /// P&L per shocked position.
    pub position_pnl: BTreeMap<Symbol, f64>,
}

/// Applies a scenario: P&L = Σ position × shock.
#[must_use]
pub fn apply_scenario(
    portfolio: &Portfolio,
    scenario: &StressScenario,
    market: Option<&MarketData>,
) -> StressResult {
    let position_pnl: BTreeMap<Symbol, f64> = portfolio
        .iter()
        .filter_map(|(symbol, value)| {
            scenario
                .shock_for(symbol.as_str(), market)
                .map(|shock| (symbol.clone(), value * shock))
        })
        .collect();

    let pnl: f64 = position_pnl.values().sum();
    let gross = portfolio.gross_value();
    let pnl_pct = if gross > 0.0 { pnl / gross } else { 0.0 };

    debug!(scenario = %scenario.name, pnl, "applied stress scenario");

    StressResult {
        scenario: scenario.name.clone(),
        pnl,
        pnl_pct,
        position_pnl,
    }
}

/// Applies every scenario in order.
#[must_use]
pub fn run_stress_tests(
    portfolio: &Portfolio,
    scenarios: &[StressScenario],
    market: Option<&MarketData>,
) -> Vec<StressResult> {
    scenarios
        .iter()
        .map(|s| apply_scenario(portfolio, s, market))
        .collect()
}
