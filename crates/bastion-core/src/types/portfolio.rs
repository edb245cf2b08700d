//! Portfolio positions and derived exposures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Symbol;

/// Mapping of instrument to signed position value.
///
/// Short positions carry negative values. Weights are signed and computed
/// against the gross value (sum of absolute position values).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portfolio {
    positions: BTreeMap<Symbol, f64>,
}

impl Portfolio {
    /// Creates an empty portfolio.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position value for `symbol`, replacing any existing value.
    pub fn insert(&mut self, symbol: impl Into<Symbol>, value: f64) -> Option<f64> {
        self.positions.insert(symbol.into(), value)
    }

    /// Removes the position for `symbol`.
    pub fn remove(&mut self, symbol: &str) -> Option<f64> {
        self.positions.remove(symbol)
    }

    /// Position value for `symbol` (zero when absent).
    #[must_use]
    pub fn position(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    /// Returns true if the portfolio holds `symbol`.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if there are no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterates over positions in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.positions.iter().map(|(s, v)| (s, *v))
    }

    /// Symbols held, in order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.positions.keys()
    }

    /// Sum of absolute position values.
    #[must_use]
    pub fn gross_value(&self) -> f64 {
        self.positions.values().map(|v| v.abs()).sum()
    }

    /// Sum of signed position values.
    #[must_use]
    pub fn net_value(&self) -> f64 {
        self.positions.values().sum()
    }

    /// Sum of positive position values.
    #[must_use]
    pub fn long_exposure(&self) -> f64 {
        self.positions.values().filter(|v| **v > 0.0).sum()
    }

    /// Sum of absolute values of negative positions.
    #[must_use]
    pub fn short_exposure(&self) -> f64 {
        self.positions
            .values()
            .filter(|v| **v < 0.0)
            .map(|v| v.abs())
            .sum()
    }

    /// Signed weight of `symbol` against gross value, or `None` for an empty book.
    #[must_use]
    pub fn weight(&self, symbol: &str) -> Option<f64> {
        let gross = self.gross_value();
        if gross == 0.0 {
            return None;
        }
        Some(self.position(symbol) / gross)
    }

    /// Signed weights for every position; empty when gross value is zero.
    #[must_use]
    pub fn weights(&self) -> BTreeMap<Symbol, f64> {
        let gross = self.gross_value();
        if gross == 0.0 {
            return BTreeMap::new();
        }
        self.positions
            .iter()
            .map(|(s, v)| (s.clone(), v / gross))
            .collect()
    }

    /// Largest absolute position as a fraction of gross value.
    #[must_use]
    pub fn largest_position_fraction(&self) -> f64 {
        let gross = self.gross_value();
        if gross == 0.0 {
            return 0.0;
        }
        self.positions
            .values()
            .map(|v| v.abs())
            .fold(0.0, f64::max)
            / gross
    }
}

impl<S: Into<Symbol>> FromIterator<(S, f64)> for Portfolio {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().map(|(s, v)| (s.into(), v)).collect(),
        }
    }
}
