//! Market reference data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Symbol;

/// Optional reference data supplied alongside positions.
///
/// Sector-based checks degrade to no-ops when the sector map is empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketData {
    /// Instrument to sector name.
    #[serde(default)]
    pub sector_map: HashMap<Symbol, String>,
}

impl MarketData {
    /// Creates empty market data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates market data from a sector map.
    pub fn with_sectors<S, T>(sectors: impl IntoIterator<Item = (S, T)>) -> Self
    where
        S: Into<Symbol>,
        T: Into<String>,
    {
        Self {
            sector_map: sectors
                .into_iter()
                .map(|(s, t)| (s.into(), t.into()))
                .collect(),
        }
    }

    /// Sector of `symbol`, if mapped.
    #[must_use]
    pub fn sector_of(&self, symbol: &str) -> Option<&str> {
        self.sector_map.get(symbol).map(String::as_str)
    }

    /// Returns true if a sector map is available.
    #[must_use]
    pub fn has_sectors(&self) -> bool {
        !self.sector_map.is_empty()
    }
}
