//! Proposed trade orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Symbol;
use crate::error::{CoreError, CoreResult};

/// A proposed trade submitted for pre-trade risk and compliance checks.
///
/// `quantity` is the signed trade value in portfolio currency: positive
/// buys, negative sells. It is added directly to the current position value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    /// Instrument to trade.
    pub symbol: Symbol,
    /// Signed trade value.
    pub quantity: f64,
    /// Limit or reference price, if known.
    #[serde(default)]
    pub price: Option<f64>,
    /// Submission time; compliance checks use the wall clock when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TradeOrder {
    /// Creates a new order.
    pub fn new(symbol: impl Into<Symbol>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            price: None,
            timestamp: None,
        }
    }

    /// Sets the reference price.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Sets the submission time.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns true for sell orders.
    #[must_use]
    pub fn is_sell(&self) -> bool {
        self.quantity < 0.0
    }

    /// Absolute trade value.
    #[must_use]
    pub fn notional(&self) -> f64 {
        self.quantity.abs()
    }

    /// Checks that the order is well formed.
    pub fn validate(&self) -> CoreResult<()> {
        if self.symbol.as_str().trim().is_empty() {
            return Err(CoreError::invalid_order("symbol is empty"));
        }
        if !self.quantity.is_finite() {
            return Err(CoreError::non_finite("quantity", self.quantity));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price <= 0.0 {
                return Err(CoreError::invalid_order(format!(
                    "price must be positive, got {price}"
                )));
            }
        }
        Ok(())
    }
}
