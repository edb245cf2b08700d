//! # Bastion Core
//!
//! Core types shared by the Bastion risk and compliance crates.
//!
//! This crate provides the foundational building blocks used throughout Bastion:
//!
//! - **Types**: `Symbol`, `ReturnSeries`, `Portfolio`, `TradeOrder`, `MarketData`
//! - **Severity**: the ordered `WARNING < ERROR < CRITICAL` tier used by every rule
//! - **Errors**: `CoreError` for malformed inputs
//!
//! ## Sign Conventions
//!
//! - Returns are decimals (`-0.01` is a 1% loss)
//! - Position values are signed: short positions carry negative values
//! - Gross portfolio value is the sum of absolute position values
//!
//! ## Example
//!
//! ```rust
//! use bastion_core::prelude::*;
//!
//! let portfolio = Portfolio::from_iter([("AAPL", 600_000.0), ("MSFT", 400_000.0)]);
//! assert_eq!(portfolio.gross_value(), 1_000_000.0);
//! assert_eq!(portfolio.weight("AAPL"), Some(0.6));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::types::{
        MarketData, Portfolio, ReturnSeries, Severity, Symbol, TradeOrder, TRADING_DAYS_PER_YEAR,
    };
}

pub use error::{CoreError, CoreResult};
pub use types::{MarketData, Portfolio, ReturnSeries, Severity, Symbol, TradeOrder};
