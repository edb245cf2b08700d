//! Domain types for portfolio risk and compliance.
//!
//! - [`Symbol`]: Instrument identifier
//! - [`ReturnSeries`]: Date-indexed daily returns for one instrument
//! - [`Portfolio`]: Signed position values keyed by symbol
//! - [`TradeOrder`]: A proposed trade submitted for pre-trade checks
//! - [`MarketData`]: Optional reference data (sector map)
//! - [`Severity`]: Ordered rule severity tier

mod market;
mod order;
mod portfolio;
mod returns;
mod severity;
mod symbol;

pub use market::MarketData;
pub use order::TradeOrder;
pub use portfolio::Portfolio;
pub use returns::ReturnSeries;
pub use severity::Severity;
pub use symbol::Symbol;

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
