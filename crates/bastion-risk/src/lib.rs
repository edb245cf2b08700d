//! # bastion-risk
//!
//! Risk analytics for equity portfolios.
//!
//! This crate provides:
//!
//! - **Statistics**: historical and parametric VaR, CVaR, volatility, Sharpe,
//!   drawdown, downside deviation, beta, correlation matrices
//! - **Aggregation**: date-aligned portfolio return paths and concentration
//! - **Portfolio VaR**: correlation-aware VaR in currency
//! - **Sizing**: risk-budgeted position sizes
//! - **Stress**: instantaneous shock scenarios
//! - **Pre-trade**: position cap, position VaR and sector exposure checks
//! - **Limits**: metric thresholds with breach counters and alerts
//!
//! ## Example
//!
//! ```ignore
//! use bastion_risk::prelude::*;
//!
//! let metrics = compute_portfolio_risk(&portfolio, &returns)?;
//! let mut monitor = RiskMonitor::new();
//! for alert in monitor.check_limits(&metrics, &portfolio) {
//!     println!("{alert}");
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregation;
pub mod limits;
pub mod metrics;
pub mod portfolio_var;
pub mod pretrade;
pub mod report;
pub mod sizing;
pub mod stats;
pub mod stress;
mod error;

pub use error::{RiskError, RiskResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aggregation::{align_returns, herfindahl_index, portfolio_returns, ReturnMap};
    pub use crate::limits::{LimitKind, LimitTable, RiskAlert, RiskLimit, RiskMonitor};
    pub use crate::metrics::{compute_portfolio_risk, RiskCalculator, RiskMetrics, RiskParameters};
    pub use crate::portfolio_var::{portfolio_var, PortfolioVaR};
    pub use crate::pretrade::{check_position_risk, check_trade_risk, PreTradeLimits};
    pub use crate::report::RiskReport;
    pub use crate::sizing::{size_position, PositionSizingResult, RiskBudget};
    pub use crate::stress::{run_stress_tests, StressScenario};
    pub use crate::{RiskError, RiskResult};
}
