//! # bastion-compliance
//!
//! Trade-level controls for the Bastion risk engine.
//!
//! This crate provides:
//!
//! - **Rules**: typed compliance rules with a persisted table form
//! - **Checker**: per-order rule evaluation with violation history
//! - **Circuit breaker**: per-strategy trading halts and a global kill switch
//! - **Audit**: checksummed event trail with integrity verification
//! - **Access**: audited strategy approvals and per-user IP allow-lists
//!
//! ## Example
//!
//! ```ignore
//! use bastion_compliance::prelude::*;
//!
//! let mut checker = ComplianceChecker::new();
//! let violations = checker.check_trade_compliance(&order, &portfolio, Some(&market));
//! if is_blocking(&violations, &Enforcement::default()) {
//!     audit.log_compliance_check("pre_trade", &violations)?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod audit;
pub mod checker;
pub mod circuit;
pub mod error;
pub mod rules;

pub use error::{ComplianceError, ComplianceResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::access::{IpWhitelist, StrategyRegistry};
    pub use crate::audit::{AuditEvent, AuditFilter, AuditStore, AuditTrail, JsonlAuditStore};
    pub use crate::checker::{is_blocking, ComplianceChecker, ComplianceViolation, Enforcement};
    pub use crate::circuit::{CircuitBreaker, CircuitBreakerConfig, StrategyMetrics};
    pub use crate::rules::{ComplianceRule, RuleKind, RuleTable};
    pub use crate::{ComplianceError, ComplianceResult};
}
