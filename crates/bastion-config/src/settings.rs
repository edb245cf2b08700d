//! Typed settings for the risk engine, compliance engine and monitor.
//!
//! Every field carries a serde default, so a partial file overrides only the
//! keys it names.

use std::path::PathBuf;

use bastion_compliance::checker::{ComplianceChecker, Enforcement};
use bastion_compliance::circuit::{CircuitBreaker, CircuitBreakerConfig};
use bastion_compliance::rules::{rules_to_table, ComplianceRule, RuleTable};
use bastion_risk::limits::{LimitRecord, LimitTable, RiskLimit, RiskMonitor};
use bastion_risk::metrics::{RiskCalculator, RiskParameters};
use bastion_risk::pretrade::PreTradeLimits;
use bastion_risk::sizing::RiskBudget;
use bastion_risk::stress::StressScenario;
use serde::{Deserialize, Serialize};

use crate::error::{Validate, ValidationError};

// =============================================================================
// RISK SETTINGS
// =============================================================================

/// Risk calculation and limit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// VaR confidence level for sizing and pre-trade checks.
    pub confidence_level: f64,
    /// Annual risk-free rate.
    pub risk_free_rate: f64,
    /// Largest acceptable portfolio VaR as a fraction of gross value.
    pub max_portfolio_var: f64,
    /// Largest position as a fraction of portfolio value.
    pub max_position_size: f64,
    /// Largest sector exposure as a fraction of portfolio value.
    pub max_sector_exposure: f64,
    /// Maximum number of positions.
    pub max_positions: usize,
    /// Largest single-position VaR as a fraction of portfolio value.
    pub max_position_var: f64,
    /// VaR window in observations.
    pub var_lookback: usize,
    /// Volatility window in observations.
    pub volatility_window: usize,
    /// Whether portfolio VaR uses the correlation matrix.
    pub use_correlation: bool,
    /// Per-trade loss budget at 1σ.
    pub risk_per_trade: f64,
    /// Per-position VaR budget.
    pub max_var_contribution: f64,
    /// Stress scenarios to run.
    pub stress_scenarios: Vec<StressScenario>,
    /// Metric limit table keyed by limit name.
    pub limits: LimitTable,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            risk_free_rate: 0.05,
            max_portfolio_var: 0.02,
            max_position_size: 0.05,
            max_sector_exposure: 0.25,
            max_positions: 20,
            max_position_var: 0.01,
            var_lookback: 252,
            volatility_window: 252,
            use_correlation: true,
            risk_per_trade: 0.01,
            max_var_contribution: 0.002,
            stress_scenarios: StressScenario::standard_set(),
            limits: RiskLimit::defaults()
                .iter()
                .map(|l| (l.name.clone(), LimitRecord::from(l)))
                .collect(),
        }
    }
}

impl RiskSettings {
    /// Metric calculation parameters.
    #[must_use]
    pub fn parameters(&self) -> RiskParameters {
        RiskParameters {
            risk_free_rate: self.risk_free_rate,
            var_lookback: self.var_lookback,
            volatility_window: self.volatility_window,
            include_correlation: self.use_correlation,
        }
    }

    /// Calculator built from [`RiskSettings::parameters`].
    #[must_use]
    pub fn calculator(&self) -> RiskCalculator {
        RiskCalculator::new(self.parameters())
    }

    /// Position sizing budget.
    #[must_use]
    pub fn budget(&self) -> RiskBudget {
        RiskBudget {
            risk_per_trade: self.risk_per_trade,
            max_var_contribution: self.max_var_contribution,
            max_position_size_pct: self.max_position_size,
            confidence_level: self.confidence_level,
        }
    }

    /// Pre-trade check limits.
    #[must_use]
    pub fn pretrade_limits(&self) -> PreTradeLimits {
        PreTradeLimits {
            max_position_size_pct: self.max_position_size,
            max_position_var_pct: self.max_position_var,
            max_sector_exposure: self.max_sector_exposure,
            max_positions: self.max_positions,
            confidence_level: self.confidence_level,
        }
    }

    /// Monitor loaded with the configured limit table.
    #[must_use]
    pub fn monitor(&self) -> RiskMonitor {
        let mut monitor = RiskMonitor::empty();
        monitor.import_limits(self.limits.clone());
        monitor
    }
}

fn check_fraction(errors: &mut Vec<ValidationError>, field: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ValidationError::with_rule(
            field,
            format!("must be in (0, 1], got {value}"),
            "fraction",
        ));
    }
}

impl Validate for RiskSettings {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            errors.push(ValidationError::with_rule(
                "risk.confidence_level",
                format!("must be in (0, 1), got {}", self.confidence_level),
                "probability",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            errors.push(ValidationError::new("risk.risk_free_rate", "must be finite"));
        }

        check_fraction(&mut errors, "risk.max_portfolio_var", self.max_portfolio_var);
        check_fraction(&mut errors, "risk.max_position_size", self.max_position_size);
        check_fraction(&mut errors, "risk.max_sector_exposure", self.max_sector_exposure);
        check_fraction(&mut errors, "risk.max_position_var", self.max_position_var);
        check_fraction(&mut errors, "risk.risk_per_trade", self.risk_per_trade);
        check_fraction(&mut errors, "risk.max_var_contribution", self.max_var_contribution);

        if self.max_positions == 0 {
            errors.push(ValidationError::with_rule(
                "risk.max_positions",
                "must be at least 1",
                "non_zero",
            ));
        }
        for (field, window) in [
            ("risk.var_lookback", self.var_lookback),
            ("risk.volatility_window", self.volatility_window),
        ] {
            if window < 2 {
                errors.push(ValidationError::with_rule(
                    field,
                    format!("must be at least 2 observations, got {window}"),
                    "min_window",
                ));
            }
        }

        for scenario in &self.stress_scenarios {
            for (key, shock) in &scenario.shocks {
                if !shock.is_finite() || *shock < -1.0 {
                    errors.push(ValidationError::with_rule(
                        format!("risk.stress_scenarios.{}.{key}", scenario.name),
                        format!("shock must be a finite return of at least -1, got {shock}"),
                        "valid_shock",
                    ));
                }
            }
        }
        for (name, record) in &self.limits {
            if !record.threshold.is_finite() {
                errors.push(ValidationError::new(
                    format!("risk.limits.{name}.threshold"),
                    "must be finite",
                ));
            }
        }

        errors
    }
}

// =============================================================================
// COMPLIANCE SETTINGS
// =============================================================================

/// Compliance rules, enforcement policy and circuit breaker limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceSettings {
    /// Rule table keyed by rule name.
    pub rules: RuleTable,
    /// How violations block trades.
    pub enforcement: Enforcement,
    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            rules: rules_to_table(&ComplianceRule::defaults()),
            enforcement: Enforcement::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ComplianceSettings {
    /// Checker loaded with the configured rules.
    #[must_use]
    pub fn checker(&self) -> ComplianceChecker {
        ComplianceChecker::from_table(self.rules.clone())
    }

    /// Circuit breaker with the configured thresholds.
    #[must_use]
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.circuit_breaker.clone())
    }
}

impl Validate for ComplianceSettings {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let breaker = &self.circuit_breaker;

        for (field, value) in [
            ("compliance.circuit_breaker.max_loss_percent", breaker.max_loss_percent),
            ("compliance.circuit_breaker.max_drawdown_percent", breaker.max_drawdown_percent),
            ("compliance.circuit_breaker.max_volatility", breaker.max_volatility),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ValidationError::with_rule(
                    field,
                    format!("must be a non-negative number, got {value}"),
                    "non_negative",
                ));
            }
        }
        if breaker.cooling_period_minutes < 0 {
            errors.push(ValidationError::with_rule(
                "compliance.circuit_breaker.cooling_period_minutes",
                "must not be negative",
                "non_negative",
            ));
        }

        errors
    }
}

// =============================================================================
// MONITORING SETTINGS
// =============================================================================

/// Service loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Whether the monitor loop runs.
    pub enabled: bool,
    /// Seconds between limit checks.
    pub check_interval_seconds: u64,
    /// Days of history to keep.
    pub data_retention_days: u32,
    /// Minutes before the same limit alerts again.
    pub alert_cooldown_minutes: u32,
    /// JSON-lines audit log; audit events stay in memory when unset.
    pub audit_log_path: Option<PathBuf>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_seconds: 60,
            data_retention_days: 30,
            alert_cooldown_minutes: 5,
            audit_log_path: None,
        }
    }
}

impl Validate for MonitoringSettings {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.check_interval_seconds == 0 {
            errors.push(ValidationError::with_rule(
                "monitoring.check_interval_seconds",
                "must be at least 1",
                "non_zero",
            ));
        }
        errors
    }
}

// =============================================================================
// TOP LEVEL
// =============================================================================

/// Complete Bastion configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    /// Risk settings.
    pub risk: RiskSettings,
    /// Compliance settings.
    pub compliance: ComplianceSettings,
    /// Monitoring settings.
    pub monitoring: MonitoringSettings,
}

impl Validate for BastionConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = self.risk.validate();
        errors.extend(self.compliance.validate());
        errors.extend(self.monitoring.validate());
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BastionConfig::default();
        assert!(config.is_valid(), "{:?}", config.validate());
        assert_eq!(config.risk.limits.len(), 6);
        assert_eq!(config.compliance.rules.len(), 7);
        assert_eq!(config.risk.stress_scenarios.len(), 2);
        assert_eq!(config.monitoring.check_interval_seconds, 60);
    }

    #[test]
    fn test_conversions() {
        let risk = RiskSettings {
            max_position_size: 0.08,
            confidence_level: 0.99,
            ..RiskSettings::default()
        };
        assert_eq!(risk.budget().max_position_size_pct, 0.08);
        assert_eq!(risk.pretrade_limits().confidence_level, 0.99);
        assert_eq!(risk.parameters().var_lookback, 252);
        assert_eq!(risk.monitor().limits().count(), 6);

        let compliance = ComplianceSettings::default();
        assert_eq!(compliance.checker().rules().count(), 7);
        assert_eq!(compliance.circuit_breaker().config().max_daily_trades, 100);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = BastionConfig::default();
        config.risk.confidence_level = 1.0;
        config.risk.max_positions = 0;
        config.risk.risk_per_trade = -0.01;
        config.monitoring.check_interval_seconds = 0;
        config.compliance.circuit_breaker.max_volatility = f64::NAN;

        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "risk.confidence_level",
                "risk.risk_per_trade",
                "risk.max_positions",
                "compliance.circuit_breaker.max_volatility",
                "monitoring.check_interval_seconds",
            ]
        );
    }

    #[test]
    fn test_invalid_shock() {
        let mut risk = RiskSettings::default();
        risk.stress_scenarios = vec![StressScenario::new("wipeout", "").with_shock("*", -1.5)];
        let errors = risk.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "risk.stress_scenarios.wipeout.*");
    }
}
