//! Metric-level risk limits and alerting.
//!
//! A [`RiskMonitor`] owns a table of named [`RiskLimit`]s and the history of
//! [`RiskAlert`]s they produced. Each limit compares one observed value
//! against its threshold in the direction fixed by its [`LimitKind`]:
//!
//! - loss-type metrics (VaR, CVaR, drawdown) are observed as negative returns
//!   and breach when the value falls **below** the threshold
//! - everything else breaches when the value rises **above** it, except the
//!   Sharpe ratio, which breaches when it falls below
//!
//! Breach counters only ever increase; [`RiskMonitor::reset_breaches`] is the
//! only way back to zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bastion_core::{Portfolio, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregation::ReturnMap;
use crate::error::RiskError;
use crate::metrics::{RiskCalculator, RiskMetrics};

// =============================================================================
// LIMIT KINDS
// =============================================================================

/// Which side of the threshold is a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Breach when the observed value is above the threshold.
    Above,
    /// Breach when the observed value is below the threshold.
    Below,
}

impl Direction {
    /// Returns true if `value` is beyond `threshold` in this direction.
    #[must_use]
    pub fn is_breached(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Above => value > threshold,
            Direction::Below => value < threshold,
        }
    }
}

/// Metric observed by a risk limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// 95% VaR, observed as `-var_95`.
    #[serde(rename = "var_95")]
    Var95,
    /// 99% VaR, observed as `-var_99`.
    #[serde(rename = "var_99")]
    Var99,
    /// 95% expected shortfall, observed as `-cvar_95`.
    #[serde(rename = "cvar_95")]
    Cvar95,
    /// Annualized volatility.
    Volatility,
    /// Maximum drawdown (negative).
    MaxDrawdown,
    /// Herfindahl index of position weights.
    ConcentrationRisk,
    /// Largest absolute position over gross value.
    PositionSize,
    /// Annualized Sharpe ratio; breaches when it falls below the threshold.
    #[serde(rename = "sharpe_ratio")]
    Sharpe,
}

impl LimitKind {
    /// Every kind, in declaration order.
    pub const ALL: [LimitKind; 8] = [
        LimitKind::Var95,
        LimitKind::Var99,
        LimitKind::Cvar95,
        LimitKind::Volatility,
        LimitKind::MaxDrawdown,
        LimitKind::ConcentrationRisk,
        LimitKind::PositionSize,
        LimitKind::Sharpe,
    ];

    /// Canonical snake_case label used in exported tables.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Var95 => "var_95",
            LimitKind::Var99 => "var_99",
            LimitKind::Cvar95 => "cvar_95",
            LimitKind::Volatility => "volatility",
            LimitKind::MaxDrawdown => "max_drawdown",
            LimitKind::ConcentrationRisk => "concentration_risk",
            LimitKind::PositionSize => "position_size",
            LimitKind::Sharpe => "sharpe_ratio",
        }
    }

    /// Breach direction for this metric.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            LimitKind::Var95
            | LimitKind::Var99
            | LimitKind::Cvar95
            | LimitKind::MaxDrawdown
            | LimitKind::Sharpe => Direction::Below,
            LimitKind::Volatility | LimitKind::ConcentrationRisk | LimitKind::PositionSize => {
                Direction::Above
            }
        }
    }

    /// Resolves the observed value from a metrics bundle and the positions.
    #[must_use]
    pub fn observe(&self, metrics: &RiskMetrics, portfolio: &Portfolio) -> f64 {
        match self {
            LimitKind::Var95 => -metrics.var_95,
            LimitKind::Var99 => -metrics.var_99,
            LimitKind::Cvar95 => -metrics.cvar_95,
            LimitKind::Volatility => metrics.annualized_volatility,
            LimitKind::MaxDrawdown => metrics.max_drawdown,
            LimitKind::ConcentrationRisk => metrics.concentration_risk,
            LimitKind::PositionSize => portfolio.largest_position_fraction(),
            LimitKind::Sharpe => metrics.sharpe_ratio,
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitKind {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "var_95" | "var95" => Ok(LimitKind::Var95),
            "var_99" | "var99" => Ok(LimitKind::Var99),
            "cvar_95" | "cvar95" => Ok(LimitKind::Cvar95),
            "volatility" => Ok(LimitKind::Volatility),
            "max_drawdown" => Ok(LimitKind::MaxDrawdown),
            "concentration_risk" | "concentration" => Ok(LimitKind::ConcentrationRisk),
            "position_size" => Ok(LimitKind::PositionSize),
            "sharpe_ratio" | "sharpe" => Ok(LimitKind::Sharpe),
            _ => Err(RiskError::InvalidInput(format!("unknown limit type '{s}'"))),
        }
    }
}

// =============================================================================
// LIMITS AND ALERTS
// =============================================================================

/// A named threshold on one risk metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimit {
    /// Unique limit name.
    pub name: String,
    /// Metric observed.
    pub kind: LimitKind,
    /// Breach threshold, in the metric's own sign convention.
    pub threshold: f64,
    /// Severity of the alert raised on breach.
    pub severity: Severity,
    /// Disabled limits are never evaluated.
    pub enabled: bool,
    /// Number of breaches since the last reset.
    pub breach_count: u64,
    /// Time of the most recent breach.
    pub last_breach: Option<DateTime<Utc>>,
}

impl RiskLimit {
    /// Creates an enabled limit with no breach history.
    pub fn new(name: impl Into<String>, kind: LimitKind, threshold: f64, severity: Severity) -> Self {
        Self {
            name: name.into(),
            kind,
            threshold,
            severity,
            enabled: true,
            breach_count: 0,
            last_breach: None,
        }
    }

    /// The default limit table.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("portfolio_var_95", LimitKind::Var95, -0.05, Severity::Warning),
            Self::new("portfolio_var_99", LimitKind::Var99, -0.10, Severity::Error),
            Self::new("portfolio_volatility", LimitKind::Volatility, 0.25, Severity::Warning),
            Self::new("max_drawdown", LimitKind::MaxDrawdown, -0.15, Severity::Error),
            Self::new("concentration_risk", LimitKind::ConcentrationRisk, 0.40, Severity::Warning),
            Self::new("position_limit", LimitKind::PositionSize, 0.10, Severity::Warning),
        ]
    }

    /// Returns true if `value` breaches this limit.
    #[must_use]
    pub fn is_breached_by(&self, value: f64) -> bool {
        self.kind.direction().is_breached(value, self.threshold)
    }
}

/// Alert raised by a limit breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    /// Unique alert id.
    pub id: String,
    /// Name of the breached limit.
    pub limit_name: String,
    /// Metric observed.
    pub kind: LimitKind,
    /// Observed value.
    pub current_value: f64,
    /// Threshold at the time of the breach.
    pub threshold: f64,
    /// Severity copied from the limit.
    pub severity: Severity,
    /// When the breach was detected.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub message: String,
    /// Set once an operator has seen the alert.
    pub acknowledged: bool,
}

impl RiskAlert {
    fn for_breach(limit: &RiskLimit, current_value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            limit_name: limit.name.clone(),
            kind: limit.kind,
            current_value,
            threshold: limit.threshold,
            severity: limit.severity,
            timestamp,
            message: format!(
                "Risk limit '{}' breached: current={:.4}, limit={:.4}",
                limit.name, current_value, limit.threshold
            ),
            acknowledged: false,
        }
    }
}

impl fmt::Display for RiskAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

// =============================================================================
// EXPORT FORMAT
// =============================================================================

/// Persisted form of a limit, keyed by limit name in an export table.
///
/// Unknown fields are ignored on import; missing optional fields take their
/// defaults. `limit_type` stays a string so that an unknown kind skips one
/// record instead of failing the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitRecord {
    /// Metric label, e.g. `var_95`.
    pub limit_type: String,
    /// Breach threshold.
    pub threshold: f64,
    /// Alert severity.
    #[serde(default)]
    pub severity: Severity,
    /// Whether the limit is evaluated.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Breach count to restore.
    #[serde(default)]
    pub breach_count: u64,
    /// Last breach time to restore.
    #[serde(default)]
    pub last_breach: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl From<&RiskLimit> for LimitRecord {
    fn from(limit: &RiskLimit) -> Self {
        Self {
            limit_type: limit.kind.as_str().to_string(),
            threshold: limit.threshold,
            severity: limit.severity,
            enabled: limit.enabled,
            breach_count: limit.breach_count,
            last_breach: limit.last_breach,
        }
    }
}

/// Exported limit table.
pub type LimitTable = BTreeMap<String, LimitRecord>;

// =============================================================================
// MONITOR
// =============================================================================

/// Callback invoked for every new alert.
pub type AlertCallback = Box<dyn Fn(&RiskAlert) + Send + Sync>;

/// Snapshot of the monitor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSummary {
    /// Time of the last evaluation pass.
    pub last_check: Option<DateTime<Utc>>,
    /// Number of configured limits.
    pub total_limits: usize,
    /// Number of enabled limits.
    pub enabled_limits: usize,
    /// Unacknowledged alerts.
    pub active_alerts: usize,
    /// Unacknowledged WARNING alerts.
    pub warning_alerts: usize,
    /// Unacknowledged ERROR alerts.
    pub error_alerts: usize,
    /// Unacknowledged CRITICAL alerts.
    pub critical_alerts: usize,
    /// Breach count per limit name.
    pub breach_counts: BTreeMap<String, u64>,
}

/// Owns the limit table and the alert history.
///
/// Not synchronized; share it behind a single mutex.
pub struct RiskMonitor {
    limits: BTreeMap<String, RiskLimit>,
    alerts: Vec<RiskAlert>,
    subscribers: Vec<AlertCallback>,
    last_check: Option<DateTime<Utc>>,
}

impl fmt::Debug for RiskMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskMonitor")
            .field("limits", &self.limits)
            .field("alerts", &self.alerts.len())
            .field("subscribers", &self.subscribers.len())
            .field("last_check", &self.last_check)
            .finish()
    }
}

impl Default for RiskMonitor {
    fn default() -> Self {
        Self::with_limits(RiskLimit::defaults())
    }
}

impl RiskMonitor {
    /// Creates a monitor with the default limit table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a monitor with the given limits; later names replace earlier ones.
    pub fn with_limits(limits: impl IntoIterator<Item = RiskLimit>) -> Self {
        Self {
            limits: limits.into_iter().map(|l| (l.name.clone(), l)).collect(),
            alerts: Vec::new(),
            subscribers: Vec::new(),
            last_check: None,
        }
    }

    /// Creates a monitor with no limits.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_limits(Vec::new())
    }

    /// Adds or replaces a limit.
    pub fn add_limit(&mut self, limit: RiskLimit) {
        info!(name = %limit.name, kind = %limit.kind, threshold = limit.threshold, "added risk limit");
        self.limits.insert(limit.name.clone(), limit);
    }

    /// Removes a limit, returning it if present.
    pub fn remove_limit(&mut self, name: &str) -> Option<RiskLimit> {
        let removed = self.limits.remove(name);
        if removed.is_some() {
            info!(name, "removed risk limit");
        }
        removed
    }

    /// Enables or disables a limit. Returns false for an unknown name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.limits.get_mut(name) {
            Some(limit) => {
                limit.enabled = enabled;
                info!(name, enabled, "risk limit toggled");
                true
            }
            None => false,
        }
    }

    /// Clears the breach history of one limit. Returns false for an unknown name.
    pub fn reset_breaches(&mut self, name: &str) -> bool {
        match self.limits.get_mut(name) {
            Some(limit) => {
                limit.breach_count = 0;
                limit.last_breach = None;
                info!(name, "breach history reset");
                true
            }
            None => false,
        }
    }

    /// Looks up a limit.
    #[must_use]
    pub fn limit(&self, name: &str) -> Option<&RiskLimit> {
        self.limits.get(name)
    }

    /// Iterates limits in name order.
    pub fn limits(&self) -> impl Iterator<Item = &RiskLimit> {
        self.limits.values()
    }

    /// Registers a callback for new alerts.
    pub fn subscribe(&mut self, callback: AlertCallback) {
        self.subscribers.push(callback);
    }

    /// Evaluates every enabled limit.
    ///
    /// Each breach yields exactly one alert and bumps that limit's counter by
    /// one. A non-finite observation skips its limit for this pass only.
    pub fn check_limits(&mut self, metrics: &RiskMetrics, portfolio: &Portfolio) -> Vec<RiskAlert> {
        let now = Utc::now();
        let mut raised = Vec::new();

        for limit in self.limits.values_mut().filter(|l| l.enabled) {
            let value = limit.kind.observe(metrics, portfolio);
            if !value.is_finite() {
                warn!(name = %limit.name, kind = %limit.kind, value, "non-finite metric, limit skipped");
                continue;
            }
            if !limit.is_breached_by(value) {
                continue;
            }

            limit.breach_count += 1;
            limit.last_breach = Some(now);

            let alert = RiskAlert::for_breach(limit, value, now);
            if alert.severity.is_blocking() {
                error!(name = %limit.name, value, threshold = limit.threshold, "{}", alert.message);
            } else {
                warn!(name = %limit.name, value, threshold = limit.threshold, "{}", alert.message);
            }
            raised.push(alert);
        }

        self.last_check = Some(now);
        for alert in &raised {
            for callback in &self.subscribers {
                callback(alert);
            }
        }
        self.alerts.extend(raised.iter().cloned());

        debug!(alerts = raised.len(), "risk limits checked");
        raised
    }

    /// Computes metrics and evaluates the limits.
    ///
    /// A metrics failure (no overlapping returns, empty portfolio) is logged
    /// and yields no alerts.
    pub fn check_portfolio(
        &mut self,
        calculator: &RiskCalculator,
        portfolio: &Portfolio,
        returns: &ReturnMap,
    ) -> Vec<RiskAlert> {
        match calculator.portfolio_risk(portfolio, returns) {
            Ok(metrics) => self.check_limits(&metrics, portfolio),
            Err(e) => {
                error!(error = %e, "cannot compute risk metrics, limits not checked");
                Vec::new()
            }
        }
    }

    /// Unacknowledged alerts at or above `min_severity`.
    #[must_use]
    pub fn active_alerts(&self, min_severity: Option<Severity>) -> Vec<&RiskAlert> {
        self.alerts
            .iter()
            .filter(|a| !a.acknowledged)
            .filter(|a| min_severity.map_or(true, |s| a.severity >= s))
            .collect()
    }

    /// Every alert still held, acknowledged or not.
    #[must_use]
    pub fn alerts(&self) -> &[RiskAlert] {
        &self.alerts
    }

    /// Marks an alert as acknowledged. Returns false for an unknown id.
    pub fn acknowledge_alert(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                info!(id, limit = %alert.limit_name, "alert acknowledged");
                true
            }
            None => false,
        }
    }

    /// Drops acknowledged alerts, returning how many were removed.
    pub fn clear_acknowledged(&mut self) -> usize {
        let before = self.alerts.len();
        self.alerts.retain(|a| !a.acknowledged);
        before - self.alerts.len()
    }

    /// Summarizes limits and unacknowledged alerts.
    #[must_use]
    pub fn summary(&self) -> MonitorSummary {
        let count = |severity: Severity| {
            self.alerts
                .iter()
                .filter(|a| !a.acknowledged && a.severity == severity)
                .count()
        };

        MonitorSummary {
            last_check: self.last_check,
            total_limits: self.limits.len(),
            enabled_limits: self.limits.values().filter(|l| l.enabled).count(),
            active_alerts: self.alerts.iter().filter(|a| !a.acknowledged).count(),
            warning_alerts: count(Severity::Warning),
            error_alerts: count(Severity::Error),
            critical_alerts: count(Severity::Critical),
            breach_counts: self
                .limits
                .values()
                .map(|l| (l.name.clone(), l.breach_count))
                .collect(),
        }
    }

    /// Exports the limit table with breach bookkeeping.
    #[must_use]
    pub fn export_limits(&self) -> LimitTable {
        self.limits
            .iter()
            .map(|(name, limit)| (name.clone(), LimitRecord::from(limit)))
            .collect()
    }

    /// Imports limits, replacing any with the same name.
    ///
    /// Records with an unknown `limit_type` are logged and skipped. Returns
    /// the number of limits imported.
    pub fn import_limits(&mut self, table: LimitTable) -> usize {
        let mut imported = 0;

        for (name, record) in table {
            let kind = match record.limit_type.parse::<LimitKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!(name = %name, error = %e, "skipping risk limit with unknown type");
                    continue;
                }
            };

            let limit = RiskLimit {
                name: name.clone(),
                kind,
                threshold: record.threshold,
                severity: record.severity,
                enabled: record.enabled,
                breach_count: record.breach_count,
                last_breach: record.last_breach,
            };
            self.limits.insert(name, limit);
            imported += 1;
        }

        info!(imported, "imported risk limits");
        imported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RiskParameters;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn metrics() -> RiskMetrics {
        let mut m = RiskMetrics::from_returns(&[], &RiskParameters::default());
        m.var_95 = 0.02;
        m.var_99 = 0.04;
        m.cvar_95 = 0.03;
        m.annualized_volatility = 0.18;
        m.max_drawdown = -0.05;
        m.concentration_risk = 0.30;
        m.sharpe_ratio = 1.1;
        m
    }

    fn diversified() -> Portfolio {
        (0..20).map(|i| (format!("S{i}"), 1_000.0)).collect()
    }

    #[test]
    fn test_quiet_portfolio_raises_nothing() {
        let mut monitor = RiskMonitor::new();
        let alerts = monitor.check_limits(&metrics(), &diversified());

        assert!(alerts.is_empty());
        assert!(monitor.limits().all(|l| l.breach_count == 0));
        assert!(monitor.summary().last_check.is_some());
    }

    #[test]
    fn test_var_breach_uses_negative_convention() {
        let mut monitor = RiskMonitor::new();
        let mut m = metrics();
        m.var_95 = 0.06;

        let alerts = monitor.check_limits(&m, &diversified());
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.limit_name, "portfolio_var_95");
        assert_eq!(alert.current_value, -0.06);
        assert_eq!(
            alert.message,
            "Risk limit 'portfolio_var_95' breached: current=-0.0600, limit=-0.0500"
        );
        assert_eq!(monitor.limit("portfolio_var_95").unwrap().breach_count, 1);
        assert!(monitor.limit("portfolio_var_95").unwrap().last_breach.is_some());
    }

    #[test]
    fn test_position_size_from_portfolio() {
        let mut monitor = RiskMonitor::new();
        let portfolio = Portfolio::from_iter([("A", 850.0), ("B", -150.0)]);

        let alerts = monitor.check_limits(&metrics(), &portfolio);
        let names: Vec<_> = alerts.iter().map(|a| a.limit_name.as_str()).collect();
        assert_eq!(names, vec!["position_limit"]);
        assert_eq!(alerts[0].current_value, 0.85);
    }

    #[test]
    fn test_disabled_limit_never_fires() {
        let mut monitor = RiskMonitor::new();
        assert!(monitor.set_enabled("portfolio_volatility", false));
        let mut m = metrics();
        m.annualized_volatility = 5.0;

        assert!(monitor.check_limits(&m, &diversified()).is_empty());
        assert_eq!(monitor.limit("portfolio_volatility").unwrap().breach_count, 0);
        assert!(!monitor.set_enabled("missing", true));
    }

    #[test]
    fn test_counters_accumulate_and_reset() {
        let mut monitor = RiskMonitor::new();
        let mut m = metrics();
        m.max_drawdown = -0.30;

        for _ in 0..3 {
            monitor.check_limits(&m, &diversified());
        }
        assert_eq!(monitor.limit("max_drawdown").unwrap().breach_count, 3);
        assert_eq!(monitor.summary().breach_counts["max_drawdown"], 3);
        assert_eq!(monitor.summary().error_alerts, 3);

        assert!(monitor.reset_breaches("max_drawdown"));
        let limit = monitor.limit("max_drawdown").unwrap();
        assert_eq!(limit.breach_count, 0);
        assert!(limit.last_breach.is_none());
    }

    #[test]
    fn test_sharpe_breaches_below() {
        let mut monitor = RiskMonitor::empty();
        monitor.add_limit(RiskLimit::new("min_sharpe", LimitKind::Sharpe, 0.5, Severity::Warning));
        let mut m = metrics();

        assert!(monitor.check_limits(&m, &diversified()).is_empty());
        m.sharpe_ratio = 0.2;
        assert_eq!(monitor.check_limits(&m, &diversified()).len(), 1);
    }

    #[test]
    fn test_alert_lifecycle() {
        let mut monitor = RiskMonitor::new();
        let mut m = metrics();
        m.var_95 = 0.08;
        m.var_99 = 0.20;

        let alerts = monitor.check_limits(&m, &diversified());
        assert_eq!(alerts.len(), 2);
        assert_eq!(monitor.active_alerts(None).len(), 2);
        assert_eq!(monitor.active_alerts(Some(Severity::Error)).len(), 1);

        let id = alerts[0].id.clone();
        assert!(monitor.acknowledge_alert(&id));
        assert!(!monitor.acknowledge_alert("nope"));
        assert_eq!(monitor.active_alerts(None).len(), 1);

        assert_eq!(monitor.clear_acknowledged(), 1);
        assert_eq!(monitor.alerts().len(), 1);
    }

    #[test]
    fn test_subscribers_receive_alerts() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let mut monitor = RiskMonitor::new();
        monitor.subscribe(Box::new(move |_alert| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let mut m = metrics();
        m.concentration_risk = 0.9;
        monitor.check_limits(&m, &diversified());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut source = RiskMonitor::new();
        source.set_enabled("portfolio_var_99", false);
        source.add_limit(RiskLimit::new("tail", LimitKind::Cvar95, -0.07, Severity::Critical));
        let mut m = metrics();
        m.var_95 = 0.09;
        source.check_limits(&m, &diversified());

        let exported = source.export_limits();
        let json = serde_json::to_string(&exported).unwrap();
        let table: LimitTable = serde_json::from_str(&json).unwrap();

        let mut target = RiskMonitor::empty();
        assert_eq!(target.import_limits(table), exported.len());

        for original in source.limits() {
            let restored = target.limit(&original.name).unwrap();
            assert_eq!(restored, original);
        }
    }

    #[test]
    fn test_import_is_tolerant() {
        let json = r#"{
            "legacy": {"limit_type": "var_95", "threshold": -0.03, "extra": 42},
            "typo": {"limit_type": "var_59", "threshold": -0.03},
            "vol": {"limit_type": "volatility", "threshold": 0.2, "severity": "CRITICAL", "enabled": false}
        }"#;
        let table: LimitTable = serde_json::from_str(json).unwrap();

        let mut monitor = RiskMonitor::empty();
        assert_eq!(monitor.import_limits(table), 2);

        let legacy = monitor.limit("legacy").unwrap();
        assert_eq!(legacy.severity, Severity::Warning);
        assert!(legacy.enabled);
        assert_eq!(legacy.breach_count, 0);
        assert!(monitor.limit("typo").is_none());
        assert!(!monitor.limit("vol").unwrap().enabled);
    }

    #[test]
    fn test_check_portfolio_swallows_alignment_errors() {
        let mut monitor = RiskMonitor::new();
        let portfolio = Portfolio::from_iter([("A", 1.0)]);
        let alerts = monitor.check_portfolio(&RiskCalculator::default(), &portfolio, &ReturnMap::new());
        assert!(alerts.is_empty());
        assert!(monitor.summary().last_check.is_none());
    }

    #[test]
    fn test_limit_kind_labels() {
        for kind in LimitKind::ALL {
            assert_eq!(kind.as_str().parse::<LimitKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
