//! Trade compliance checker.
//!
//! [`ComplianceChecker`] owns the rule table and the violation history.
//! Evaluating an order walks every enabled rule independently: a violation
//! bumps that rule's counter, stamps its last-violation time, and appends one
//! [`ComplianceViolation`] to the history.

use std::collections::BTreeMap;
use std::fmt;

use bastion_core::{MarketData, Portfolio, Severity, TradeOrder};
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::rules::{rules_to_table, ComplianceRule, RuleKind, RuleTable};

/// A recorded rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    /// Unique violation id.
    pub id: String,
    /// Name of the violated rule.
    pub rule_name: String,
    /// Rule kind label.
    pub violation_type: String,
    /// Values behind the decision.
    pub details: BTreeMap<String, Value>,
    /// Severity copied from the rule.
    pub severity: Severity,
    /// Detection time.
    pub timestamp: DateTime<Utc>,
    /// Human-readable description.
    pub message: String,
    /// Set once an operator has resolved the violation.
    pub resolved: bool,
}

impl fmt::Display for ComplianceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// How violations translate into blocking decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enforcement {
    /// Block the trade on any ERROR or CRITICAL violation.
    #[serde(default = "default_true")]
    pub block_on_error: bool,
    /// Log WARNING violations.
    #[serde(default = "default_true")]
    pub warn_on_warning: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Enforcement {
    fn default() -> Self {
        Self {
            block_on_error: true,
            warn_on_warning: true,
        }
    }
}

/// Returns true if the violations should block the trade.
#[must_use]
pub fn is_blocking(violations: &[ComplianceViolation], enforcement: &Enforcement) -> bool {
    enforcement.block_on_error && violations.iter().any(|v| v.severity.is_blocking())
}

/// Snapshot of checker state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    /// Enabled rules.
    pub active_rules: usize,
    /// Configured rules.
    pub total_rules: usize,
    /// Violations in history.
    pub total_violations: usize,
    /// Unresolved violations.
    pub unresolved_violations: usize,
    /// Unresolved CRITICAL violations.
    pub critical_violations: usize,
    /// Unresolved ERROR violations.
    pub error_violations: usize,
    /// Unresolved WARNING violations.
    pub warning_violations: usize,
}

/// Rule table plus violation history.
///
/// Not synchronized; share it behind a single mutex.
#[derive(Debug, Clone)]
pub struct ComplianceChecker {
    rules: BTreeMap<String, ComplianceRule>,
    violations: Vec<ComplianceViolation>,
}

impl Default for ComplianceChecker {
    fn default() -> Self {
        Self::with_rules(ComplianceRule::defaults())
    }
}

impl ComplianceChecker {
    /// Creates a checker with the default rule table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a checker with the given rules; later names replace earlier ones.
    pub fn with_rules(rules: impl IntoIterator<Item = ComplianceRule>) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.name.clone(), r)).collect(),
            violations: Vec::new(),
        }
    }

    /// Creates a checker from an exported rule table, skipping unusable records.
    pub fn from_table(table: RuleTable) -> Self {
        let mut checker = Self::with_rules(Vec::new());
        checker.import_rules(table);
        checker
    }

    /// Adds or replaces a rule.
    pub fn add_rule(&mut self, rule: ComplianceRule) {
        info!(name = %rule.name, kind = %rule.kind, "added compliance rule");
        self.rules.insert(rule.name.clone(), rule);
    }

    /// Removes a rule, returning it if present.
    pub fn remove_rule(&mut self, name: &str) -> Option<ComplianceRule> {
        let removed = self.rules.remove(name);
        if removed.is_some() {
            info!(name, "removed compliance rule");
        }
        removed
    }

    /// Enables or disables a rule. Returns false for an unknown name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.rules.get_mut(name) {
            Some(rule) => {
                rule.enabled = enabled;
                info!(name, enabled, "compliance rule toggled");
                true
            }
            None => false,
        }
    }

    /// Clears the violation bookkeeping of one rule. Returns false for an unknown name.
    pub fn reset_violations(&mut self, name: &str) -> bool {
        match self.rules.get_mut(name) {
            Some(rule) => {
                rule.violation_count = 0;
                rule.last_violation = None;
                true
            }
            None => false,
        }
    }

    /// Looks up a rule.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&ComplianceRule> {
        self.rules.get(name)
    }

    /// Iterates rules in name order.
    pub fn rules(&self) -> impl Iterator<Item = &ComplianceRule> {
        self.rules.values()
    }

    /// Checks an order against every enabled rule, using the wall clock for
    /// orders without a timestamp.
    pub fn check_trade_compliance(
        &mut self,
        order: &TradeOrder,
        portfolio: &Portfolio,
        market: Option<&MarketData>,
    ) -> Vec<ComplianceViolation> {
        self.check_trade_compliance_at(order, portfolio, market, Utc::now())
    }

    /// Checks an order with `now` as the fallback trade time.
    ///
    /// A malformed order is logged and yields no violations.
    pub fn check_trade_compliance_at(
        &mut self,
        order: &TradeOrder,
        portfolio: &Portfolio,
        market: Option<&MarketData>,
        now: DateTime<Utc>,
    ) -> Vec<ComplianceViolation> {
        if let Err(e) = order.validate() {
            error!(error = %e, "rejecting malformed order before compliance checks");
            return Vec::new();
        }

        let trade_time = order.timestamp.unwrap_or(now);
        let context = TradeContext {
            order,
            portfolio,
            market,
            trade_time,
        };

        let mut found = Vec::new();
        for rule in self.rules.values_mut().filter(|r| r.enabled) {
            let Some(finding) = evaluate(&rule.kind, &context) else {
                continue;
            };

            rule.violation_count += 1;
            rule.last_violation = Some(now);

            let violation = ComplianceViolation {
                id: uuid::Uuid::new_v4().to_string(),
                rule_name: rule.name.clone(),
                violation_type: rule.kind.type_name().to_string(),
                details: finding.details,
                severity: rule.severity,
                timestamp: now,
                message: finding.message,
                resolved: false,
            };

            if violation.severity.is_blocking() {
                error!(rule = %rule.name, symbol = %order.symbol, "{}", violation.message);
            } else {
                warn!(rule = %rule.name, symbol = %order.symbol, "{}", violation.message);
            }
            found.push(violation);
        }

        debug!(symbol = %order.symbol, violations = found.len(), "trade compliance checked");
        self.violations.extend(found.iter().cloned());
        found
    }

    /// Violations filtered by minimum severity and resolution state.
    #[must_use]
    pub fn violations(
        &self,
        min_severity: Option<Severity>,
        resolved: Option<bool>,
    ) -> Vec<&ComplianceViolation> {
        self.violations
            .iter()
            .filter(|v| min_severity.map_or(true, |s| v.severity >= s))
            .filter(|v| resolved.map_or(true, |r| v.resolved == r))
            .collect()
    }

    /// Marks a violation as resolved. Returns false for an unknown id.
    pub fn resolve_violation(&mut self, id: &str) -> bool {
        match self.violations.iter_mut().find(|v| v.id == id) {
            Some(violation) => {
                violation.resolved = true;
                info!(id, rule = %violation.rule_name, "violation resolved");
                true
            }
            None => false,
        }
    }

    /// Summarizes rules and unresolved violations.
    #[must_use]
    pub fn summary(&self) -> ComplianceSummary {
        let unresolved = |severity: Severity| {
            self.violations
                .iter()
                .filter(|v| !v.resolved && v.severity == severity)
                .count()
        };

        ComplianceSummary {
            active_rules: self.rules.values().filter(|r| r.enabled).count(),
            total_rules: self.rules.len(),
            total_violations: self.violations.len(),
            unresolved_violations: self.violations.iter().filter(|v| !v.resolved).count(),
            critical_violations: unresolved(Severity::Critical),
            error_violations: unresolved(Severity::Error),
            warning_violations: unresolved(Severity::Warning),
        }
    }

    /// Exports the rule table with violation bookkeeping.
    #[must_use]
    pub fn export_rules(&self) -> RuleTable {
        rules_to_table(self.rules.values())
    }

    /// Imports rules, replacing any with the same name.
    ///
    /// Records with an unknown `rule_type` or unusable parameters are logged
    /// and skipped. Returns the number of rules imported.
    pub fn import_rules(&mut self, table: RuleTable) -> usize {
        let mut imported = 0;
        for (name, record) in table {
            match record.into_rule(name.clone()) {
                Ok(rule) => {
                    self.rules.insert(name, rule);
                    imported += 1;
                }
                Err(e) => warn!(name = %name, error = %e, "skipping compliance rule"),
            }
        }
        info!(imported, "imported compliance rules");
        imported
    }
}

// =============================================================================
// RULE EVALUATION
// =============================================================================

struct TradeContext<'a> {
    order: &'a TradeOrder,
    portfolio: &'a Portfolio,
    market: Option<&'a MarketData>,
    trade_time: DateTime<Utc>,
}

struct Finding {
    message: String,
    details: BTreeMap<String, Value>,
}

impl Finding {
    fn new(message: String, details: Value) -> Self {
        let details = match details {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self { message, details }
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn evaluate(kind: &RuleKind, ctx: &TradeContext<'_>) -> Option<Finding> {
    match kind {
        RuleKind::PositionSize {
            max_position_pct,
            symbol_specific,
        } => check_position_size(ctx, *max_position_pct, symbol_specific),
        RuleKind::Concentration { max_sector_pct } => check_concentration(ctx, *max_sector_pct),
        RuleKind::Turnover { max_daily_turnover } => check_turnover(ctx, *max_daily_turnover),
        RuleKind::WashSale { .. } => None,
        RuleKind::ShortSelling {
            allow_short,
            max_short_pct,
        } => check_short_selling(ctx, *allow_short, *max_short_pct),
        RuleKind::Leverage { max_leverage, .. } => check_leverage(ctx, *max_leverage),
        RuleKind::TradingTime {
            market_open,
            market_close,
            timezone,
            utc_offset_minutes,
        } => check_trading_time(ctx, *market_open, *market_close, timezone, *utc_offset_minutes),
    }
}

fn check_position_size(
    ctx: &TradeContext<'_>,
    max_position_pct: f64,
    symbol_specific: &BTreeMap<String, f64>,
) -> Option<Finding> {
    let total = ctx.portfolio.gross_value();
    if total == 0.0 {
        return None;
    }

    let symbol = ctx.order.symbol.as_str();
    let new_position = ctx.portfolio.position(symbol) + ctx.order.quantity;
    let position_pct = new_position.abs() / total;
    let max_pct = symbol_specific.get(symbol).copied().unwrap_or(max_position_pct);

    (position_pct > max_pct).then(|| {
        Finding::new(
            format!(
                "Position size limit exceeded for {symbol}: {} > {}",
                pct(position_pct),
                pct(max_pct)
            ),
            json!({
                "symbol": symbol,
                "current_position_pct": position_pct,
                "max_allowed_pct": max_pct,
                "trade_quantity": ctx.order.quantity,
            }),
        )
    })
}

fn check_concentration(ctx: &TradeContext<'_>, max_sector_pct: f64) -> Option<Finding> {
    let market = ctx.market?;
    let sector = market.sector_of(ctx.order.symbol.as_str())?;
    let total = ctx.portfolio.gross_value();
    if total == 0.0 {
        return None;
    }

    let existing: f64 = ctx
        .portfolio
        .iter()
        .filter(|(s, _)| market.sector_of(s.as_str()) == Some(sector))
        .map(|(_, v)| v.abs())
        .sum();
    let sector_pct = (existing + ctx.order.notional()) / total;

    (sector_pct > max_sector_pct).then(|| {
        Finding::new(
            format!(
                "Sector concentration limit exceeded for {sector}: {} > {}",
                pct(sector_pct),
                pct(max_sector_pct)
            ),
            json!({
                "sector": sector,
                "sector_exposure_pct": sector_pct,
                "max_allowed_pct": max_sector_pct,
            }),
        )
    })
}

fn check_turnover(ctx: &TradeContext<'_>, max_daily_turnover: f64) -> Option<Finding> {
    let total = ctx.portfolio.gross_value();
    if total == 0.0 {
        return None;
    }
    let trade_value = ctx.order.notional();
    let turnover_pct = trade_value / total;

    (turnover_pct > max_daily_turnover).then(|| {
        Finding::new(
            format!(
                "Daily turnover limit exceeded: {} > {}",
                pct(turnover_pct),
                pct(max_daily_turnover)
            ),
            json!({
                "trade_turnover_pct": turnover_pct,
                "max_allowed_pct": max_daily_turnover,
                "trade_quantity": trade_value,
            }),
        )
    })
}

fn check_short_selling(
    ctx: &TradeContext<'_>,
    allow_short: bool,
    max_short_pct: f64,
) -> Option<Finding> {
    let order = ctx.order;
    if !order.is_sell() {
        return None;
    }

    if !allow_short {
        return Some(Finding::new(
            format!(
                "Short selling not allowed: {} quantity={}",
                order.symbol, order.quantity
            ),
            json!({
                "symbol": order.symbol.as_str(),
                "quantity": order.quantity,
                "short_allowed": false,
            }),
        ));
    }

    let total = ctx.portfolio.gross_value();
    if max_short_pct <= 0.0 || total == 0.0 {
        return None;
    }
    let new_position = ctx.portfolio.position(order.symbol.as_str()) + order.quantity;
    let before = ctx.portfolio.position(order.symbol.as_str()).min(0.0).abs();
    let short_pct = (ctx.portfolio.short_exposure() - before + new_position.min(0.0).abs()) / total;

    (short_pct > max_short_pct).then(|| {
        Finding::new(
            format!(
                "Short exposure limit exceeded: {} > {}",
                pct(short_pct),
                pct(max_short_pct)
            ),
            json!({
                "symbol": order.symbol.as_str(),
                "short_exposure_pct": short_pct,
                "max_allowed_pct": max_short_pct,
            }),
        )
    })
}

fn check_leverage(ctx: &TradeContext<'_>, max_leverage: f64) -> Option<Finding> {
    let mut total_long = ctx.portfolio.long_exposure();
    let mut total_short = ctx.portfolio.short_exposure();
    if ctx.order.quantity > 0.0 {
        total_long += ctx.order.quantity;
    } else {
        total_short += ctx.order.notional();
    }

    let total_exposure = total_long + total_short;
    // Capital is approximated by long exposure, floored at one unit
    let leverage = if total_long > 0.0 {
        total_exposure / total_long.max(1.0)
    } else {
        0.0
    };

    (leverage > max_leverage).then(|| {
        Finding::new(
            format!("Leverage limit exceeded: {leverage:.2}x > {max_leverage:.2}x"),
            json!({
                "current_leverage": leverage,
                "max_allowed_leverage": max_leverage,
                "total_exposure": total_exposure,
            }),
        )
    })
}

fn check_trading_time(
    ctx: &TradeContext<'_>,
    market_open: NaiveTime,
    market_close: NaiveTime,
    timezone: &str,
    utc_offset_minutes: Option<i32>,
) -> Option<Finding> {
    let local = local_time(ctx.trade_time, timezone, utc_offset_minutes)?;

    if market_open <= local && local <= market_close {
        return None;
    }

    let local_str = local.format("%H:%M:%S").to_string();
    let open_str = market_open.format("%H:%M").to_string();
    let close_str = market_close.format("%H:%M").to_string();
    Some(Finding::new(
        format!("Trading outside market hours: {local_str} not in {open_str}-{close_str} {timezone}"),
        json!({
            "current_time": local_str,
            "market_open": open_str,
            "market_close": close_str,
            "timezone": timezone,
        }),
    ))
}

/// Wall-clock time of `at` in the rule's zone, `None` if the zone is unusable.
fn local_time(
    at: DateTime<Utc>,
    timezone: &str,
    utc_offset_minutes: Option<i32>,
) -> Option<NaiveTime> {
    if let Some(minutes) = utc_offset_minutes {
        let Some(offset) = FixedOffset::east_opt(minutes * 60) else {
            warn!(utc_offset_minutes = minutes, "invalid UTC offset, trading hours not checked");
            return None;
        };
        return Some(at.with_timezone(&offset).time());
    }
    match timezone.parse::<Tz>() {
        Ok(tz) => Some(at.with_timezone(&tz).time()),
        Err(_) => {
            warn!(timezone, "unknown timezone, trading hours not checked");
            None
        }
    }
}
