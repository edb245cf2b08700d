//! Session-scoped audit logging, querying and reporting.

use std::error::Error;
use std::sync::Arc;

use bastion_core::TradeOrder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use super::event::{AuditEvent, AuditEventType, AuditSeverity, ChecksumStatus, DataSensitivity};
use super::store::{AuditStore, MemoryAuditStore};
use crate::checker::ComplianceViolation;
use crate::error::ComplianceResult;

/// Default cap on query results.
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

/// Risk overrides above this count in a report trigger a review recommendation.
const OVERRIDE_REVIEW_THRESHOLD: usize = 10;

/// Criteria for [`AuditTrail::query`]. Empty criteria match everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Inclusive lower time bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper time bound.
    pub end: Option<DateTime<Utc>>,
    /// Allowed event types.
    pub event_types: Vec<AuditEventType>,
    /// Acting user.
    pub user_id: Option<String>,
    /// Producing component.
    pub component: Option<String>,
    /// Exact severity.
    pub severity: Option<AuditSeverity>,
    /// Maximum number of results.
    pub limit: usize,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            event_types: Vec::new(),
            user_id: None,
            component: None,
            severity: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl AuditFilter {
    /// Filter on a time range.
    #[must_use]
    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// Restricts the event types.
    #[must_use]
    pub fn of_types(mut self, types: &[AuditEventType]) -> Self {
        self.event_types = types.to_vec();
        self
    }

    /// Returns true if `event` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.start.map_or(true, |s| event.timestamp >= s)
            && self.end.map_or(true, |e| event.timestamp <= e)
            && (self.event_types.is_empty() || self.event_types.contains(&event.event_type))
            && self
                .user_id
                .as_ref()
                .map_or(true, |u| event.user_id.as_ref() == Some(u))
            && self.component.as_ref().map_or(true, |c| &event.component == c)
            && self.severity.map_or(true, |s| event.severity == s)
    }
}

/// Outcome of checksum verification over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Verification time.
    pub checked_at: DateTime<Utc>,
    /// Range start.
    pub start: Option<DateTime<Utc>>,
    /// Range end.
    pub end: Option<DateTime<Utc>>,
    /// Events examined.
    pub total_events: usize,
    /// Events whose checksum matched.
    pub verified_events: usize,
    /// Events whose checksum did not match.
    pub corrupted_events: usize,
    /// Events without a checksum.
    pub missing_checksums: usize,
    /// Verified over total; 0 for an empty range.
    pub integrity_score: f64,
    /// Ids of corrupted events.
    pub corrupted_event_ids: Vec<String>,
}

impl IntegrityReport {
    /// Returns true if every event verified.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.corrupted_events == 0 && self.missing_checksums == 0
    }
}

/// Regulatory activity summary over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Unique report id.
    pub report_id: String,
    /// Generation time.
    pub generated_at: DateTime<Utc>,
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end.
    pub end: DateTime<Utc>,
    /// Relevant events in range.
    pub total_events: usize,
    /// Trade executions.
    pub trade_executions: usize,
    /// Compliance checks.
    pub compliance_checks: usize,
    /// Compliance checks that found violations.
    pub violations: usize,
    /// Risk overrides.
    pub risk_overrides: usize,
    /// Violation payloads from failed checks.
    pub violation_details: Vec<Value>,
    /// Suggested follow-ups.
    pub recommendations: Vec<String>,
}

/// Audit logger bound to one session.
pub struct AuditTrail {
    session_id: String,
    store: Arc<dyn AuditStore>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("session_id", &self.session_id)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::with_store(Arc::new(MemoryAuditStore::new()))
    }
}

impl AuditTrail {
    /// Creates a trail over `store` with a fresh session id.
    pub fn with_store(store: Arc<dyn AuditStore>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        info!(session_id = %session_id, backend = store.backend_name(), "audit trail opened");
        Self { session_id, store }
    }

    /// Session id stamped on every event.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stamps the session, seals and stores an event. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the append fails.
    pub fn log(&self, mut event: AuditEvent) -> ComplianceResult<String> {
        event.session_id = Some(self.session_id.clone());
        event.seal();
        self.store.append(&event)?;

        if event.severity == AuditSeverity::Critical {
            error!(event_id = %event.event_id, "critical audit event: {}", event.description);
        } else {
            debug!(event_id = %event.event_id, event_type = %event.event_type, "audit event logged");
        }
        Ok(event.event_id)
    }

    /// Records an executed trade.
    ///
    /// # Errors
    ///
    /// See [`AuditTrail::log`].
    pub fn log_trade_execution(
        &self,
        order: &TradeOrder,
        user: Option<&str>,
        strategy: Option<&str>,
    ) -> ComplianceResult<String> {
        let price = order
            .price
            .map_or_else(|| "market".to_string(), |p| p.to_string());
        let event = AuditEvent::new(
            AuditEventType::TradeExecution,
            AuditSeverity::High,
            "trading_engine",
            "execute_trade",
            format!("Trade executed: {} {} @ {price}", order.symbol, order.quantity),
        )
        .with_user(user)
        .with_context("strategy", strategy)
        .with_input(serde_json::to_value(order)?)
        .with_tags(&["trade_log", "transaction_record"])
        .with_sensitivity(DataSensitivity::Confidential);
        self.log(event)
    }

    /// Records a compliance check and its violations.
    ///
    /// # Errors
    ///
    /// See [`AuditTrail::log`].
    pub fn log_compliance_check(
        &self,
        check_type: &str,
        violations: &[ComplianceViolation],
    ) -> ComplianceResult<String> {
        let (severity, outcome) = if violations.is_empty() {
            (AuditSeverity::Info, "PASSED")
        } else {
            (AuditSeverity::Critical, "FAILED")
        };
        let event = AuditEvent::new(
            AuditEventType::ComplianceCheck,
            severity,
            "compliance_engine",
            check_type,
            format!("Compliance check: {check_type} ({outcome})"),
        )
        .with_context("check_type", check_type)
        .with_context("violations_count", violations.len())
        .with_output(json!({ "violations": violations }))
        .with_tags(&["regulatory_compliance", "regulatory_check"])
        .with_sensitivity(DataSensitivity::Confidential);
        self.log(event)
    }

    /// Records an operator overriding a risk limit.
    ///
    /// # Errors
    ///
    /// See [`AuditTrail::log`].
    pub fn log_risk_override(
        &self,
        user: &str,
        limit_name: &str,
        reason: &str,
    ) -> ComplianceResult<String> {
        let event = AuditEvent::new(
            AuditEventType::RiskOverride,
            AuditSeverity::High,
            "risk_monitor",
            "override_limit",
            format!("Risk limit '{limit_name}' overridden by {user}: {reason}"),
        )
        .with_user(Some(user))
        .with_context("limit_name", limit_name)
        .with_context("reason", reason)
        .with_tags(&["risk_override", "regulatory_compliance"])
        .with_sensitivity(DataSensitivity::Confidential);
        self.log(event)
    }

    /// Records a configuration change with a field-level diff.
    ///
    /// # Errors
    ///
    /// See [`AuditTrail::log`].
    pub fn log_configuration_change(
        &self,
        component: &str,
        old_config: &Value,
        new_config: &Value,
        user: &str,
        reason: &str,
    ) -> ComplianceResult<String> {
        let diff = config_diff(old_config, new_config);
        let count = |key: &str| diff[key].as_object().map_or(0, Map::len);

        let event = AuditEvent::new(
            AuditEventType::ConfigurationChange,
            AuditSeverity::High,
            component,
            "update_configuration",
            format!("Configuration updated for {component}: {reason}"),
        )
        .with_user(Some(user))
        .with_context("change_reason", reason)
        .with_context("fields_changed", count("changed"))
        .with_context("fields_added", count("added"))
        .with_context("fields_removed", count("removed"))
        .with_input(json!({ "config_diff": diff }))
        .with_tags(&["config_change", "system_modification"]);
        self.log(event)
    }

    /// Records a component failure.
    ///
    /// # Errors
    ///
    /// See [`AuditTrail::log`].
    pub fn log_error(
        &self,
        component: &str,
        err: &dyn Error,
        context: Map<String, Value>,
    ) -> ComplianceResult<String> {
        let mut sources = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            sources.push(cause.to_string());
            source = cause.source();
        }

        let mut event = AuditEvent::new(
            AuditEventType::ErrorEvent,
            AuditSeverity::High,
            component,
            "error_occurred",
            format!("Error in {component}: {err}"),
        )
        .with_error_details(json!({
            "error_message": err.to_string(),
            "sources": sources,
        }))
        .with_tags(&["error_log", "system_fault"]);
        event.context = context;
        self.log(event)
    }

    /// Events matching `filter`, newest first, at most `filter.limit`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if loading fails.
    pub fn query(&self, filter: &AuditFilter) -> ComplianceResult<Vec<AuditEvent>> {
        let mut events: Vec<AuditEvent> = self
            .store
            .load()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(filter.limit);
        Ok(events)
    }

    /// Verifies the checksum of every event in the range.
    ///
    /// # Errors
    ///
    /// Returns the store's error if loading fails.
    pub fn verify_integrity(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> ComplianceResult<IntegrityReport> {
        let filter = AuditFilter {
            limit: usize::MAX,
            ..AuditFilter::between(start, end)
        };
        let events = self.query(&filter)?;

        let mut report = IntegrityReport {
            checked_at: Utc::now(),
            start,
            end,
            total_events: events.len(),
            verified_events: 0,
            corrupted_events: 0,
            missing_checksums: 0,
            integrity_score: 0.0,
            corrupted_event_ids: Vec::new(),
        };

        for event in &events {
            match event.verify() {
                ChecksumStatus::Verified => report.verified_events += 1,
                ChecksumStatus::Missing => report.missing_checksums += 1,
                ChecksumStatus::Corrupted => {
                    report.corrupted_events += 1;
                    report.corrupted_event_ids.push(event.event_id.clone());
                }
            }
        }
        if report.total_events > 0 {
            report.integrity_score = report.verified_events as f64 / report.total_events as f64;
        }

        info!(
            total = report.total_events,
            corrupted = report.corrupted_events,
            score = report.integrity_score,
            "audit integrity verified"
        );
        Ok(report)
    }

    /// Summarizes trades, checks and overrides in the range.
    ///
    /// # Errors
    ///
    /// Returns the store's error if loading fails.
    pub fn compliance_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ComplianceResult<ComplianceReport> {
        let filter = AuditFilter::between(Some(start), Some(end)).of_types(&[
            AuditEventType::TradeExecution,
            AuditEventType::ComplianceCheck,
            AuditEventType::RiskOverride,
        ]);
        let events = self.query(&filter)?;

        let mut report = ComplianceReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            start,
            end,
            total_events: events.len(),
            trade_executions: 0,
            compliance_checks: 0,
            violations: 0,
            risk_overrides: 0,
            violation_details: Vec::new(),
            recommendations: Vec::new(),
        };

        for event in &events {
            match event.event_type {
                AuditEventType::TradeExecution => report.trade_executions += 1,
                AuditEventType::RiskOverride => report.risk_overrides += 1,
                AuditEventType::ComplianceCheck => {
                    report.compliance_checks += 1;
                    let found = event
                        .output_data
                        .as_ref()
                        .and_then(|o| o.get("violations"))
                        .and_then(Value::as_array)
                        .filter(|v| !v.is_empty());
                    if let Some(found) = found {
                        report.violations += 1;
                        report.violation_details.extend(found.iter().cloned());
                    }
                }
                _ => {}
            }
        }

        if report.violations > 0 {
            report
                .recommendations
                .push("Investigate and address compliance violations".to_string());
        }
        if report.risk_overrides > OVERRIDE_REVIEW_THRESHOLD {
            report
                .recommendations
                .push("Review risk override procedures".to_string());
        }

        info!(report_id = %report.report_id, events = report.total_events, "compliance report generated");
        Ok(report)
    }
}

/// Top-level field diff of two JSON objects.
fn config_diff(old: &Value, new: &Value) -> Value {
    let empty = Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);

    let mut changed = Map::new();
    let mut removed = Map::new();
    for (key, old_value) in old {
        match new.get(key) {
            Some(new_value) if new_value != old_value => {
                changed.insert(key.clone(), json!({ "old": old_value, "new": new_value }));
            }
            Some(_) => {}
            None => {
                removed.insert(key.clone(), old_value.clone());
            }
        }
    }
    let added: Map<String, Value> = new
        .iter()
        .filter(|(k, _)| !old.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    json!({ "changed": changed, "added": added, "removed": removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ComplianceChecker;
    use bastion_core::Portfolio;
    use chrono::Duration;

    fn trail() -> (AuditTrail, Arc<MemoryAuditStore>) {
        let store = Arc::new(MemoryAuditStore::new());
        (AuditTrail::with_store(store.clone()), store)
    }

    #[test]
    fn test_trade_event_fields() {
        let (trail, _) = trail();
        let order = TradeOrder::new("AAPL", 1_500.0).with_price(190.5);
        let id = trail.log_trade_execution(&order, Some("trader-1"), Some("momentum")).unwrap();

        let events = trail.query(&AuditFilter::default()).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_id, id);
        assert_eq!(event.description, "Trade executed: AAPL 1500 @ 190.5");
        assert_eq!(event.session_id.as_deref(), Some(trail.session_id()));
        assert_eq!(event.context["strategy"], "momentum");
        assert_eq!(event.data_sensitivity, DataSensitivity::Confidential);
        assert_eq!(event.verify(), ChecksumStatus::Verified);
    }

    #[test]
    fn test_compliance_check_severity() {
        let (trail, _) = trail();
        let mut checker = ComplianceChecker::new();
        let portfolio = Portfolio::from_iter([("A", 1_000.0)]);
        let violations =
            checker.check_trade_compliance(&TradeOrder::new("A", -10.0), &portfolio, None);
        assert!(!violations.is_empty());

        trail.log_compliance_check("pre_trade", &violations).unwrap();
        trail.log_compliance_check("pre_trade", &[]).unwrap();

        let critical = AuditFilter {
            severity: Some(AuditSeverity::Critical),
            ..AuditFilter::default()
        };
        let failed = trail.query(&critical).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].description, "Compliance check: pre_trade (FAILED)");
    }

    #[test]
    fn test_config_diff() {
        let (trail, store) = trail();
        let old = json!({"confidence": 0.95, "lookback": 252, "legacy": true});
        let new = json!({"confidence": 0.99, "lookback": 252, "window": 60});
        trail
            .log_configuration_change("risk_monitor", &old, &new, "ops", "tighten VaR")
            .unwrap();

        let event = &store.load().unwrap()[0];
        let diff = &event.input_data.as_ref().unwrap()["config_diff"];
        assert_eq!(diff["changed"]["confidence"]["new"], 0.99);
        assert_eq!(diff["added"]["window"], 60);
        assert_eq!(diff["removed"]["legacy"], true);
        assert_eq!(event.context["fields_changed"], 1);
    }

    #[test]
    fn test_error_event() {
        let (trail, store) = trail();
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "returns.csv missing");
        let mut context = Map::new();
        context.insert("file".to_string(), json!("returns.csv"));
        trail.log_error("loader", &err, context).unwrap();

        let event = &store.load().unwrap()[0];
        assert_eq!(event.event_type, AuditEventType::ErrorEvent);
        assert_eq!(event.context["file"], "returns.csv");
        assert_eq!(
            event.error_details.as_ref().unwrap()["error_message"],
            "returns.csv missing"
        );
    }

    #[test]
    fn test_query_newest_first_and_limited() {
        let (trail, store) = trail();
        let base = Utc::now();
        for i in 0..5 {
            let mut event = AuditEvent::new(
                AuditEventType::UserAction,
                AuditSeverity::Low,
                "ui",
                format!("click-{i}"),
                "click",
            );
            event.timestamp = base + Duration::seconds(i);
            event.seal();
            store.append(&event).unwrap();
        }

        let filter = AuditFilter {
            limit: 2,
            ..AuditFilter::default()
        };
        let events = trail.query(&filter).unwrap();
        let actions: Vec<_> = events.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["click-4", "click-3"]);

        let ranged = AuditFilter::between(Some(base + Duration::seconds(1)), Some(base + Duration::seconds(2)));
        assert_eq!(trail.query(&ranged).unwrap().len(), 2);
    }

    #[test]
    fn test_integrity_detects_tampering() {
        let (trail, store) = trail();
        trail.log_risk_override("ops", "portfolio_var_95", "hedge pending").unwrap();

        let mut tampered = AuditEvent::new(
            AuditEventType::RiskOverride,
            AuditSeverity::High,
            "risk_monitor",
            "override_limit",
            "original",
        );
        tampered.seal();
        tampered.description = "rewritten".to_string();
        store.append(&tampered).unwrap();

        let unsealed = AuditEvent::new(
            AuditEventType::SystemEvent,
            AuditSeverity::Info,
            "tests",
            "noop",
            "no checksum",
        );
        store.append(&unsealed).unwrap();

        let report = trail.verify_integrity(None, None).unwrap();
        assert_eq!(report.total_events, 3);
        assert_eq!(report.verified_events, 1);
        assert_eq!(report.corrupted_events, 1);
        assert_eq!(report.missing_checksums, 1);
        assert_eq!(report.corrupted_event_ids, vec![tampered.event_id.clone()]);
        assert!(!report.is_intact());
    }

    #[test]
    fn test_compliance_report() {
        let (trail, _) = trail();
        let start = Utc::now() - Duration::minutes(1);
        let order = TradeOrder::new("AAPL", 100.0);
        trail.log_trade_execution(&order, None, None).unwrap();

        let mut checker = ComplianceChecker::new();
        let portfolio = Portfolio::from_iter([("AAPL", 1_000.0)]);
        let violations =
            checker.check_trade_compliance(&TradeOrder::new("AAPL", -10.0), &portfolio, None);
        trail.log_compliance_check("pre_trade", &violations).unwrap();
        trail.log_compliance_check("pre_trade", &[]).unwrap();
        for _ in 0..11 {
            trail.log_risk_override("ops", "position_limit", "rebalance").unwrap();
        }

        let report = trail.compliance_report(start, Utc::now() + Duration::minutes(1)).unwrap();
        assert_eq!(report.total_events, 14);
        assert_eq!(report.trade_executions, 1);
        assert_eq!(report.compliance_checks, 2);
        assert_eq!(report.violations, 1);
        assert_eq!(report.violation_details.len(), violations.len());
        assert_eq!(report.risk_overrides, 11);
        assert_eq!(
            report.recommendations,
            vec![
                "Investigate and address compliance violations".to_string(),
                "Review risk override procedures".to_string(),
            ]
        );
    }
}
