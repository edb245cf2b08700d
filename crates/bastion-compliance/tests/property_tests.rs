//! Property-based tests for compliance invariants.
//!
//! These tests verify properties that should hold for any input:
//! - Each violated rule produces exactly one violation and one counter tick
//! - Disabled rules never produce violations
//! - Exported rule tables import back to identical rules
//! - Sealed audit events verify after a JSON-lines round trip

use std::sync::Arc;

use bastion_compliance::audit::{AuditTrail, JsonlAuditStore};
use bastion_compliance::prelude::*;
use bastion_core::{MarketData, Portfolio, TradeOrder};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

// =============================================================================
// TEST DATA GENERATORS
// =============================================================================

/// Simple deterministic hash for test data generation.
fn simple_hash(seed: u64, i: u64) -> u64 {
    let mut x = seed.wrapping_add(i).wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x = x.wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x
}

/// Ten positions, each in [-20k, 80k].
fn generate_portfolio(seed: u64) -> Portfolio {
    (0..10)
        .map(|i| {
            let hash = simple_hash(seed, i);
            let value = (hash % 100_001) as f64 - 20_000.0;
            (format!("S{i}"), value)
        })
        .collect()
}

fn generate_order(seed: u64) -> TradeOrder {
    let hash = simple_hash(seed, 1_000);
    let symbol = format!("S{}", hash % 12);
    let quantity = (simple_hash(seed, 2_000) % 200_001) as f64 - 100_000.0;
    let minutes = (simple_hash(seed, 3_000) % (24 * 60)) as i64;
    let at = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap() + Duration::minutes(minutes);
    TradeOrder::new(symbol, quantity).at(at)
}

fn sectors() -> MarketData {
    MarketData::with_sectors((0..12).map(|i| {
        let sector = if i % 2 == 0 { "tech" } else { "energy" };
        (format!("S{i}"), sector)
    }))
}

fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap()
}

// =============================================================================
// PROPERTY: ONE VIOLATION PER RULE
// =============================================================================

#[test]
fn property_one_violation_per_violated_rule() {
    let market = sectors();
    for seed in 0..200 {
        let portfolio = generate_portfolio(seed);
        let order = generate_order(seed);
        let mut checker = ComplianceChecker::new();

        let violations = checker.check_trade_compliance_at(&order, &portfolio, Some(&market), clock());

        let mut names: Vec<_> = violations.iter().map(|v| v.rule_name.clone()).collect();
        names.dedup();
        assert_eq!(names.len(), violations.len(), "seed {seed}: duplicate rule");

        for rule in checker.rules() {
            let fired = violations.iter().any(|v| v.rule_name == rule.name);
            assert_eq!(rule.violation_count, u64::from(fired), "seed {seed}: {}", rule.name);
            assert_eq!(rule.last_violation.is_some(), fired);
        }
        for violation in &violations {
            let rule = checker.rule(&violation.rule_name).unwrap();
            assert_eq!(violation.severity, rule.severity);
            assert_eq!(violation.violation_type, rule.kind.type_name());
            assert!(!violation.resolved);
        }
        assert_eq!(checker.summary().total_violations, violations.len());
    }
}

// =============================================================================
// PROPERTY: DISABLED RULES ARE INERT
// =============================================================================

#[test]
fn property_disabled_rules_never_fire() {
    let market = sectors();
    let names: Vec<String> = ComplianceRule::defaults().into_iter().map(|r| r.name).collect();

    for seed in 0..100 {
        let portfolio = generate_portfolio(seed);
        let order = generate_order(seed);
        let disabled = &names[(simple_hash(seed, 9) % names.len() as u64) as usize];

        let mut checker = ComplianceChecker::new();
        checker.set_enabled(disabled, false);
        let violations = checker.check_trade_compliance_at(&order, &portfolio, Some(&market), clock());

        assert!(violations.iter().all(|v| &v.rule_name != disabled));
        assert_eq!(checker.rule(disabled).unwrap().violation_count, 0);
    }

    let mut checker = ComplianceChecker::new();
    for name in &names {
        checker.set_enabled(name, false);
    }
    let order = TradeOrder::new("S1", -1e9);
    assert!(checker
        .check_trade_compliance_at(&order, &generate_portfolio(1), Some(&market), clock())
        .is_empty());
}

// =============================================================================
// PROPERTY: RULE TABLE ROUND TRIP
// =============================================================================

#[test]
fn property_rule_table_round_trip() {
    let market = sectors();
    let mut source = ComplianceChecker::new();
    for seed in 0..50 {
        source.check_trade_compliance_at(
            &generate_order(seed),
            &generate_portfolio(seed),
            Some(&market),
            clock(),
        );
    }
    source.set_enabled("leverage_limit", false);

    let json = serde_json::to_string_pretty(&source.export_rules()).unwrap();
    let table: RuleTable = serde_json::from_str(&json).unwrap();
    let restored = ComplianceChecker::from_table(table);

    let original: Vec<_> = source.rules().collect();
    let imported: Vec<_> = restored.rules().collect();
    assert_eq!(original, imported);
}

// =============================================================================
// PROPERTY: AUDIT INTEGRITY
// =============================================================================

#[test]
fn property_sealed_events_verify_from_disk() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonlAuditStore::open(dir.path().join("audit.jsonl")).unwrap());
    let trail = AuditTrail::with_store(store);
    let market = sectors();
    let mut checker = ComplianceChecker::new();

    for seed in 0..40 {
        let order = generate_order(seed).with_price(1.0 + (simple_hash(seed, 7) % 10_000) as f64 / 7.0);
        trail.log_trade_execution(&order, Some("trader"), None).unwrap();
        let violations =
            checker.check_trade_compliance_at(&order, &generate_portfolio(seed), Some(&market), clock());
        trail.log_compliance_check("pre_trade", &violations).unwrap();
    }

    let report = trail.verify_integrity(None, None).unwrap();
    assert_eq!(report.total_events, 80);
    assert_eq!(report.verified_events, 80);
    assert!(report.is_intact());
    assert_eq!(report.integrity_score, 1.0);
}
