//! Integration tests for configuration loading and validation.

use bastion_config::{load_config, save_config, BastionConfig, ConfigError, Validate};
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn test_saved_config_drives_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bastion.json");

    let mut config = BastionConfig::default();
    config.risk.limits.remove("position_limit");
    config.compliance.rules.remove("trading_hours");
    save_config(&config, &path).unwrap();

    let loaded = load_config(&path).unwrap();
    assert!(loaded.is_valid());
    assert!(loaded.risk.monitor().limit("position_limit").is_none());
    assert!(loaded.compliance.checker().rule("trading_hours").is_none());
}

#[test]
fn test_unknown_types_are_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bastion.yaml");
    std::fs::write(
        &path,
        r"
risk:
  limits:
    beta_cap:
      limit_type: beta
      threshold: 1.5
    vol_cap:
      limit_type: volatility
      threshold: 0.3
compliance:
  rules:
    insider:
      rule_type: insider_trading
    turnover:
      rule_type: turnover
      parameters:
        max_daily_turnover: 0.1
",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    let monitor = config.risk.monitor();
    assert_eq!(monitor.limits().count(), 1);
    let checker = config.compliance.checker();
    assert_eq!(checker.rules().count(), 1);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bastion.ini");
    std::fs::write(&path, "x = 1").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::UnsupportedFormat(_))));
}

proptest! {
    #[test]
    fn prop_confidence_inside_unit_interval_is_valid(c in 0.0001f64..0.9999) {
        let mut config = BastionConfig::default();
        config.risk.confidence_level = c;
        prop_assert!(config.is_valid());
    }

    #[test]
    fn prop_confidence_outside_unit_interval_is_invalid(c in prop_oneof![-10.0f64..=0.0, 1.0f64..10.0]) {
        let mut config = BastionConfig::default();
        config.risk.confidence_level = c;
        let errors = config.validate();
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].field.as_str(), "risk.confidence_level");
    }
}
