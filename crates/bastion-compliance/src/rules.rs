//! Trade-level compliance rules.
//!
//! Each [`RuleKind`] variant carries its own typed parameters. The serde form
//! is the `{"rule_type": ..., "parameters": {...}}` pair used in exported
//! rule tables and configuration files; every parameter has a default, so a
//! partial parameter object is accepted.

use std::collections::BTreeMap;
use std::fmt;

use bastion_core::Severity;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ComplianceError, ComplianceResult};

/// Serde adapter for `HH:MM` wall-clock times.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_time(&s).map_err(de::Error::custom)
    }
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

fn default_max_position_pct() -> f64 {
    0.05
}

fn default_max_sector_pct() -> f64 {
    0.30
}

fn default_max_daily_turnover() -> f64 {
    0.20
}

fn default_lookback_days() -> u32 {
    30
}

fn default_threshold_pct() -> f64 {
    0.05
}

fn default_max_leverage() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_market_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN)
}

fn default_market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_timezone() -> String {
    "US/Eastern".to_string()
}

/// Rule kind with typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", content = "parameters", rename_all = "snake_case")]
pub enum RuleKind {
    /// Post-trade position over gross portfolio value.
    PositionSize {
        /// Default cap.
        #[serde(default = "default_max_position_pct")]
        max_position_pct: f64,
        /// Per-symbol caps overriding the default.
        #[serde(default)]
        symbol_specific: BTreeMap<String, f64>,
    },
    /// Post-trade sector exposure over gross portfolio value.
    Concentration {
        /// Sector cap.
        #[serde(default = "default_max_sector_pct")]
        max_sector_pct: f64,
    },
    /// Trade value over gross portfolio value.
    Turnover {
        /// Turnover cap.
        #[serde(default = "default_max_daily_turnover")]
        max_daily_turnover: f64,
    },
    /// Repurchase after a loss sale. Needs trade history, so never fires here.
    WashSale {
        /// Lookback window.
        #[serde(default = "default_lookback_days")]
        lookback_days: u32,
        /// Size threshold.
        #[serde(default = "default_threshold_pct")]
        threshold_pct: f64,
    },
    /// Short-sale restriction.
    ShortSelling {
        /// Whether sells may open or extend a short.
        #[serde(default)]
        allow_short: bool,
        /// Cap on post-trade short exposure when shorts are allowed; 0 disables the cap.
        #[serde(default)]
        max_short_pct: f64,
    },
    /// Gross exposure over long exposure.
    Leverage {
        /// Leverage cap.
        #[serde(default = "default_max_leverage")]
        max_leverage: f64,
        /// Carried for configuration compatibility.
        #[serde(default = "default_true")]
        include_margin: bool,
    },
    /// Trading window in a named time zone.
    TradingTime {
        /// Session open.
        #[serde(default = "default_market_open", with = "hhmm")]
        market_open: NaiveTime,
        /// Session close.
        #[serde(default = "default_market_close", with = "hhmm")]
        market_close: NaiveTime,
        /// IANA time zone name, e.g. `US/Eastern` or `Asia/Kolkata`.
        #[serde(default = "default_timezone")]
        timezone: String,
        /// Fixed offset from UTC in minutes, used instead of `timezone` when set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        utc_offset_minutes: Option<i32>,
    },
}

impl RuleKind {
    /// Canonical `rule_type` label.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::PositionSize { .. } => "position_size",
            RuleKind::Concentration { .. } => "concentration",
            RuleKind::Turnover { .. } => "turnover",
            RuleKind::WashSale { .. } => "wash_sale",
            RuleKind::ShortSelling { .. } => "short_selling",
            RuleKind::Leverage { .. } => "leverage",
            RuleKind::TradingTime { .. } => "trading_time",
        }
    }

    /// Parameters as a JSON object.
    #[must_use]
    pub fn parameters(&self) -> Value {
        match self {
            RuleKind::PositionSize {
                max_position_pct,
                symbol_specific,
            } => json!({
                "max_position_pct": max_position_pct,
                "symbol_specific": symbol_specific,
            }),
            RuleKind::Concentration { max_sector_pct } => {
                json!({ "max_sector_pct": max_sector_pct })
            }
            RuleKind::Turnover { max_daily_turnover } => {
                json!({ "max_daily_turnover": max_daily_turnover })
            }
            RuleKind::WashSale {
                lookback_days,
                threshold_pct,
            } => json!({
                "lookback_days": lookback_days,
                "threshold_pct": threshold_pct,
            }),
            RuleKind::ShortSelling {
                allow_short,
                max_short_pct,
            } => json!({
                "allow_short": allow_short,
                "max_short_pct": max_short_pct,
            }),
            RuleKind::Leverage {
                max_leverage,
                include_margin,
            } => json!({
                "max_leverage": max_leverage,
                "include_margin": include_margin,
            }),
            RuleKind::TradingTime {
                market_open,
                market_close,
                timezone,
                utc_offset_minutes,
            } => {
                let mut params = json!({
                    "market_open": market_open.format("%H:%M").to_string(),
                    "market_close": market_close.format("%H:%M").to_string(),
                    "timezone": timezone,
                });
                if let Some(offset) = utc_offset_minutes {
                    params["utc_offset_minutes"] = json!(offset);
                }
                params
            }
        }
    }

    /// Rebuilds a kind from its `rule_type` label and parameter object.
    ///
    /// A `null` parameter value is treated as an empty object.
    ///
    /// # Errors
    ///
    /// `UnknownRuleType` for an unrecognized label, `InvalidParameters` when
    /// the parameters do not fit the kind.
    pub fn from_parts(name: &str, rule_type: &str, parameters: Value) -> ComplianceResult<Self> {
        const KNOWN: [&str; 7] = [
            "position_size",
            "concentration",
            "turnover",
            "wash_sale",
            "short_selling",
            "leverage",
            "trading_time",
        ];
        if !KNOWN.contains(&rule_type) {
            return Err(ComplianceError::UnknownRuleType(rule_type.to_string()));
        }

        let parameters = match parameters {
            Value::Null => json!({}),
            other => other,
        };
        serde_json::from_value(json!({ "rule_type": rule_type, "parameters": parameters }))
            .map_err(|e| ComplianceError::invalid_parameters(name, e.to_string()))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A named compliance rule with violation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Unique rule name.
    pub name: String,
    /// Kind and parameters.
    pub kind: RuleKind,
    /// Severity of violations.
    pub severity: Severity,
    /// Disabled rules are never evaluated.
    pub enabled: bool,
    /// Violations since the last reset.
    pub violation_count: u64,
    /// Time of the most recent violation.
    pub last_violation: Option<DateTime<Utc>>,
}

impl ComplianceRule {
    /// Creates an enabled rule with no history.
    pub fn new(name: impl Into<String>, kind: RuleKind, severity: Severity) -> Self {
        Self {
            name: name.into(),
            kind,
            severity,
            enabled: true,
            violation_count: 0,
            last_violation: None,
        }
    }

    /// The default rule table.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "position_limit",
                RuleKind::PositionSize {
                    max_position_pct: 0.05,
                    symbol_specific: BTreeMap::new(),
                },
                Severity::Error,
            ),
            Self::new(
                "sector_concentration",
                RuleKind::Concentration {
                    max_sector_pct: 0.30,
                },
                Severity::Warning,
            ),
            Self::new(
                "daily_turnover_limit",
                RuleKind::Turnover {
                    max_daily_turnover: 0.20,
                },
                Severity::Warning,
            ),
            Self::new(
                "wash_sale_detection",
                RuleKind::WashSale {
                    lookback_days: 30,
                    threshold_pct: 0.05,
                },
                Severity::Error,
            ),
            Self::new(
                "short_selling_check",
                RuleKind::ShortSelling {
                    allow_short: false,
                    max_short_pct: 0.0,
                },
                Severity::Error,
            ),
            Self::new(
                "leverage_limit",
                RuleKind::Leverage {
                    max_leverage: 1.0,
                    include_margin: true,
                },
                Severity::Error,
            ),
            Self::new(
                "trading_hours",
                RuleKind::TradingTime {
                    market_open: default_market_open(),
                    market_close: default_market_close(),
                    timezone: default_timezone(),
                    utc_offset_minutes: None,
                },
                Severity::Warning,
            ),
        ]
    }
}

/// Persisted form of a rule, keyed by rule name in an exported table.
///
/// Unknown fields are ignored; missing optional fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Rule kind label.
    pub rule_type: String,
    /// Kind-specific parameters.
    #[serde(default)]
    pub parameters: Value,
    /// Violation severity.
    #[serde(default)]
    pub severity: Severity,
    /// Whether the rule is evaluated.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Violation count to restore.
    #[serde(default)]
    pub violation_count: u64,
    /// Last violation time to restore.
    #[serde(default)]
    pub last_violation: Option<DateTime<Utc>>,
}

impl From<&ComplianceRule> for RuleRecord {
    fn from(rule: &ComplianceRule) -> Self {
        Self {
            rule_type: rule.kind.type_name().to_string(),
            parameters: rule.kind.parameters(),
            severity: rule.severity,
            enabled: rule.enabled,
            violation_count: rule.violation_count,
            last_violation: rule.last_violation,
        }
    }
}

impl RuleRecord {
    /// Converts the record into a rule named `name`.
    ///
    /// # Errors
    ///
    /// See [`RuleKind::from_parts`].
    pub fn into_rule(self, name: impl Into<String>) -> ComplianceResult<ComplianceRule> {
        let name = name.into();
        let kind = RuleKind::from_parts(&name, &self.rule_type, self.parameters)?;
        Ok(ComplianceRule {
            name,
            kind,
            severity: self.severity,
            enabled: self.enabled,
            violation_count: self.violation_count,
            last_violation: self.last_violation,
        })
    }
}

/// Exported rule table.
pub type RuleTable = BTreeMap<String, RuleRecord>;

/// Exports rules to a table keyed by name.
pub fn rules_to_table<'a>(rules: impl IntoIterator<Item = &'a ComplianceRule>) -> RuleTable {
    rules
        .into_iter()
        .map(|r| (r.name.clone(), RuleRecord::from(r)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let rules = ComplianceRule::defaults();
        assert_eq!(rules.len(), 7);

        let hours = rules.iter().find(|r| r.name == "trading_hours").unwrap();
        assert_eq!(hours.severity, Severity::Warning);
        match &hours.kind {
            RuleKind::TradingTime {
                market_open,
                market_close,
                timezone,
                utc_offset_minutes,
            } => {
                assert_eq!(market_open.format("%H:%M").to_string(), "09:30");
                assert_eq!(market_close.format("%H:%M").to_string(), "16:00");
                assert_eq!(timezone, "US/Eastern");
                assert_eq!(*utc_offset_minutes, None);
            }
            other => panic!("unexpected kind {other}"),
        }
    }

    #[test]
    fn test_adjacent_tagging() {
        let kind = RuleKind::Turnover {
            max_daily_turnover: 0.2,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["rule_type"], "turnover");
        assert_eq!(json["parameters"]["max_daily_turnover"], 0.2);
        assert_eq!(kind.parameters(), json["parameters"]);
    }

    #[test]
    fn test_from_parts_defaults() {
        let kind = RuleKind::from_parts("pos", "position_size", Value::Null).unwrap();
        assert_eq!(
            kind,
            RuleKind::PositionSize {
                max_position_pct: 0.05,
                symbol_specific: BTreeMap::new(),
            }
        );

        let hours =
            RuleKind::from_parts("hours", "trading_time", json!({"market_open": "08:00"})).unwrap();
        match hours {
            RuleKind::TradingTime { market_open, market_close, .. } => {
                assert_eq!(market_open, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
                assert_eq!(market_close, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
            }
            other => panic!("unexpected kind {other}"),
        }
    }

    #[test]
    fn test_from_parts_errors() {
        assert!(matches!(
            RuleKind::from_parts("x", "insider_trading", json!({})),
            Err(ComplianceError::UnknownRuleType(_))
        ));
        assert!(matches!(
            RuleKind::from_parts("x", "trading_time", json!({"market_open": "25:61"})),
            Err(ComplianceError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_record_round_trip() {
        for rule in ComplianceRule::defaults() {
            let record = RuleRecord::from(&rule);
            let restored = record.into_rule(rule.name.clone()).unwrap();
            assert_eq!(restored, rule);
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time("16:00:30").unwrap(), NaiveTime::from_hms_opt(16, 0, 30).unwrap());
        assert!(parse_time("noon").is_err());
    }
}
