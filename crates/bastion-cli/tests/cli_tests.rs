//! End-to-end tests for the `bastion` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// FIXTURES
// =============================================================================

/// 25 equal long positions of 40,000 (4% each, gross 1,000,000).
const POSITION_COUNT: usize = 25;
const RETURN_DAYS: usize = 60;
const TRADE_TIME: &str = "2024-03-05T15:00:00Z";

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut positions = String::from("symbol,value\n");
        for i in 0..POSITION_COUNT {
            positions.push_str(&format!("S{i},40000\n"));
        }
        fs::write(dir.path().join("positions.csv"), positions).unwrap();

        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut returns = String::from("date,symbol,return\n");
        for day in 0..RETURN_DAYS {
            let date = start + chrono::Duration::days(day as i64);
            for i in 0..POSITION_COUNT {
                let r = 0.012 * ((day * (i + 3)) as f64 * 0.7).sin() + 0.0004;
                returns.push_str(&format!("{date},S{i},{r:.6}\n"));
            }
        }
        fs::write(dir.path().join("returns.csv"), returns).unwrap();

        let mut sectors = String::from("symbol,sector\n");
        for i in 0..POSITION_COUNT {
            let sector = if i % 2 == 0 { "tech" } else { "value" };
            sectors.push_str(&format!("S{i},{sector}\n"));
        }
        fs::write(dir.path().join("sectors.csv"), sectors).unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Command with an isolated configuration file.
    fn bastion(&self) -> Command {
        let mut cmd = Command::cargo_bin("bastion").unwrap();
        cmd.env_remove("BASTION_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.path("config.yaml"));
        cmd
    }
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("bastion")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("risk"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let fx = Fixture::new();
    fs::write(fx.path("config.yaml"), "risk:\n  confidence_level: 1.5\n").unwrap();

    fx.bastion()
        .args(["rules", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("risk.confidence_level"));
}

#[test]
fn test_missing_positions_file() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["stress", "--positions"])
        .arg(fx.path("absent.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.csv"));
}

// =============================================================================
// RISK AND LIMITS
// =============================================================================

#[test]
fn test_risk_table() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["risk", "--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Portfolio Risk"))
        .stdout(predicate::str::contains("VaR 95%"))
        .stdout(predicate::str::contains("market_crash"));
}

#[test]
fn test_risk_json_report() {
    let fx = Fixture::new();
    let output = fx
        .bastion()
        .args(["--format", "json", "risk"])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["positions"], 25);
    assert_eq!(report["gross_value"], 1_000_000.0);
    assert_eq!(report["metrics"]["observations"], RETURN_DAYS);
    assert_eq!(report["stress"].as_array().unwrap().len(), 2);
    // Market crash: every position loses 20%.
    let crash = report["stress"][0]["pnl"].as_f64().unwrap();
    assert!((crash + 200_000.0).abs() < 1e-6);
}

#[test]
fn test_limits_from_file_breach() {
    let fx = Fixture::new();
    fs::write(
        fx.path("limits.json"),
        r#"{
            "tiny_position": {"limit_type": "position_size", "threshold": 0.01, "severity": "ERROR"},
            "loose_volatility": {"limit_type": "volatility", "threshold": 10.0},
            "mystery": {"limit_type": "gamma", "threshold": 1.0}
        }"#,
    )
    .unwrap();

    fx.bastion()
        .args(["limits", "--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .args(["--limits", arg(&fx.path("limits.json"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("tiny_position"))
        .stdout(predicate::str::contains("BREACH"))
        .stdout(predicate::str::contains("mystery").not())
        .stderr(predicate::str::contains("1 limit(s) breached"));
}

// =============================================================================
// TRADES
// =============================================================================

#[test]
fn test_small_trade_passes() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["trade", "--symbol", "S0", "--quantity", "1000", "--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trade passed pre-trade checks"));
}

#[test]
fn test_short_sale_is_blocked() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["trade", "--symbol", "S1", "--quantity", "-100000", "--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .assert()
        .failure()
        .stdout(predicate::str::contains("short_selling_check"))
        .stderr(predicate::str::contains("Trade blocked"));
}

#[test]
fn test_trade_json_lists_violations() {
    let fx = Fixture::new();
    let output = fx
        .bastion()
        .args(["--format", "json", "trade", "--symbol", "S2", "--quantity", "-100000"])
        .args(["--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let check: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(check["approved"], false);
    let rules: Vec<&str> = check["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["rule_name"].as_str().unwrap())
        .collect();
    assert!(rules.contains(&"short_selling_check"));
    assert!(rules.contains(&"position_limit"));
}

#[test]
fn test_new_position_over_count_is_rejected() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["trade", "--symbol", "NEW", "--quantity", "1000", "--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Maximum number of positions (20) reached"));
}

// =============================================================================
// SIZING AND STRESS
// =============================================================================

#[test]
fn test_size_minimal_prints_shares() {
    let fx = Fixture::new();
    let output = fx
        .bastion()
        .args(["--format", "minimal", "size", "--symbol", "S3", "--price", "50"])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .args(["--portfolio-value", "1000000"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let shares: u64 = String::from_utf8(output.stdout).unwrap().trim().parse().unwrap();
    assert!(shares > 0);
    // The 5% position cap bounds the size: 50,000 / 50.
    assert!(shares <= 1_000);
}

#[test]
fn test_size_unknown_symbol() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["size", "--symbol", "ZZZ", "--price", "50"])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .args(["--portfolio-value", "1000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No returns for symbol 'ZZZ'"));
}

#[test]
fn test_size_rejects_bad_price() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["size", "--symbol", "S3", "--price", "0"])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .args(["--portfolio-value", "1000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid price"));
}

#[test]
fn test_stress_csv_with_sectors() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["--format", "csv", "stress"])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--sectors", arg(&fx.path("sectors.csv"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("scenario,symbol,pnl,pnl_pct"))
        .stdout(predicate::str::contains("market_crash,TOTAL,-200000.00"))
        // 13 tech × 40,000 × −15% + 12 value × 40,000 × 5%
        .stdout(predicate::str::contains("sector_rotation,TOTAL,-54000.00"));
}

// =============================================================================
// RULES
// =============================================================================

#[test]
fn test_rules_export_and_import() {
    let fx = Fixture::new();
    let exported = fx.path("rules.yaml");

    fx.bastion()
        .args(["rules", "export", "--file", arg(&exported)])
        .assert()
        .success();
    let text = fs::read_to_string(&exported).unwrap();
    assert!(text.contains("short_selling_check"));

    fs::write(
        fx.path("extra.json"),
        r#"{
            "tight_turnover": {"rule_type": "turnover", "parameters": {"max_daily_turnover": 0.01}},
            "astrology": {"rule_type": "horoscope", "parameters": {}}
        }"#,
    )
    .unwrap();

    fx.bastion()
        .args(["rules", "import", "--file", arg(&fx.path("extra.json"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 rules"))
        .stderr(predicate::str::contains("Skipped 1 invalid rule(s)"));

    let config = fs::read_to_string(fx.path("config.yaml")).unwrap();
    assert!(config.contains("tight_turnover"));
    assert!(config.contains("position_limit"));
    assert!(!config.contains("astrology"));

    fx.bastion()
        .args(["--format", "csv", "rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tight_turnover,turnover"));
}

// =============================================================================
// AUDIT
// =============================================================================

#[test]
fn test_audit_log_verifies_and_detects_tampering() {
    let fx = Fixture::new();
    let log = fx.path("audit/audit.jsonl");

    fx.bastion()
        .args(["trade", "--symbol", "S0", "--quantity", "1000", "--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--audit-log", arg(&log)])
        .assert()
        .success();
    fx.bastion()
        .args(["trade", "--symbol", "S1", "--quantity", "-100000", "--at", TRADE_TIME])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--audit-log", arg(&log)])
        .assert()
        .failure();

    fx.bastion()
        .args(["audit", "verify", "--file", arg(&log)])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 events verified"));

    fx.bastion()
        .args(["--format", "json", "audit", "report", "--file", arg(&log)])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"compliance_checks\": 2"))
        .stdout(predicate::str::contains("\"violations\": 1"));

    let original = fs::read_to_string(&log).unwrap();
    let tampered = original.replacen("\"severity\":\"info\"", "\"severity\":\"low\"", 1);
    assert_ne!(original, tampered);
    fs::write(&log, tampered).unwrap();

    fx.bastion()
        .args(["audit", "verify", "--file", arg(&log)])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 corrupted"));
}

#[test]
fn test_audit_missing_log() {
    let fx = Fixture::new();
    fx.bastion()
        .args(["audit", "verify", "--file", arg(&fx.path("nope.jsonl"))])
        .assert()
        .failure()
        .stderr(predicate::str::contains("audit log not found"));
}

// =============================================================================
// MONITOR
// =============================================================================

#[test]
fn test_monitor_runs_fixed_passes() {
    let fx = Fixture::new();
    let output = fx
        .bastion()
        .args(["--format", "json", "monitor", "--interval", "1", "--iterations", "2"])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .output()
        .unwrap();
    assert!(output.status.success());

    let passes: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(passes.len(), 2);
    assert_eq!(passes[0]["pass"], 1);
    assert_eq!(passes[1]["pass"], 2);
    assert_eq!(passes[1]["metrics"]["observations"], RETURN_DAYS);
}

#[test]
fn test_monitor_disabled_in_config() {
    let fx = Fixture::new();
    fs::write(fx.path("config.yaml"), "monitoring:\n  enabled: false\n").unwrap();

    fx.bastion()
        .args(["monitor", "--iterations", "1"])
        .args(["--positions", arg(&fx.path("positions.csv"))])
        .args(["--returns", arg(&fx.path("returns.csv"))])
        .assert()
        .success()
        .stderr(predicate::str::contains("Monitoring is disabled"));
}
