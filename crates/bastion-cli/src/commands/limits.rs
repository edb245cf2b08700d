//! Limits command implementation.
//!
//! Shows every configured risk limit with the observed metric value.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use bastion_config::read_file;
use bastion_core::Portfolio;
use bastion_risk::limits::{LimitTable, RiskLimit, RiskMonitor};
use bastion_risk::metrics::RiskMetrics;

use crate::commands::Context;
use crate::input::{load_positions, load_returns};
use crate::output::{format_severity, print_header, print_info, print_output, print_warning};

/// Arguments for the limits command.
#[derive(Args, Debug)]
pub struct LimitsArgs {
    /// Positions CSV (symbol,value)
    #[arg(short, long)]
    pub positions: PathBuf,

    /// Returns CSV (date,symbol,return)
    #[arg(short, long)]
    pub returns: PathBuf,

    /// Limit table (yaml, json or toml) replacing the configured limits
    #[arg(short, long)]
    pub limits: Option<PathBuf>,
}

/// Limit status row for display.
#[derive(Debug, Serialize, Tabled)]
pub struct LimitRow {
    #[tabled(rename = "Limit")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Current")]
    pub current: String,
    #[tabled(rename = "Threshold")]
    pub threshold: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl LimitRow {
    fn new(limit: &RiskLimit, metrics: &RiskMetrics, portfolio: &Portfolio, colored: bool) -> Self {
        let current = limit.kind.observe(metrics, portfolio);
        let status = if !limit.enabled {
            "DISABLED"
        } else if limit.is_breached_by(current) {
            "BREACH"
        } else {
            "OK"
        };
        Self {
            name: limit.name.clone(),
            kind: limit.kind.as_str().to_string(),
            current: format!("{current:.4}"),
            threshold: format!("{:.4}", limit.threshold),
            severity: if colored {
                format_severity(limit.severity)
            } else {
                limit.severity.to_string()
            },
            status: status.to_string(),
        }
    }
}

/// Execute the limits command.
pub fn execute(args: LimitsArgs, ctx: &Context) -> Result<()> {
    let portfolio = load_positions(&args.positions)?;
    let returns = load_returns(&args.returns)?;

    let mut monitor = match &args.limits {
        Some(path) => {
            let table: LimitTable = read_file(path)?;
            let mut monitor = RiskMonitor::empty();
            let imported = monitor.import_limits(table);
            if !ctx.quiet {
                print_info(&format!("Loaded {imported} limits from {}", path.display()));
            }
            monitor
        }
        None => ctx.config.risk.monitor(),
    };

    let metrics = ctx.config.risk.calculator().portfolio_risk(&portfolio, &returns)?;
    let alerts = monitor.check_limits(&metrics, &portfolio);

    let colored = ctx.is_table();
    let rows: Vec<LimitRow> = monitor
        .limits()
        .map(|limit| LimitRow::new(limit, &metrics, &portfolio, colored))
        .collect();

    if colored {
        print_header("Risk Limits");
    }
    print_output(&rows, ctx.format)?;

    if !alerts.is_empty() && !ctx.quiet {
        print_warning(&format!("{} limit(s) breached", alerts.len()));
    }

    Ok(())
}
