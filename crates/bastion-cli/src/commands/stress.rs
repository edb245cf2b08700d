//! Stress command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use bastion_config::read_file;
use bastion_risk::stress::{run_stress_tests, StressScenario};

use crate::commands::Context;
use crate::input::{load_optional_sectors, load_positions};
use crate::output::{format_percent, print_header, print_output};

/// Arguments for the stress command.
#[derive(Args, Debug)]
pub struct StressArgs {
    /// Positions CSV (symbol,value)
    #[arg(short, long)]
    pub positions: PathBuf,

    /// Sectors CSV (symbol,sector)
    #[arg(short, long)]
    pub sectors: Option<PathBuf>,

    /// Scenario list (yaml, json or toml) replacing the configured scenarios
    #[arg(long)]
    pub scenarios: Option<PathBuf>,

    /// Show per-position P&L
    #[arg(long)]
    pub detail: bool,
}

/// Stress result row for display.
#[derive(Debug, Serialize, Tabled)]
pub struct StressRow {
    #[tabled(rename = "Scenario")]
    pub scenario: String,
    #[tabled(rename = "Symbol")]
    pub symbol: String,
    #[tabled(rename = "P&L")]
    pub pnl: String,
    #[tabled(rename = "P&L %")]
    pub pnl_pct: String,
}

/// Execute the stress command.
pub fn execute(args: StressArgs, ctx: &Context) -> Result<()> {
    let portfolio = load_positions(&args.positions)?;
    let market = load_optional_sectors(args.sectors.as_deref())?;

    let scenarios: Vec<StressScenario> = match &args.scenarios {
        Some(path) => read_file(path)?,
        None => ctx.config.risk.stress_scenarios.clone(),
    };

    let results = run_stress_tests(&portfolio, &scenarios, market.as_ref());
    let gross = portfolio.gross_value();

    let mut rows = Vec::new();
    for result in &results {
        rows.push(StressRow {
            scenario: result.scenario.clone(),
            symbol: "TOTAL".to_string(),
            pnl: format!("{:.2}", result.pnl),
            pnl_pct: format_percent(result.pnl_pct),
        });
        if args.detail {
            rows.extend(result.position_pnl.iter().map(|(symbol, pnl)| StressRow {
                scenario: result.scenario.clone(),
                symbol: symbol.to_string(),
                pnl: format!("{pnl:.2}"),
                pnl_pct: format_percent(if gross > 0.0 { pnl / gross } else { 0.0 }),
            }));
        }
    }

    if ctx.is_table() {
        print_header(&format!("Stress Scenarios ({} positions)", portfolio.len()));
    }
    print_output(&rows, ctx.format)
}
