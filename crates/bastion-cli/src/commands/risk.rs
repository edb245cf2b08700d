//! Risk command implementation.
//!
//! Computes portfolio metrics, evaluates the risk limits and applies the
//! configured stress scenarios.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use bastion_risk::limits::RiskAlert;
use bastion_risk::report::RiskReport;

use crate::cli::OutputFormat;
use crate::commands::Context;
use crate::input::{load_optional_sectors, load_positions, load_returns};
use crate::output::{
    format_percent, format_severity, print_header, print_output, print_single, print_warning,
    KeyValue,
};

/// Arguments for the risk command.
#[derive(Args, Debug)]
pub struct RiskArgs {
    /// Positions CSV (symbol,value)
    #[arg(short, long)]
    pub positions: PathBuf,

    /// Returns CSV (date,symbol,return)
    #[arg(short, long)]
    pub returns: PathBuf,

    /// Sectors CSV (symbol,sector) for sector stress shocks
    #[arg(short, long)]
    pub sectors: Option<PathBuf>,
}

/// Alert row for display.
#[derive(Debug, Serialize, Tabled)]
pub struct AlertRow {
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Current")]
    pub current: String,
    #[tabled(rename = "Threshold")]
    pub threshold: String,
}

impl From<&RiskAlert> for AlertRow {
    fn from(alert: &RiskAlert) -> Self {
        Self {
            limit: alert.limit_name.clone(),
            severity: format_severity(alert.severity),
            current: format!("{:.4}", alert.current_value),
            threshold: format!("{:.4}", alert.threshold),
        }
    }
}

/// Execute the risk command.
pub fn execute(args: RiskArgs, ctx: &Context) -> Result<()> {
    let portfolio = load_positions(&args.positions)?;
    let returns = load_returns(&args.returns)?;
    let market = load_optional_sectors(args.sectors.as_deref())?;

    let settings = &ctx.config.risk;
    let mut monitor = settings.monitor();
    let report = RiskReport::generate(
        &settings.calculator(),
        &mut monitor,
        &portfolio,
        &returns,
        &settings.stress_scenarios,
        market.as_ref(),
    )?;

    let var_fraction = report
        .portfolio_var
        .as_ref()
        .filter(|_| report.gross_value > 0.0)
        .map(|var| var.total / report.gross_value);
    if let Some(fraction) = var_fraction.filter(|f| *f > settings.max_portfolio_var) {
        print_warning(&format!(
            "Portfolio VaR {} exceeds the {} limit",
            format_percent(fraction),
            format_percent(settings.max_portfolio_var)
        ));
    }

    if ctx.format == OutputFormat::Json {
        return print_single(&report, ctx.format);
    }

    let m = &report.metrics;
    let mut rows = vec![
        KeyValue::new("Positions", report.positions.to_string()),
        KeyValue::from_amount("Gross Value", report.gross_value),
        KeyValue::from_amount("Net Value", report.net_value),
        KeyValue::from_percent("VaR 95%", m.var_95),
        KeyValue::from_percent("VaR 99%", m.var_99),
        KeyValue::from_percent("CVaR 95%", m.cvar_95),
        KeyValue::from_percent("CVaR 99%", m.cvar_99),
        KeyValue::from_percent("Daily Volatility", m.daily_volatility),
        KeyValue::from_percent("Annual Volatility", m.annualized_volatility),
        KeyValue::from_percent("Max Drawdown", m.max_drawdown),
        KeyValue::from_percent("Downside Deviation", m.downside_deviation),
        KeyValue::from_f64("Sharpe Ratio", m.sharpe_ratio, 4),
        KeyValue::from_f64("Concentration (HHI)", m.concentration_risk, 4),
        KeyValue::new("Observations", m.observations.to_string()),
    ];
    if let Some(var) = &report.portfolio_var {
        rows.push(KeyValue::from_amount("Portfolio VaR 95%", var.total));
        rows.push(KeyValue::new("Portfolio VaR Method", format!("{:?}", var.method)));
    }

    if !ctx.is_table() {
        return print_output(&rows, ctx.format);
    }

    print_header("Portfolio Risk");
    print_output(&rows, ctx.format)?;

    print_header("Limit Alerts");
    let alerts: Vec<AlertRow> = report.alerts.iter().map(AlertRow::from).collect();
    print_output(&alerts, ctx.format)?;

    print_header("Stress Scenarios");
    let stress: Vec<KeyValue> = report
        .stress
        .iter()
        .map(|r| {
            KeyValue::new(
                r.scenario.clone(),
                format!("{:.2} ({})", r.pnl, format_percent(r.pnl_pct)),
            )
        })
        .collect();
    print_output(&stress, ctx.format)?;

    Ok(())
}
