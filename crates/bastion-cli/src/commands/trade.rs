//! Trade command implementation.
//!
//! Runs the pre-trade risk checks and the compliance rules for one order
//! and exits with an error when the order is blocked.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use bastion_compliance::checker::{is_blocking, ComplianceViolation};
use bastion_core::{Severity, TradeOrder};
use bastion_risk::pretrade::{check_position_risk, check_trade_risk, TradeRiskDecision};

use crate::cli::OutputFormat;
use crate::commands::{validate_price, validate_quantity, Context};
use crate::error::CliError;
use crate::input::{load_optional_sectors, load_positions, load_returns};
use crate::output::{
    format_severity, print_header, print_output, print_single, print_success, print_warning,
    KeyValue,
};

/// Arguments for the trade command.
#[derive(Args, Debug)]
pub struct TradeArgs {
    /// Instrument symbol
    #[arg(short, long)]
    pub symbol: String,

    /// Signed trade value (negative to sell)
    #[arg(short = 'n', long, allow_hyphen_values = true)]
    pub quantity: f64,

    /// Positions CSV (symbol,value)
    #[arg(short, long)]
    pub positions: PathBuf,

    /// Sectors CSV (symbol,sector)
    #[arg(long)]
    pub sectors: Option<PathBuf>,

    /// Returns CSV (date,symbol,return) for the position VaR check
    #[arg(short, long)]
    pub returns: Option<PathBuf>,

    /// Limit price
    #[arg(long)]
    pub price: Option<f64>,

    /// Trade time (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Audit log (JSON lines) receiving the check result
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}

/// Violation row for display.
#[derive(Debug, Serialize, Tabled)]
pub struct ViolationRow {
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Message")]
    pub message: String,
}

impl From<&ComplianceViolation> for ViolationRow {
    fn from(v: &ComplianceViolation) -> Self {
        Self {
            rule: v.rule_name.clone(),
            severity: format_severity(v.severity),
            message: v.message.clone(),
        }
    }
}

/// Combined outcome of the risk and compliance checks.
#[derive(Debug, Serialize)]
pub struct TradeCheck {
    pub order: TradeOrder,
    pub approved: bool,
    pub risk: Vec<TradeRiskDecision>,
    pub violations: Vec<ComplianceViolation>,
}

/// Execute the trade command.
pub fn execute(args: TradeArgs, ctx: &Context) -> Result<()> {
    let quantity = validate_quantity(args.quantity)?;
    let mut order = TradeOrder::new(args.symbol.as_str(), quantity);
    if let Some(price) = args.price {
        order = order.with_price(validate_price(price)?);
    }
    if let Some(at) = args.at {
        order = order.at(at);
    }

    let portfolio = load_positions(&args.positions)?;
    let market = load_optional_sectors(args.sectors.as_deref())?;
    let portfolio_value = portfolio.gross_value();
    let limits = ctx.config.risk.pretrade_limits();

    let mut risk = vec![check_position_risk(
        &order,
        &portfolio,
        portfolio_value,
        market.as_ref(),
        &limits,
    )];
    if let Some(path) = &args.returns {
        let returns = load_returns(path)?;
        let series = returns.get(order.symbol.as_str()).map(|s| s.values());
        risk.push(check_trade_risk(&order, portfolio_value, series, &limits));
    }

    let mut checker = ctx.config.compliance.checker();
    let violations = checker.check_trade_compliance(&order, &portfolio, market.as_ref());

    if let Some(trail) = ctx.audit_trail(args.audit_log.as_deref())? {
        trail.log_compliance_check("pre_trade", &violations)?;
    }

    let enforcement = &ctx.config.compliance.enforcement;
    let blocked = is_blocking(&violations, enforcement);
    let rejected = risk.iter().find(|d| !d.approved).map(|d| d.message.clone());

    let check = TradeCheck {
        order,
        approved: !blocked && rejected.is_none(),
        risk,
        violations,
    };
    report(&check, ctx)?;

    if enforcement.warn_on_warning && !ctx.quiet {
        for v in check.violations.iter().filter(|v| v.severity == Severity::Warning) {
            print_warning(&v.message);
        }
    }

    if blocked {
        let count = check
            .violations
            .iter()
            .filter(|v| v.severity.is_blocking())
            .count();
        return Err(CliError::TradeBlocked(count).into());
    }
    if let Some(message) = rejected {
        return Err(CliError::RiskRejected(message).into());
    }
    if !ctx.quiet {
        print_success("Trade passed pre-trade checks");
    }
    Ok(())
}

fn report(check: &TradeCheck, ctx: &Context) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        return print_single(check, ctx.format);
    }

    let violations: Vec<ViolationRow> = check.violations.iter().map(ViolationRow::from).collect();
    if !ctx.is_table() {
        return print_output(&violations, ctx.format);
    }

    print_header("Pre-Trade Risk");
    let decisions: Vec<KeyValue> = check
        .risk
        .iter()
        .map(|d| {
            let verdict = match (d.approved, d.adjusted_value) {
                (false, _) => "REJECTED".to_string(),
                (true, Some(value)) => format!("ADJUSTED to {value:.2}"),
                (true, None) => "APPROVED".to_string(),
            };
            KeyValue::new(verdict, d.message.clone())
        })
        .collect();
    print_output(&decisions, ctx.format)?;

    print_header("Compliance Violations");
    print_output(&violations, ctx.format)
}
