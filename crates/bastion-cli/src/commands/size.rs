//! Size command implementation.
//!
//! Sizes a position from the configured risk budget.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use bastion_risk::sizing::size_position;

use crate::cli::OutputFormat;
use crate::commands::{validate_portfolio_value, validate_price, Context};
use crate::error::CliError;
use crate::input::load_returns;
use crate::output::{print_header, print_output, print_single, KeyValue};

/// Arguments for the size command.
#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Instrument symbol
    #[arg(short, long)]
    pub symbol: String,

    /// Current price per share
    #[arg(long)]
    pub price: f64,

    /// Returns CSV (date,symbol,return)
    #[arg(short, long)]
    pub returns: PathBuf,

    /// Total portfolio value
    #[arg(long)]
    pub portfolio_value: f64,

    /// Override the configured confidence level
    #[arg(long)]
    pub confidence: Option<f64>,
}

/// Execute the size command.
pub fn execute(args: SizeArgs, ctx: &Context) -> Result<()> {
    let price = validate_price(args.price)?;
    let portfolio_value = validate_portfolio_value(args.portfolio_value)?;

    let returns = load_returns(&args.returns)?;
    let series = returns
        .get(args.symbol.as_str())
        .ok_or_else(|| CliError::UnknownSymbol(args.symbol.clone()))?;

    let mut budget = ctx.config.risk.budget();
    if let Some(confidence) = args.confidence {
        budget.confidence_level = confidence;
    }

    let result = size_position(
        args.symbol.as_str(),
        price,
        series.values(),
        portfolio_value,
        &budget,
    )?;

    match ctx.format {
        OutputFormat::Json => return print_single(&result, ctx.format),
        OutputFormat::Minimal => {
            println!("{}", result.shares);
            return Ok(());
        }
        OutputFormat::Table | OutputFormat::Csv => {}
    }

    let b = &result.breakdown;
    let rows = vec![
        KeyValue::new("Symbol", result.symbol.to_string()),
        KeyValue::new("Shares", result.shares.to_string()),
        KeyValue::new("Position Value", format!("{:.2}", result.position_value)),
        KeyValue::new("Risk Amount", format!("{:.2}", result.risk_amount)),
        KeyValue::from_percent("Risk / Portfolio", result.risk_pct),
        KeyValue::from_percent("Position / Portfolio", b.position_to_portfolio),
        KeyValue::new("Binding Constraint", result.binding_constraint.to_string()),
        KeyValue::from_f64("Confidence", result.confidence_level, 2),
        KeyValue::new("Observations", b.observations.to_string()),
        KeyValue::from_percent("VaR 95%", b.var_95),
        KeyValue::from_percent("VaR 99%", b.var_99),
        KeyValue::from_percent("Annual Volatility", b.annualized_volatility),
        KeyValue::from_amount("VaR-Based Value", b.var_based_value),
        KeyValue::from_amount("Volatility-Based Value", b.volatility_based_value),
        KeyValue::from_amount("Max Position Value", b.max_position_value),
    ];

    if ctx.is_table() {
        print_header(&format!("Position Size: {}", result.symbol));
    }
    print_output(&rows, ctx.format)
}
