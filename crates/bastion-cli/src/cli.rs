//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::{
    AuditArgs, LimitsArgs, MonitorArgs, RiskArgs, RulesArgs, SizeArgs, StressArgs, TradeArgs,
};

/// Bastion - Portfolio risk and compliance CLI
#[derive(Parser)]
#[command(name = "bastion")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (yaml, json or toml)
    #[arg(short, long, global = true, env = "BASTION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Compute portfolio risk metrics, limit alerts and stress results
    Risk(RiskArgs),

    /// Evaluate the risk limit table against a portfolio
    Limits(LimitsArgs),

    /// Run pre-trade risk and compliance checks for an order
    Trade(TradeArgs),

    /// Size a position from a risk budget
    Size(SizeArgs),

    /// Apply stress scenarios to a portfolio
    Stress(StressArgs),

    /// Export or import the compliance rule table
    Rules(RulesArgs),

    /// Poll metrics and limits on a fixed interval
    Monitor(MonitorArgs),

    /// Inspect an audit log
    Audit(AuditArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
    /// Minimal output (just the value)
    Minimal,
}
