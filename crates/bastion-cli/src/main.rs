//! Bastion CLI - Command-line interface for portfolio risk and compliance.
//!
//! # Usage
//!
//! ```bash
//! # Portfolio risk report
//! bastion risk --positions positions.csv --returns returns.csv
//!
//! # Pre-trade compliance check
//! bastion trade --symbol AAPL --quantity 50000 --positions positions.csv
//!
//! # Risk-budgeted position size
//! bastion size --symbol AAPL --price 185.0 --returns returns.csv --portfolio-value 1000000
//!
//! # Poll the limits every 30 seconds
//! bastion monitor --positions positions.csv --returns returns.csv --interval 30
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod error;
mod input;
mod output;

use cli::{Cli, Commands};
use commands::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let ctx = Context::load(cli.config.as_deref(), cli.format, cli.quiet)?;

    match cli.command {
        Commands::Risk(args) => commands::risk::execute(args, &ctx)?,
        Commands::Limits(args) => commands::limits::execute(args, &ctx)?,
        Commands::Trade(args) => commands::trade::execute(args, &ctx)?,
        Commands::Size(args) => commands::size::execute(args, &ctx)?,
        Commands::Stress(args) => commands::stress::execute(args, &ctx)?,
        Commands::Rules(args) => commands::rules::execute(args, &ctx)?,
        Commands::Monitor(args) => commands::monitor::execute(args, &ctx)?,
        Commands::Audit(args) => commands::audit::execute(args, &ctx)?,
    }

    Ok(())
}

/// Logs go to stderr so that stdout carries only command output.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
