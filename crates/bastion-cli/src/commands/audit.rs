//! Audit command implementation.
//!
//! Verifies checksums and summarizes activity in a JSON-lines audit log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};

use bastion_compliance::audit::{AuditTrail, JsonlAuditStore};

use crate::cli::OutputFormat;
use crate::commands::Context;
use crate::error::CliError;
use crate::output::{print_header, print_output, print_single, print_success, KeyValue};

/// Arguments for the audit command.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Verify event checksums
    Verify(RangeArgs),

    /// Summarize trades, compliance checks and overrides
    Report(RangeArgs),
}

/// Log file and optional time range.
#[derive(Args, Debug)]
pub struct RangeArgs {
    /// Audit log (JSON lines)
    #[arg(long)]
    pub file: PathBuf,

    /// Range start (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Range end (RFC 3339)
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
}

/// Execute the audit command.
pub fn execute(args: AuditArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuditCommand::Verify(range) => verify(&range, ctx),
        AuditCommand::Report(range) => report(&range, ctx),
    }
}

fn open(path: &Path) -> Result<AuditTrail> {
    if !path.exists() {
        return Err(CliError::input(path, "audit log not found").into());
    }
    let store = JsonlAuditStore::open(path)?;
    Ok(AuditTrail::with_store(Arc::new(store)))
}

fn verify(args: &RangeArgs, ctx: &Context) -> Result<()> {
    let trail = open(&args.file)?;
    let report = trail.verify_integrity(args.start, args.end)?;

    if ctx.format == OutputFormat::Json {
        print_single(&report, ctx.format)?;
    } else {
        let mut rows = vec![
            KeyValue::new("Total Events", report.total_events.to_string()),
            KeyValue::new("Verified", report.verified_events.to_string()),
            KeyValue::new("Corrupted", report.corrupted_events.to_string()),
            KeyValue::new("Missing Checksum", report.missing_checksums.to_string()),
            KeyValue::from_percent("Integrity Score", report.integrity_score),
        ];
        rows.extend(
            report
                .corrupted_event_ids
                .iter()
                .map(|id| KeyValue::new("Corrupted Event", id.clone())),
        );
        if ctx.is_table() {
            print_header(&format!("Audit Integrity: {}", args.file.display()));
        }
        print_output(&rows, ctx.format)?;
    }

    if !report.is_intact() {
        return Err(CliError::IntegrityFailure {
            corrupted: report.corrupted_events,
            missing: report.missing_checksums,
        }
        .into());
    }
    if !ctx.quiet {
        print_success(&format!("{} events verified", report.verified_events));
    }
    Ok(())
}

fn report(args: &RangeArgs, ctx: &Context) -> Result<()> {
    let trail = open(&args.file)?;
    let end = args.end.unwrap_or_else(Utc::now);
    let retention = i64::from(ctx.config.monitoring.data_retention_days);
    let start = args.start.unwrap_or(end - Duration::days(retention));

    let report = trail.compliance_report(start, end)?;

    if ctx.format == OutputFormat::Json {
        return print_single(&report, ctx.format);
    }

    let checks = report.compliance_checks;
    let pass_rate = if checks > 0 {
        (checks - report.violations.min(checks)) as f64 / checks as f64
    } else {
        1.0
    };
    let mut rows = vec![
        KeyValue::new("Period Start", start.to_rfc3339()),
        KeyValue::new("Period End", end.to_rfc3339()),
        KeyValue::new("Events", report.total_events.to_string()),
        KeyValue::new("Trade Executions", report.trade_executions.to_string()),
        KeyValue::new("Compliance Checks", checks.to_string()),
        KeyValue::new("Checks With Violations", report.violations.to_string()),
        KeyValue::from_percent("Pass Rate", pass_rate),
        KeyValue::new("Risk Overrides", report.risk_overrides.to_string()),
    ];
    rows.extend(
        report
            .recommendations
            .iter()
            .map(|r| KeyValue::new("Recommendation", r.clone())),
    );

    if ctx.is_table() {
        print_header("Compliance Report");
    }
    print_output(&rows, ctx.format)
}
