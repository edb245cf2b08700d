//! Monitor command implementation.
//!
//! Polls the position and return files on a fixed interval, recomputes the
//! portfolio metrics, evaluates the risk limits and feeds the circuit
//! breaker. Stops after `--iterations` passes or on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::interval;
use tracing::{debug, info, warn};

use bastion_compliance::audit::{AuditEvent, AuditEventType, AuditSeverity, AuditTrail};
use bastion_compliance::circuit::{BreakerDecision, CircuitBreaker, StrategyMetrics};
use bastion_core::Severity;
use bastion_risk::aggregation::portfolio_returns;
use bastion_risk::limits::{RiskAlert, RiskMonitor};
use bastion_risk::metrics::{RiskCalculator, RiskMetrics};

use crate::cli::OutputFormat;
use crate::commands::risk::AlertRow;
use crate::commands::Context;
use crate::error::CliError;
use crate::input::{load_positions, load_returns};
use crate::output::{
    format_percent, print_divider, print_error, print_header, print_output, print_warning, KeyValue,
};

/// Strategy name under which the portfolio is tracked by the circuit breaker.
const PORTFOLIO_STRATEGY: &str = "portfolio";

/// Arguments for the monitor command.
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Positions CSV (symbol,value), re-read on every pass
    #[arg(short, long)]
    pub positions: PathBuf,

    /// Returns CSV (date,symbol,return), re-read on every pass
    #[arg(short, long)]
    pub returns: PathBuf,

    /// Seconds between passes. Defaults to the configured interval.
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Stop after this many passes
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Audit log (JSON lines) receiving limit breaches
    #[arg(long)]
    pub audit_log: Option<PathBuf>,
}

/// One pass of the monitor, as printed in machine-readable formats.
#[derive(Debug, Serialize)]
struct PassReport {
    pass: u64,
    timestamp: DateTime<Utc>,
    metrics: RiskMetrics,
    alerts: Vec<RiskAlert>,
    breaker: BreakerDecision,
}

/// State shared between the polling task and the command.
#[derive(Clone)]
struct Shared {
    monitor: Arc<Mutex<RiskMonitor>>,
    breaker: Arc<Mutex<CircuitBreaker>>,
}

/// Inputs the polling task owns.
struct Poller {
    positions: PathBuf,
    returns: PathBuf,
    calculator: RiskCalculator,
    format: OutputFormat,
    quiet: bool,
    shared: Shared,
}

/// Execute the monitor command.
pub fn execute(args: MonitorArgs, ctx: &Context) -> Result<()> {
    if !ctx.config.monitoring.enabled {
        print_warning("Monitoring is disabled in the configuration");
        return Ok(());
    }

    let seconds = args
        .interval
        .unwrap_or(ctx.config.monitoring.check_interval_seconds);
    if seconds == 0 {
        return Err(CliError::Config("monitor interval must be positive".to_string()).into());
    }

    let mut monitor = ctx.config.risk.monitor();
    if let Some(trail) = ctx.audit_trail(args.audit_log.as_deref())? {
        let trail = Arc::new(trail);
        monitor.subscribe(Box::new(move |alert: &RiskAlert| record_alert(&trail, alert)));
    }

    let shared = Shared {
        monitor: Arc::new(Mutex::new(monitor)),
        breaker: Arc::new(Mutex::new(ctx.config.compliance.circuit_breaker())),
    };
    let poller = Poller {
        positions: args.positions,
        returns: args.returns,
        calculator: ctx.config.risk.calculator(),
        format: ctx.format,
        quiet: ctx.quiet,
        shared: shared.clone(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(poller, Duration::from_secs(seconds), args.iterations));

    if ctx.is_table() {
        print_summary(&shared);
    }
    Ok(())
}

async fn run(poller: Poller, period: Duration, iterations: Option<u64>) {
    info!(interval_secs = period.as_secs(), ?iterations, "monitor started");

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        let mut pass = 0;
        loop {
            ticker.tick().await;
            pass += 1;
            poller.poll(pass);
            if iterations.is_some_and(|n| pass >= n) {
                break;
            }
        }
        pass
    });

    tokio::select! {
        finished = task => match finished {
            Ok(passes) => info!(passes, "monitor finished"),
            Err(e) => warn!(error = %e, "monitor task failed"),
        },
        _ = tokio::signal::ctrl_c() => info!("monitor interrupted"),
    }
}

impl Poller {
    fn poll(&self, pass: u64) {
        let now = Utc::now();
        let portfolio = match load_positions(&self.positions) {
            Ok(p) => p,
            Err(e) => return self.report_failure(pass, &e),
        };
        let returns = match load_returns(&self.returns) {
            Ok(r) => r,
            Err(e) => return self.report_failure(pass, &e),
        };
        let metrics = match self.calculator.portfolio_risk(&portfolio, &returns) {
            Ok(m) => m,
            Err(e) => return self.report_failure(pass, &e),
        };

        let alerts = self.shared.monitor.lock().check_limits(&metrics, &portfolio);

        let last_return = portfolio_returns(&portfolio, &returns)
            .ok()
            .and_then(|series| series.values().last().copied())
            .unwrap_or(0.0);
        let strategy = StrategyMetrics {
            loss_percent: (-last_return).max(0.0) * 100.0,
            drawdown_percent: -metrics.max_drawdown * 100.0,
            volatility: metrics.annualized_volatility,
            daily_trades: 0,
        };
        let breaker = self
            .shared
            .breaker
            .lock()
            .check(PORTFOLIO_STRATEGY, &strategy, now);

        debug!(pass, alerts = alerts.len(), halted = breaker.halted, "monitor pass complete");

        let report = PassReport {
            pass,
            timestamp: now,
            metrics,
            alerts,
            breaker,
        };
        if let Err(e) = self.print(&report) {
            warn!(error = %e, "failed to print monitor pass");
        }
    }

    fn print(&self, report: &PassReport) -> Result<()> {
        if self.format != OutputFormat::Table {
            println!("{}", serde_json::to_string(report)?);
            return Ok(());
        }
        if self.quiet && report.alerts.is_empty() && !report.breaker.halted {
            return Ok(());
        }

        print_divider();
        println!(
            "[{}] pass {}: VaR95 {}, volatility {}, {} alert(s)",
            report.timestamp.format("%H:%M:%S"),
            report.pass,
            format_percent(report.metrics.var_95),
            format_percent(report.metrics.annualized_volatility),
            report.alerts.len()
        );
        if !report.alerts.is_empty() {
            let rows: Vec<AlertRow> = report.alerts.iter().map(AlertRow::from).collect();
            print_output(&rows, self.format)?;
        }
        if let Some(reason) = report.breaker.reason.as_deref().filter(|_| report.breaker.halted) {
            print_warning(&format!("Trading halted: {reason}"));
        }
        Ok(())
    }

    fn report_failure(&self, pass: u64, error: &dyn std::error::Error) {
        warn!(pass, error = %error, "monitor pass skipped");
        if !self.quiet {
            print_error(&format!("pass {pass} skipped: {error}"));
        }
    }
}

fn record_alert(trail: &AuditTrail, alert: &RiskAlert) {
    let severity = match alert.severity {
        Severity::Warning => AuditSeverity::Medium,
        Severity::Error => AuditSeverity::High,
        Severity::Critical => AuditSeverity::Critical,
    };
    let event = AuditEvent::new(
        AuditEventType::SystemEvent,
        severity,
        "risk_monitor",
        "limit_breach",
        alert.message.clone(),
    )
    .with_context("limit", alert.limit_name.as_str())
    .with_context("limit_type", alert.kind.as_str())
    .with_context("current_value", alert.current_value)
    .with_context("threshold", alert.threshold)
    .with_tags(&["risk_limit"]);

    if let Err(e) = trail.log(event) {
        warn!(error = %e, alert = %alert.id, "failed to audit risk alert");
    }
}

fn print_summary(shared: &Shared) {
    let summary = shared.monitor.lock().summary();
    let breaker = shared.breaker.lock();
    let trips = breaker
        .state(PORTFOLIO_STRATEGY)
        .map_or(0, |state| state.trip_count);

    let rows = vec![
        KeyValue::new("Enabled Limits", summary.enabled_limits.to_string()),
        KeyValue::new("Active Alerts", summary.active_alerts.to_string()),
        KeyValue::new("Warning", summary.warning_alerts.to_string()),
        KeyValue::new("Error", summary.error_alerts.to_string()),
        KeyValue::new("Critical", summary.critical_alerts.to_string()),
        KeyValue::new("Breaker Status", format!("{:?}", breaker.status(PORTFOLIO_STRATEGY))),
        KeyValue::new("Breaker Trips", trips.to_string()),
    ];

    print_header("Monitor Summary");
    if let Err(e) = print_output(&rows, OutputFormat::Table) {
        warn!(error = %e, "failed to print monitor summary");
    }
}
