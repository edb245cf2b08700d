//! CLI command implementations.

pub mod audit;
pub mod limits;
pub mod monitor;
pub mod risk;
pub mod rules;
pub mod size;
pub mod stress;
pub mod trade;

// Re-export submodules for convenience
pub use audit::AuditArgs;
pub use limits::LimitsArgs;
pub use monitor::MonitorArgs;
pub use risk::RiskArgs;
pub use rules::RulesArgs;
pub use size::SizeArgs;
pub use stress::StressArgs;
pub use trade::TradeArgs;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use bastion_compliance::audit::{AuditTrail, JsonlAuditStore};
use bastion_config::{load_config, BastionConfig, Validate};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    /// Output format.
    pub format: OutputFormat,
    /// Suppress headers and informational lines.
    pub quiet: bool,
    /// Loaded and validated configuration.
    pub config: BastionConfig,
    /// File the configuration was read from, or would be written to.
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Loads the configuration from `path`, or from the user config
    /// directory when no path is given.
    pub fn load(path: Option<&Path>, format: OutputFormat, quiet: bool) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(default_config_path);

        let config = match &config_path {
            Some(p) => load_config(p)?,
            None => BastionConfig::default(),
        };
        config
            .validate_or_error()
            .map_err(|e| CliError::Config(e.to_string()))?;

        debug!(path = ?config_path, "configuration ready");

        Ok(Self {
            format,
            quiet,
            config,
            config_path,
        })
    }

    /// True when headers and tables are printed.
    pub fn is_table(&self) -> bool {
        self.format == OutputFormat::Table && !self.quiet
    }

    /// Audit trail backed by `path`, or by the configured audit log.
    pub fn audit_trail(&self, path: Option<&Path>) -> Result<Option<AuditTrail>> {
        let Some(path) = path.or(self.config.monitoring.audit_log_path.as_deref()) else {
            return Ok(None);
        };
        let store = JsonlAuditStore::open(path)?;
        Ok(Some(AuditTrail::with_store(Arc::new(store))))
    }
}

/// `<config dir>/bastion/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bastion").join("config.yaml"))
}

/// Validates a price value.
pub fn validate_price(price: f64) -> CliResult<f64> {
    if !price.is_finite() || price <= 0.0 {
        return Err(CliError::InvalidPrice(price));
    }
    Ok(price)
}

/// Validates an order quantity.
pub fn validate_quantity(quantity: f64) -> CliResult<f64> {
    if !quantity.is_finite() || quantity == 0.0 {
        return Err(CliError::InvalidQuantity(quantity));
    }
    Ok(quantity)
}

/// Validates a portfolio value.
pub fn validate_portfolio_value(value: f64) -> CliResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CliError::InvalidPortfolioValue(value));
    }
    Ok(value)
}
