//! Bastion Configuration Layer
//!
//! Typed settings for the risk engine, the compliance engine and the
//! monitoring service, loaded from YAML, JSON or TOML.
//!
//! # Features
//!
//! - **Risk settings**: confidence, windows, position and sector caps,
//!   sizing budget, stress scenarios and the metric limit table
//! - **Compliance settings**: rule table, enforcement policy, circuit breaker
//! - **Monitoring settings**: check interval, retention, audit log location
//! - **Validation**: range checks collected into a list of field errors
//!
//! # Example
//!
//! ```rust,no_run
//! use bastion_config::{load_config, Validate};
//!
//! let config = load_config("bastion.yaml")?;
//! config.validate_or_error()?;
//! let monitor = config.risk.monitor();
//! let checker = config.compliance.checker();
//! # Ok::<(), bastion_config::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod loader;
pub mod settings;

pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
pub use loader::{load_config, read_file, save_config, write_file, ConfigFormat};
pub use settings::{BastionConfig, ComplianceSettings, MonitoringSettings, RiskSettings};
