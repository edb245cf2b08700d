//! Reading and writing configuration files.
//!
//! The format is chosen from the file extension: `.yaml`/`.yml`, `.json` or
//! `.toml`.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::settings::BastionConfig;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// JSON.
    Json,
    /// TOML.
    Toml,
}

impl ConfigFormat {
    /// Format implied by the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for any other extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
        };
        f.write_str(name)
    }
}

/// Parses a value from text in the given format.
///
/// # Errors
///
/// Returns `Deserialization` if the text does not parse.
pub fn parse<T: DeserializeOwned>(text: &str, format: ConfigFormat) -> ConfigResult<T> {
    let value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Json => serde_json::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(value)
}

/// Renders a value as text in the given format.
///
/// # Errors
///
/// Returns `Serialization` if the value cannot be represented.
pub fn render<T: Serialize>(value: &T, format: ConfigFormat) -> ConfigResult<String> {
    let text = match format {
        ConfigFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| ConfigError::Serialization(e.to_string()))?
        }
        ConfigFormat::Json => serde_json::to_string_pretty(value)?,
        ConfigFormat::Toml => toml::to_string_pretty(value)?,
    };
    Ok(text)
}

/// Reads a value from `path`, choosing the parser by extension.
///
/// # Errors
///
/// Returns an I/O, format or parse error.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    debug!(path = %path.display(), %format, "parsing file");
    parse(&text, format)
}

/// Writes a value to `path`, choosing the format by extension.
///
/// # Errors
///
/// Returns an I/O, format or serialization error.
pub fn write_file<T: Serialize>(value: &T, path: &Path) -> ConfigResult<()> {
    let format = ConfigFormat::from_path(path)?;
    let text = render(value, format)?;
    std::fs::write(path, text).map_err(|e| ConfigError::io(path, e))
}

/// Loads the configuration at `path`.
///
/// A missing file yields the defaults. The result is not validated.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<BastionConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "configuration file not found, using defaults");
        return Ok(BastionConfig::default());
    }
    let config = read_file(path)?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Saves the configuration to `path`.
///
/// # Errors
///
/// Returns an error if the format is unsupported or the write fails.
pub fn save_config(config: &BastionConfig, path: impl AsRef<Path>) -> ConfigResult<()> {
    let path = path.as_ref();
    write_file(config, path)?;
    info!(path = %path.display(), "configuration saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")).unwrap(), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("a.ini")),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, BastionConfig::default());
    }

    #[test]
    fn test_round_trip_every_format() {
        let dir = TempDir::new().unwrap();
        let mut config = BastionConfig::default();
        config.risk.confidence_level = 0.99;
        config.monitoring.audit_log_path = Some("logs/audit.jsonl".into());

        for name in ["config.yaml", "config.json", "config.toml"] {
            let path = dir.path().join(name);
            save_config(&config, &path).unwrap();
            assert_eq!(load_config(&path).unwrap(), config, "{name}");
        }
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r"
risk:
  max_position_size: 0.08
  limits:
    tight_var:
      limit_type: var_95
      threshold: -0.02
      severity: ERROR
monitoring:
  check_interval_seconds: 15
";
        let config: BastionConfig = parse(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.risk.max_position_size, 0.08);
        assert_eq!(config.risk.max_positions, 20);
        assert_eq!(config.risk.limits.len(), 1);
        assert_eq!(config.monitoring.check_interval_seconds, 15);
        assert_eq!(config.compliance.rules.len(), 7);
    }

    #[test]
    fn test_parse_error() {
        let err = parse::<BastionConfig>("risk: [", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Deserialization(_)));
    }
}
