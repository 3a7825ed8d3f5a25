//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce `ShipperConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("shipper.toml")).unwrap();
//! println!("Transport: {}", config.transport.kind.as_str());
//! ```

mod parser;
mod validator;

pub use contracts::ShipperConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ShipperConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ShipperConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built configuration (e.g. after CLI overrides)
    pub fn validate(config: &ShipperConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize ShipperConfig to TOML string
    pub fn to_toml(config: &ShipperConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ShipperConfig to JSON string
    pub fn to_json(config: &ShipperConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ShipperConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TransportKind;

    const MINIMAL_TOML: &str = r#"
hostname = "web-1"

[transport]
kind = "tcp"
format = "json"
[transport.params]
addr = "127.0.0.1:5140"

[queue]
queue_timeout_secs = 120

[sincedb]
path = "/var/lib/shipper/sincedb.sqlite3"

[[files]]
pattern = "/var/log/nginx/*.log"
sincedb_write_interval_secs = 5
ignore_empty = true
fields = { service = "nginx" }
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.hostname, "web-1");
        assert_eq!(config.transport.kind, TransportKind::Tcp);
        assert_eq!(config.queue.queue_timeout_secs, 120);
        assert_eq!(config.queue.wait_timeout_secs, 5);
        assert_eq!(config.files[0].fields["service"], "nginx");
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.hostname, config2.hostname);
        assert_eq!(config.files.len(), config2.files.len());
        assert_eq!(config.sincedb.path, config2.sincedb.path);
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.transport.params, config2.transport.params);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[transport]
kind = "tcp"

[respawn]
delay = 0
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("respawn.delay"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = std::env::temp_dir().join(format!("config_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("shipper.toml");
        std::fs::write(&path, MINIMAL_TOML).unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.hostname, "web-1");

        let bad = dir.join("shipper.yaml");
        std::fs::write(&bad, "").unwrap();
        assert!(ConfigLoader::load_from_path(&bad).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_from_missing_path_is_io_error() {
        let path = std::env::temp_dir()
            .join(format!("config_loader_missing_{}", std::process::id()))
            .join("shipper.toml");

        let err = ConfigLoader::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ContractError::Io(_)), "got {err:?}");
        assert!(err.to_string().starts_with("io error:"));
    }
}
