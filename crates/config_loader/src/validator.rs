//! Configuration validation module
//!
//! Rules:
//! - queue capacity and wait timeout > 0
//! - respawn delay >= 1, max_failure >= 1
//! - sincedb path non-empty when set
//! - per-file patterns are valid globs
//! - transport parameters required by the selected kind are present

use std::net::SocketAddr;

use contracts::{ContractError, ShipperConfig, TransportKind};

/// Validate ShipperConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ShipperConfig) -> Result<(), ContractError> {
    validate_queue(config)?;
    validate_respawn(config)?;
    validate_sincedb(config)?;
    validate_files(config)?;
    validate_transport(config)?;
    Ok(())
}

fn validate_queue(config: &ShipperConfig) -> Result<(), ContractError> {
    if config.queue.capacity == 0 {
        return Err(ContractError::config_validation(
            "queue.capacity",
            "capacity must be > 0",
        ));
    }
    if config.queue.wait_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "queue.wait_timeout_secs",
            "wait_timeout_secs must be > 0",
        ));
    }
    Ok(())
}

/// A delay of 0 would retry in a hot loop
fn validate_respawn(config: &ShipperConfig) -> Result<(), ContractError> {
    if config.respawn.delay == 0 {
        return Err(ContractError::config_validation(
            "respawn.delay",
            "delay must be >= 1",
        ));
    }
    if config.respawn.max_failure == 0 {
        return Err(ContractError::config_validation(
            "respawn.max_failure",
            "max_failure must be >= 1",
        ));
    }
    Ok(())
}

fn validate_sincedb(config: &ShipperConfig) -> Result<(), ContractError> {
    if let Some(path) = &config.sincedb.path {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                "sincedb.path",
                "path cannot be empty, omit it to disable checkpointing",
            ));
        }
    }
    Ok(())
}

fn validate_files(config: &ShipperConfig) -> Result<(), ContractError> {
    for (idx, file) in config.files.iter().enumerate() {
        if file.pattern.is_empty() {
            return Err(ContractError::config_validation(
                format!("files[{idx}].pattern"),
                "pattern cannot be empty",
            ));
        }
        if let Err(e) = glob::Pattern::new(&file.pattern) {
            return Err(ContractError::config_validation(
                format!("files[{idx}].pattern"),
                format!("invalid glob '{}': {e}", file.pattern),
            ));
        }
    }
    Ok(())
}

fn validate_transport(config: &ShipperConfig) -> Result<(), ContractError> {
    let params = &config.transport.params;
    match config.transport.kind {
        TransportKind::Stdout => Ok(()),
        TransportKind::File => match params.get("path") {
            Some(path) if !path.is_empty() => Ok(()),
            _ => Err(ContractError::config_validation(
                "transport.params.path",
                "file transport requires 'path'",
            )),
        },
        TransportKind::Tcp => {
            let addr = params.get("addr").ok_or_else(|| {
                ContractError::config_validation(
                    "transport.params.addr",
                    "tcp transport requires 'addr'",
                )
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    "transport.params.addr",
                    format!("invalid address '{addr}': {e}"),
                )
            })?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::FileConfig;

    fn tcp_config(addr: &str) -> ShipperConfig {
        let mut config = ShipperConfig::default();
        config.transport.kind = TransportKind::Tcp;
        config
            .transport
            .params
            .insert("addr".to_string(), addr.to_string());
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ShipperConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_respawn_delay_rejected() {
        let mut config = ShipperConfig::default();
        config.respawn.delay = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("respawn.delay"));
    }

    #[test]
    fn test_zero_max_failure_rejected() {
        let mut config = ShipperConfig::default();
        config.respawn.max_failure = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = ShipperConfig::default();
        config.queue.capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_tcp_requires_valid_addr() {
        assert!(validate(&tcp_config("127.0.0.1:5140")).is_ok());
        assert!(validate(&tcp_config("not-an-addr")).is_err());

        let mut config = ShipperConfig::default();
        config.transport.kind = TransportKind::Tcp;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_file_requires_path() {
        let mut config = ShipperConfig::default();
        config.transport.kind = TransportKind::File;
        assert!(validate(&config).is_err());

        config
            .transport
            .params
            .insert("path".to_string(), "/tmp/out.log".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let mut config = ShipperConfig::default();
        config.files.push(FileConfig {
            pattern: "/var/log/[*.log".to_string(),
            ..FileConfig::default()
        });
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("files[0].pattern"));
    }

    #[test]
    fn test_empty_sincedb_path_rejected() {
        let mut config = ShipperConfig::default();
        config.sincedb.path = Some(std::path::PathBuf::new());
        assert!(validate(&config).is_err());
    }
}
