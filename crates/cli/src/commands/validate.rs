//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ShipperConfig, TransportKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    hostname: String,
    transport: String,
    format: String,
    queue_capacity: usize,
    queue_timeout_secs: u64,
    respawn_delay: u64,
    max_failure: u32,
    sincedb: Option<String>,
    file_sections: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    hostname: config.hostname.clone(),
                    transport: config.transport.kind.as_str().to_string(),
                    format: format!("{:?}", config.transport.format).to_lowercase(),
                    queue_capacity: config.queue.capacity,
                    queue_timeout_secs: config.queue.queue_timeout_secs,
                    respawn_delay: config.respawn.delay,
                    max_failure: config.respawn.max_failure,
                    sincedb: config
                        .sincedb
                        .path
                        .as_ref()
                        .map(|p| p.display().to_string()),
                    file_sections: config.files.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ShipperConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sincedb.path.is_none() {
        warnings.push("No sincedb.path configured - read positions will not be saved".to_string());
    }

    if config.transport.kind == TransportKind::Stdout {
        warnings.push("Using the stdout transport".to_string());
    }

    // The largest backoff sleep, reached after max_failure consecutive failures
    let max_sleep = config
        .respawn
        .delay
        .saturating_pow(config.respawn.max_failure);
    if max_sleep > config.queue.queue_timeout_secs {
        warnings.push(format!(
            "Maximum reconnect backoff ({}s) exceeds queue_timeout_secs ({}s)",
            max_sleep, config.queue.queue_timeout_secs
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Hostname: {}", summary.hostname);
            println!("  Transport: {} ({})", summary.transport, summary.format);
            println!(
                "  Queue: capacity {}, timeout {}s",
                summary.queue_capacity, summary.queue_timeout_secs
            );
            println!(
                "  Respawn: delay {}, max_failure {}",
                summary.respawn_delay, summary.max_failure
            );
            println!(
                "  Sincedb: {}",
                summary.sincedb.as_deref().unwrap_or("disabled")
            );
            println!("  File sections: {}", summary.file_sections);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
