//! `run` command implementation.

use anyhow::Result;
use dispatcher::StopReason;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)?;

    // Apply CLI overrides
    if let Some(ref hostname) = args.hostname {
        info!(hostname = %hostname, "Overriding hostname from CLI");
        config.hostname = hostname.clone();
    }
    if let Some(ref sincedb) = args.sincedb {
        info!(sincedb = %sincedb.display(), "Overriding sincedb path from CLI");
        config.sincedb.path = Some(sincedb.clone());
    }

    info!(
        transport = config.transport.kind.as_str(),
        format = ?config.transport.format,
        sincedb = ?config.sincedb.path,
        files = args.files.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        config,
        files: args.files.clone(),
        batch_lines: args.batch_lines.max(1),
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping dispatcher...");
        trigger.cancel();
    });

    let stats = pipeline.run(cancel).await?;
    stats.print_summary();

    if stats.outcome.reason == StopReason::RespawnCancelled {
        info!("Respawn cancelled by operator, exiting");
        std::process::exit(0);
    }

    info!("Shipper finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
