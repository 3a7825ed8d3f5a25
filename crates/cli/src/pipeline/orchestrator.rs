//! Pipeline orchestrator - wires readers, queue, dispatcher and sincedb.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{SharedConfig, ShipperConfig};
use dispatcher::{command_queue, create_dispatcher, DispatchOutcome, StopReason};
use sincedb::SincedbStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::reader::{spawn_readers, LineReader, ReadCounters};
use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded and validated agent configuration
    pub config: ShipperConfig,

    /// Files to ship; stdin when empty
    pub files: Vec<PathBuf>,

    /// Maximum lines per callback
    pub batch_lines: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the dispatcher stops
    pub async fn run(self, cancel: CancellationToken) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let PipelineConfig {
            config,
            files,
            batch_lines,
            metrics_port,
        } = self.config;

        if let Some(port) = metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let store = Arc::new(SincedbStore::new(config.sincedb.path.clone()));
        store
            .ensure_schema()
            .context("Failed to initialize sincedb")?;

        let capacity = config.queue.capacity;
        let shared = SharedConfig::new(config);
        let (tx, rx) = command_queue(capacity);

        // Construction errors (bad address, unwritable output) stop us here
        let dispatcher = create_dispatcher(shared.clone(), rx, Arc::clone(&store))
            .await
            .context("Failed to create transport")?;

        let counters = Arc::new(ReadCounters::default());
        let file_count = files.len();
        let reader = LineReader::new(
            tx,
            shared,
            Arc::clone(&store),
            batch_lines,
            Arc::clone(&counters),
        );
        spawn_readers(reader, files).context("Failed to spawn reader threads")?;

        info!(files = file_count, "Pipeline started");

        // Dropping the dispatcher closes the queue and unblocks readers
        let outcome = dispatcher
            .spawn(cancel)
            .await
            .map_err(|e| CliError::dispatcher(e.to_string()))?
            .context("Dispatcher failed")?;

        flush_pending_checkpoints(&store, &outcome)?;

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            files: file_count,
            lines_read: counters.lines_read.load(Ordering::Relaxed),
            callbacks_sent: counters.callbacks_sent.load(Ordering::Relaxed),
            outcome,
        };

        info!(
            reason = ?stats.outcome.reason,
            lines_delivered = stats.outcome.metrics.lines_delivered,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline completed"
        );

        Ok(stats)
    }
}

/// Persist offsets whose checkpoint the write interval held back
///
/// Only a clean stop flushes: every line up to these offsets has been
/// delivered and nothing else will checkpoint the file in this process.
fn flush_pending_checkpoints(store: &SincedbStore, outcome: &DispatchOutcome) -> Result<()> {
    if !matches!(
        outcome.reason,
        StopReason::ExitCommand | StopReason::QueueClosed
    ) {
        return Ok(());
    }

    for (filename, &offset) in &outcome.pending_checkpoints {
        if store
            .update_position(filename, None, offset)
            .with_context(|| format!("Failed to flush checkpoint for {filename}"))?
        {
            observability::record_checkpoint(offset);
            info!(filename = %filename, offset, "Flushed checkpoint on shutdown");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::path::Path;

    use contracts::{EventFormat, SincedbConfig, TransportConfig, TransportKind};
    use dispatcher::MetricsSnapshot;
    use tempfile::tempdir;

    fn file_pipeline(log: &Path, out: &Path, db: &Path) -> Pipeline {
        let config = ShipperConfig {
            hostname: "pipeline-host".into(),
            transport: TransportConfig {
                kind: TransportKind::File,
                format: EventFormat::Raw,
                params: HashMap::from([("path".to_string(), out.display().to_string())]),
            },
            sincedb: SincedbConfig {
                path: Some(db.to_path_buf()),
                ..Default::default()
            },
            ..ShipperConfig::default()
        };
        Pipeline::new(PipelineConfig {
            config,
            files: vec![log.to_path_buf()],
            batch_lines: 1,
            metrics_port: None,
        })
    }

    #[tokio::test]
    async fn test_run_stores_final_offset_after_many_batches() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("a.log");
        let out = dir.path().join("out.log");
        let db = dir.path().join("sincedb.sqlite3");
        std::fs::write(&log, "l1\nl2\nl3\n").unwrap();

        let stats = file_pipeline(&log, &out, &db)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.outcome.reason, StopReason::ExitCommand);
        assert_eq!(stats.outcome.metrics.batches_delivered, 3);
        assert_eq!(stats.outcome.metrics.checkpoints, 1);

        let store = SincedbStore::new(Some(db.clone()));
        assert_eq!(store.start_position_for_path(&log).unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_repeated_runs_do_not_resend() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("a.log");
        let out = dir.path().join("out.log");
        let db = dir.path().join("sincedb.sqlite3");
        std::fs::write(&log, "l1\nl2\nl3\n").unwrap();

        for _ in 0..3 {
            file_pipeline(&log, &out, &db)
                .run(CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "l1\nl2\nl3\n");
    }

    #[test]
    fn test_flush_skipped_unless_clean_stop() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("a.log");
        std::fs::write(&log, "l1\n").unwrap();
        let store = SincedbStore::new(Some(dir.path().join("sincedb.sqlite3")));
        store.ensure_schema().unwrap();

        let mut outcome = DispatchOutcome {
            reason: StopReason::Cancelled,
            metrics: MetricsSnapshot::default(),
            pending_checkpoints: BTreeMap::from([(log.display().to_string(), 3)]),
        };
        flush_pending_checkpoints(&store, &outcome).unwrap();
        assert_eq!(store.start_position_for_path(&log).unwrap(), None);

        outcome.reason = StopReason::QueueClosed;
        flush_pending_checkpoints(&store, &outcome).unwrap();
        assert_eq!(store.start_position_for_path(&log).unwrap(), Some(3));
    }
}
