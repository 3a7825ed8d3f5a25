//! Dispatcher - single consumer of the command queue
//!
//! Pulls one command at a time, delivers callbacks through the active
//! transport with reconnect backoff, and writes throttled checkpoints.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AddGlob, Batch, CallbackPayload, Command, SharedConfig, ShipperConfig, Transport,
};
use serde::Serialize;
use sincedb::{CheckpointThrottle, SincedbStore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::Backoff;
use crate::error::DispatcherError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::queue::CommandReceiver;
use crate::transports::{create_transport, AnyTransport};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Idle time since the last callback before stopping
    pub queue_timeout: Duration,
    /// Single queue poll timeout
    pub wait_timeout: Duration,
    /// Base of the reconnect backoff, in seconds
    pub respawn_delay: u64,
    /// Clamp for the failure counter
    pub max_failure: u32,
}

impl DispatcherConfig {
    pub fn from_config(config: &ShipperConfig) -> Self {
        Self {
            queue_timeout: config.queue.queue_timeout(),
            wait_timeout: config.queue.wait_timeout(),
            respawn_delay: config.respawn.delay,
            max_failure: config.respawn.max_failure,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_config(&ShipperConfig::default())
    }
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Running,
    /// The last queue wait timed out with no command
    DrainingOnTimeout,
    Stopped,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Transport reported invalid at the top of an iteration
    TransportInvalid,
    /// No callback within the queue timeout
    QueueTimeout,
    /// `exit` command received
    ExitCommand,
    /// Every sender dropped and the queue is drained
    QueueClosed,
    /// Cancelled while waiting on the queue
    Cancelled,
    /// Cancelled during a reconnect backoff; the process should exit with success
    RespawnCancelled,
}

/// Result of a finished dispatch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub reason: StopReason,
    pub metrics: MetricsSnapshot,
    /// Last delivered offset per file whose checkpoint was held back by the
    /// write interval. Persisted by the caller after a clean stop.
    pub pending_checkpoints: BTreeMap<String, u64>,
}

/// The dispatch loop
pub struct Dispatcher<T: Transport> {
    transport: T,
    rx: CommandReceiver,
    config: DispatcherConfig,
    shared: SharedConfig,
    store: Arc<SincedbStore>,
    throttle: CheckpointThrottle,
    backoff: Backoff,
    metrics: Arc<DispatchMetrics>,
    state: DispatchState,
    last_update: Instant,
    pending_checkpoints: BTreeMap<String, u64>,
}

impl<T: Transport> Dispatcher<T> {
    /// Create a dispatcher around an already constructed transport
    pub fn new(
        transport: T,
        rx: CommandReceiver,
        config: DispatcherConfig,
        shared: SharedConfig,
        store: Arc<SincedbStore>,
    ) -> Self {
        let backoff = Backoff::new(config.respawn_delay, config.max_failure);
        Self {
            transport,
            rx,
            throttle: CheckpointThrottle::new(shared.clone()),
            config,
            shared,
            store,
            backoff,
            metrics: Arc::new(DispatchMetrics::new()),
            state: DispatchState::Running,
            last_update: Instant::now(),
            pending_checkpoints: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Commands waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }

    /// Live counters, shareable with a reporter
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the loop until a stop condition
    ///
    /// Transport errors are retried forever. A checkpoint store failure is
    /// returned as an error and ends the run.
    #[instrument(name = "dispatcher_run", skip(self, cancel), fields(transport = %self.transport.name()))]
    pub async fn run(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, DispatcherError> {
        info!(
            queue_timeout_secs = self.config.queue_timeout.as_secs(),
            wait_timeout_secs = self.config.wait_timeout.as_secs(),
            "Dispatcher started"
        );
        self.state = DispatchState::Running;
        self.last_update = Instant::now();

        let result = self.run_loop(&cancel).await;
        self.state = DispatchState::Stopped;
        self.metrics.set_queue_len(self.rx.len());

        let reason = result?;
        info!(reason = ?reason, "Dispatcher stopped");
        Ok(DispatchOutcome {
            reason,
            metrics: self.metrics.snapshot(),
            pending_checkpoints: std::mem::take(&mut self.pending_checkpoints),
        })
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<StopReason, DispatcherError> {
        loop {
            if !self.transport.is_valid() {
                info!("Transport connection issues, stopping queue");
                return Ok(StopReason::TransportInvalid);
            }

            if self.last_update.elapsed() > self.config.queue_timeout {
                info!(
                    queue_timeout_secs = self.config.queue_timeout.as_secs(),
                    "Queue timeout exceeded, stopping queue"
                );
                return Ok(StopReason::QueueTimeout);
            }

            let wait = self.config.wait_timeout;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                polled = timeout(wait, self.rx.recv()) => Some(polled),
            };

            let command = match polled {
                None => {
                    debug!("Queue interrupted");
                    self.transport.interrupt();
                    return Ok(StopReason::Cancelled);
                }
                Some(Err(_)) => {
                    debug!("No data");
                    self.state = DispatchState::DrainingOnTimeout;
                    continue;
                }
                Some(Ok(None)) => {
                    info!("All producers gone, stopping queue");
                    return Ok(StopReason::QueueClosed);
                }
                Some(Ok(Some(command))) => command,
            };

            self.state = DispatchState::Running;
            self.metrics.inc_commands();
            self.metrics.set_queue_len(self.rx.len());
            observability::record_command(command.name());
            observability::record_queue_depth(self.rx.len());

            if let Some(reason) = self.dispatch(command, cancel).await? {
                return Ok(reason);
            }
        }
    }

    async fn dispatch(
        &mut self,
        command: Command,
        cancel: &CancellationToken,
    ) -> Result<Option<StopReason>, DispatcherError> {
        match command {
            Command::Callback(payload) => self.handle_callback(payload, cancel).await,
            Command::AddGlob(glob) => {
                self.handle_add_glob(glob);
                Ok(None)
            }
            Command::Exit => {
                info!("Exit command received, stopping queue");
                Ok(Some(StopReason::ExitCommand))
            }
        }
    }

    async fn handle_callback(
        &mut self,
        payload: CallbackPayload,
        cancel: &CancellationToken,
    ) -> Result<Option<StopReason>, DispatcherError> {
        self.last_update = Instant::now();

        let CallbackPayload {
            filename,
            lines,
            offset,
            ignore_empty,
            timestamp,
            fields,
        } = payload;

        let lines: Vec<String> = lines
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .filter(|line| !(ignore_empty && line.is_empty()))
            .collect();

        if lines.is_empty() {
            debug!(filename = %filename, "0 active lines sent from worker");
            self.metrics.inc_empty_batches();
            observability::record_empty_batch();
            return Ok(None);
        }

        let batch = Batch {
            filename,
            lines,
            timestamp,
            fields,
        };

        if let Some(reason) = self.deliver_with_retry(&batch, cancel).await {
            return Ok(Some(reason));
        }

        self.metrics.add_delivered(batch.len());
        observability::record_batch_delivered(self.transport.name(), batch.len());

        self.maybe_checkpoint(&batch.filename, offset)?;
        Ok(None)
    }

    /// Deliver until success; only cancellation during a backoff gets out early
    async fn deliver_with_retry(
        &mut self,
        batch: &Batch,
        cancel: &CancellationToken,
    ) -> Option<StopReason> {
        loop {
            let err = match self.transport.deliver(batch).await {
                Ok(()) => return None,
                Err(err) => err,
            };

            let sleep_time = self.backoff.record_failure();
            self.metrics.inc_delivery_failures();
            observability::record_delivery_failure(self.transport.name(), sleep_time);
            info!(
                error = %err,
                failures = self.backoff.failures(),
                sleep_secs = sleep_time.as_secs(),
                "Caught transport error, reconnecting"
            );

            self.transport.invalidate();

            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = sleep(sleep_time) => false,
            };
            if cancelled {
                info!("User cancelled respawn");
                self.transport.interrupt();
                return Some(StopReason::RespawnCancelled);
            }

            if let Err(e) = self.transport.reconnect().await {
                warn!(error = %e, "Reconnect failed");
            }

            let reconnected = self.transport.is_valid();
            observability::record_reconnect(self.transport.name(), reconnected);
            if reconnected {
                self.backoff.reset();
                self.metrics.inc_reconnects();
                info!("Reconnected successfully");
            }
        }
    }

    fn maybe_checkpoint(
        &mut self,
        filename: &str,
        offset: Option<u64>,
    ) -> Result<(), DispatcherError> {
        let Some(offset) = offset else {
            return Ok(());
        };
        if filename.is_empty() {
            return Ok(());
        }

        let now = self.last_update.into_std();
        if !self.throttle.should_checkpoint(filename, now) {
            debug!(filename, offset, "Checkpoint held back by write interval");
            self.pending_checkpoints.insert(filename.to_string(), offset);
            return Ok(());
        }

        self.pending_checkpoints.remove(filename);
        if self.store.update_position(filename, None, offset)? {
            self.metrics.inc_checkpoints();
            observability::record_checkpoint(offset);
            info!(filename, offset, "Wrote checkpoint into sincedb");
        }
        self.throttle.record_checkpoint(filename, now);
        Ok(())
    }

    fn handle_add_glob(&mut self, glob: AddGlob) {
        let added = self.shared.add_glob(&glob.pattern);
        self.transport.add_watch(&glob.pattern, &glob.files);
        debug!(pattern = %glob.pattern, files = glob.files.len(), added, "Registered glob");
    }
}

impl<T: Transport + 'static> Dispatcher<T> {
    /// Spawn the loop as a background task
    pub fn spawn(
        mut self,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<DispatchOutcome, DispatcherError>> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

/// Build the configured transport and a dispatcher around it
///
/// Transport construction errors surface here, before the loop starts.
#[instrument(name = "dispatcher_create", skip_all)]
pub async fn create_dispatcher(
    config: SharedConfig,
    rx: CommandReceiver,
    store: Arc<SincedbStore>,
) -> Result<Dispatcher<AnyTransport>, DispatcherError> {
    let snapshot = config.snapshot();
    let transport = create_transport(&snapshot.transport, &snapshot.hostname).await?;
    Ok(Dispatcher::new(
        transport,
        rx,
        DispatcherConfig::from_config(&snapshot),
        config,
        store,
    ))
}
