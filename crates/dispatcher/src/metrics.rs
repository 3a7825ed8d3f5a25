//! Dispatcher metrics for observability

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Commands pulled from the queue
    commands: AtomicU64,
    /// Batches delivered
    batches_delivered: AtomicU64,
    /// Lines delivered
    lines_delivered: AtomicU64,
    /// Callbacks skipped because every line was empty
    empty_batches: AtomicU64,
    /// Failed delivery attempts
    delivery_failures: AtomicU64,
    /// Successful reconnects
    reconnects: AtomicU64,
    /// Checkpoints written to the sincedb
    checkpoints: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn inc_commands(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_delivered(&self, lines: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.lines_delivered
            .fetch_add(lines as u64, Ordering::Relaxed);
    }

    pub fn inc_empty_batches(&self) {
        self.empty_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_delivery_failures(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_checkpoints(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            lines_delivered: self.lines_delivered.load(Ordering::Relaxed),
            empty_batches: self.empty_batches.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub commands: u64,
    pub batches_delivered: u64,
    pub lines_delivered: u64,
    pub empty_batches: u64,
    pub delivery_failures: u64,
    pub reconnects: u64,
    pub checkpoints: u64,
}
