//! Pipeline statistics.

use std::time::Duration;

use dispatcher::DispatchOutcome;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Files given on the command line
    pub files: usize,

    /// Lines queued by readers
    pub lines_read: u64,

    /// Callbacks queued by readers
    pub callbacks_sent: u64,

    /// How the dispatcher stopped, with its counters
    pub outcome: DispatchOutcome,
}

impl PipelineStats {
    /// Delivered lines per second
    pub fn lines_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.outcome.metrics.lines_delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let metrics = &self.outcome.metrics;

        println!("\n=== Shipper Statistics ===\n");
        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Stop reason: {:?}", self.outcome.reason);
        println!("   Files: {}", self.files);
        println!("   Lines read: {}", self.lines_read);
        println!("   Callbacks queued: {}", self.callbacks_sent);

        println!("\nDelivery");
        println!("   Batches delivered: {}", metrics.batches_delivered);
        println!("   Lines delivered: {}", metrics.lines_delivered);
        println!("   Lines/s: {:.2}", self.lines_per_sec());
        println!("   Empty batches skipped: {}", metrics.empty_batches);
        println!("   Delivery failures: {}", metrics.delivery_failures);
        println!("   Reconnects: {}", metrics.reconnects);
        println!("   Checkpoints written: {}", metrics.checkpoints);
        println!("   Commands left in queue: {}", metrics.queue_len);

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher::{MetricsSnapshot, StopReason};

    #[test]
    fn test_lines_per_sec() {
        let stats = PipelineStats {
            duration: Duration::from_secs(2),
            files: 1,
            lines_read: 10,
            callbacks_sent: 1,
            outcome: DispatchOutcome {
                reason: StopReason::ExitCommand,
                metrics: MetricsSnapshot {
                    lines_delivered: 10,
                    ..MetricsSnapshot::default()
                },
                pending_checkpoints: Default::default(),
            },
        };
        assert_eq!(stats.lines_per_sec(), 5.0);

        let idle = PipelineStats {
            duration: Duration::ZERO,
            ..stats
        };
        assert_eq!(idle.lines_per_sec(), 0.0);
    }
}
