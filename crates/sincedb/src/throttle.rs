//! CheckpointThrottle - decides when a file may be checkpointed again
//!
//! Delivering every batch is cheap, writing the store on every batch is not.
//! The throttle bounds store writes to one per write interval per file, which
//! also bounds replay after a crash to roughly one interval of lines.
//! State lives only for the process lifetime.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use contracts::SharedConfig;

/// Source of the per-file checkpoint write interval
pub trait WriteIntervalSource: Send {
    fn write_interval(&self, filename: &str) -> Duration;
}

impl WriteIntervalSource for SharedConfig {
    fn write_interval(&self, filename: &str) -> Duration {
        self.sincedb_write_interval(filename)
    }
}

impl WriteIntervalSource for Duration {
    fn write_interval(&self, _filename: &str) -> Duration {
        *self
    }
}

#[derive(Debug, Clone, Copy)]
struct ThrottleEntry {
    last_checkpoint: Instant,
    interval: Duration,
}

/// Per-filename checkpoint rate limiter
pub struct CheckpointThrottle {
    entries: HashMap<String, ThrottleEntry>,
    intervals: Box<dyn WriteIntervalSource>,
}

impl CheckpointThrottle {
    /// Create a throttle that looks intervals up from `intervals`
    pub fn new(intervals: impl WriteIntervalSource + 'static) -> Self {
        Self {
            entries: HashMap::new(),
            intervals: Box::new(intervals),
        }
    }

    /// Whether a checkpoint for `filename` is due at `now`
    ///
    /// Always true the first time a filename is seen; that call bootstraps
    /// the entry with `now` and the configured interval.
    pub fn should_checkpoint(&mut self, filename: &str, now: Instant) -> bool {
        match self.entries.get(filename) {
            None => {
                let interval = self.intervals.write_interval(filename);
                self.entries.insert(
                    filename.to_string(),
                    ThrottleEntry {
                        last_checkpoint: now,
                        interval,
                    },
                );
                true
            }
            Some(entry) => now.saturating_duration_since(entry.last_checkpoint) > entry.interval,
        }
    }

    /// Record that a checkpoint for `filename` was written at `now`
    ///
    /// No-op for filenames the throttle was never asked about.
    pub fn record_checkpoint(&mut self, filename: &str, now: Instant) {
        if let Some(entry) = self.entries.get_mut(filename) {
            entry.last_checkpoint = now;
        }
    }

    /// Number of tracked files
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for CheckpointThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointThrottle")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FileConfig, ShipperConfig};

    #[test]
    fn test_first_call_true_then_throttled() {
        let mut throttle = CheckpointThrottle::new(Duration::from_secs(15));
        let now = Instant::now();

        assert!(throttle.should_checkpoint("a.log", now));
        assert!(!throttle.should_checkpoint("a.log", now));
        assert!(throttle.should_checkpoint("b.log", now));
        assert_eq!(throttle.tracked(), 2);
    }

    #[test]
    fn test_due_only_after_interval_elapsed() {
        let mut throttle = CheckpointThrottle::new(Duration::from_secs(10));
        let start = Instant::now();

        assert!(throttle.should_checkpoint("a.log", start));
        throttle.record_checkpoint("a.log", start);

        assert!(!throttle.should_checkpoint("a.log", start + Duration::from_secs(10)));
        assert!(throttle.should_checkpoint("a.log", start + Duration::from_secs(11)));

        throttle.record_checkpoint("a.log", start + Duration::from_secs(11));
        assert!(!throttle.should_checkpoint("a.log", start + Duration::from_secs(12)));
    }

    #[test]
    fn test_record_unknown_filename_is_noop() {
        let mut throttle = CheckpointThrottle::new(Duration::from_secs(1));
        throttle.record_checkpoint("never-seen.log", Instant::now());
        assert_eq!(throttle.tracked(), 0);
        assert!(throttle.should_checkpoint("never-seen.log", Instant::now()));
    }

    #[test]
    fn test_interval_looked_up_per_file() {
        let config = ShipperConfig {
            files: vec![FileConfig {
                pattern: "/var/log/fast/*.log".into(),
                sincedb_write_interval_secs: Some(1),
                ..FileConfig::default()
            }],
            ..ShipperConfig::default()
        };
        let mut throttle = CheckpointThrottle::new(SharedConfig::new(config));
        let start = Instant::now();
        let later = start + Duration::from_secs(2);

        assert!(throttle.should_checkpoint("/var/log/fast/a.log", start));
        assert!(throttle.should_checkpoint("/var/log/slow.log", start));

        assert!(throttle.should_checkpoint("/var/log/fast/a.log", later));
        assert!(!throttle.should_checkpoint("/var/log/slow.log", later));
    }
}
