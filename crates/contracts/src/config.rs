//! ShipperConfig - Config Loader output
//!
//! Describes the full agent configuration: transport selection, queue and
//! respawn tuning, checkpoint store and per-file settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::Fields;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipperConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Host name stamped on every event
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Active transport
    #[serde(default)]
    pub transport: TransportConfig,

    /// Command queue tuning
    #[serde(default)]
    pub queue: QueueConfig,

    /// Reconnect backoff tuning
    #[serde(default)]
    pub respawn: RespawnConfig,

    /// Checkpoint store
    #[serde(default)]
    pub sincedb: SincedbConfig,

    /// Per-file sections, first matching pattern wins
    #[serde(default)]
    pub files: Vec<FileConfig>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            version: ConfigVersion::default(),
            hostname: default_hostname(),
            transport: TransportConfig::default(),
            queue: QueueConfig::default(),
            respawn: RespawnConfig::default(),
            sincedb: SincedbConfig::default(),
            files: Vec::new(),
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Transport selection and backend-specific parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport type
    #[serde(default)]
    pub kind: TransportKind,

    /// Event format
    #[serde(default)]
    pub format: EventFormat,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Stdout,
            format: EventFormat::Json,
            params: HashMap::new(),
        }
    }
}

/// Transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Standard output
    #[default]
    Stdout,
    /// Append to a local file
    File,
    /// Newline-delimited events over TCP
    Tcp,
}

impl TransportKind {
    /// Configuration name of the transport
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::File => "file",
            Self::Tcp => "tcp",
        }
    }
}

/// How a line is rendered before it reaches the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFormat {
    /// JSON object with timestamp, host, file, message and extra fields
    #[default]
    Json,
    /// The line unchanged
    Raw,
    /// `[timestamp] file: line`
    String,
}

/// Command queue tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued commands before producers block
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Idle time after the last callback before the dispatcher stops
    #[serde(default = "default_queue_timeout")]
    pub queue_timeout_secs: u64,

    /// Single queue poll timeout
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
}

impl QueueConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            queue_timeout_secs: default_queue_timeout(),
            wait_timeout_secs: default_wait_timeout(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_queue_timeout() -> u64 {
    60
}

fn default_wait_timeout() -> u64 {
    5
}

/// Reconnect backoff tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespawnConfig {
    /// Base of the exponential backoff, in seconds
    #[serde(default = "default_respawn_delay")]
    pub delay: u64,

    /// Clamp for the consecutive failure counter
    #[serde(default = "default_max_failure")]
    pub max_failure: u32,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            delay: default_respawn_delay(),
            max_failure: default_max_failure(),
        }
    }
}

fn default_respawn_delay() -> u64 {
    3
}

fn default_max_failure() -> u32 {
    7
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SincedbConfig {
    /// SQLite file; `None` disables checkpointing
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Default minimum time between checkpoint writes for one file
    #[serde(default = "default_write_interval")]
    pub write_interval_secs: u64,
}

impl Default for SincedbConfig {
    fn default() -> Self {
        Self {
            path: None,
            write_interval_secs: default_write_interval(),
        }
    }
}

fn default_write_interval() -> u64 {
    15
}

/// Per-file settings, matched by glob against the filename
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Glob pattern (e.g. "/var/log/nginx/*.log")
    pub pattern: String,

    /// Override of `sincedb.write_interval_secs`
    #[serde(default)]
    pub sincedb_write_interval_secs: Option<u64>,

    /// Drop lines that decode to empty text
    #[serde(default)]
    pub ignore_empty: bool,

    /// Extra metadata forwarded with every line
    #[serde(default)]
    pub fields: Fields,
}

impl FileConfig {
    /// Whether this section applies to `filename`
    pub fn matches(&self, filename: &str) -> bool {
        self.pattern == filename
            || glob::Pattern::new(&self.pattern).is_ok_and(|p| p.matches(filename))
    }
}

impl ShipperConfig {
    /// First per-file section matching `filename`
    pub fn file_config(&self, filename: &str) -> Option<&FileConfig> {
        self.files.iter().find(|file| file.matches(filename))
    }

    /// Checkpoint write interval for `filename`
    pub fn sincedb_write_interval(&self, filename: &str) -> Duration {
        let secs = self
            .file_config(filename)
            .and_then(|file| file.sincedb_write_interval_secs)
            .unwrap_or(self.sincedb.write_interval_secs);
        Duration::from_secs(secs)
    }

    /// Register a newly discovered watch pattern
    ///
    /// Returns false when a section for the pattern already exists.
    pub fn add_glob(&mut self, pattern: &str) -> bool {
        if self.files.iter().any(|file| file.pattern == pattern) {
            return false;
        }
        self.files.push(FileConfig {
            pattern: pattern.to_string(),
            ..FileConfig::default()
        });
        true
    }
}

/// Cheaply cloneable handle to the live configuration
///
/// Shared between the dispatcher and producers; `addglob` mutates it.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<ShipperConfig>>);

impl SharedConfig {
    /// Wrap a loaded configuration
    pub fn new(config: ShipperConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Clone of the current configuration
    pub fn snapshot(&self) -> ShipperConfig {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Checkpoint write interval for `filename`
    pub fn sincedb_write_interval(&self, filename: &str) -> Duration {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sincedb_write_interval(filename)
    }

    /// Per-file section matching `filename`, if any
    pub fn file_config(&self, filename: &str) -> Option<FileConfig> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .file_config(filename)
            .cloned()
    }

    /// Register a newly discovered watch pattern
    pub fn add_glob(&self, pattern: &str) -> bool {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_glob(pattern)
    }
}

impl From<ShipperConfig> for SharedConfig {
    fn from(config: ShipperConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ShipperConfig {
        ShipperConfig {
            sincedb: SincedbConfig {
                path: None,
                write_interval_secs: 15,
            },
            files: vec![
                FileConfig {
                    pattern: "/var/log/nginx/*.log".into(),
                    sincedb_write_interval_secs: Some(5),
                    ..FileConfig::default()
                },
                FileConfig {
                    pattern: "/var/log/*.log".into(),
                    ..FileConfig::default()
                },
            ],
            ..ShipperConfig::default()
        }
    }

    #[test]
    fn write_interval_uses_first_matching_section() {
        let config = sample_config();
        assert_eq!(
            config.sincedb_write_interval("/var/log/nginx/access.log"),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.sincedb_write_interval("/var/log/syslog.log"),
            Duration::from_secs(15)
        );
        assert_eq!(
            config.sincedb_write_interval("/tmp/other"),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn add_glob_is_idempotent() {
        let shared = SharedConfig::new(sample_config());
        assert!(shared.add_glob("/srv/app/*.log"));
        assert!(!shared.add_glob("/srv/app/*.log"));
        assert!(shared.file_config("/srv/app/a.log").is_some());
        assert_eq!(shared.snapshot().files.len(), 3);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config: ShipperConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.queue.queue_timeout(), Duration::from_secs(60));
        assert_eq!(config.queue.wait_timeout(), Duration::from_secs(5));
        assert_eq!(config.respawn.delay, 3);
        assert_eq!(config.respawn.max_failure, 7);
        assert_eq!(config.sincedb.write_interval_secs, 15);
        assert_eq!(config.transport.kind, TransportKind::Stdout);
        assert!(config.sincedb.path.is_none());
    }
}
