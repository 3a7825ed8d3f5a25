//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A command needs the sincedb but none is configured
    #[error("Checkpointing is disabled: no sincedb.path in {config}")]
    SincedbDisabled { config: String },

    /// A log file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Reader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dispatcher task died
    #[error("Dispatcher task failed: {message}")]
    Dispatcher { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn sincedb_disabled(config: impl Into<String>) -> Self {
        Self::SincedbDisabled {
            config: config.into(),
        }
    }

    pub fn reader(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Reader {
            path: path.into(),
            source,
        }
    }

    pub fn dispatcher(message: impl Into<String>) -> Self {
        Self::Dispatcher {
            message: message.into(),
        }
    }
}
