//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Transport construction error
    #[error("failed to create transport '{name}': {message}")]
    TransportCreation { name: String, message: String },

    /// Every receiver is gone, the command could not be queued
    #[error("command queue closed, '{command}' not queued")]
    QueueClosed { command: &'static str },

    /// Checkpoint store failure (fatal for the delivery cycle)
    #[error("sincedb error: {0}")]
    Sincedb(#[from] sincedb::SincedbError),

    /// Contract error
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a transport creation error
    pub fn transport_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
