//! Transport trait - the capability set every output backend implements
//!
//! Backends never retry internally. A failed delivery flips the transport to
//! invalid and returns a [`TransportError`]; the dispatcher owns the
//! invalidate / backoff / reconnect cycle.

use std::path::PathBuf;

use thiserror::Error;

use crate::Batch;

/// Any failure talking to the active backend
///
/// Backend-specific failure detail is kept as an optional source so the
/// retry logic only ever sees this one kind.
#[derive(Debug, Error)]
#[error("transport '{transport}' error: {message}")]
pub struct TransportError {
    transport: String,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Create a transport error without an underlying cause
    pub fn new(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping an underlying cause
    pub fn with_source(
        transport: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            transport: transport.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Name of the transport that failed
    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// Human readable failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Output backend trait
///
/// All transport implementations must implement this trait.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send a batch of lines to the backend
    ///
    /// # Errors
    /// Returns [`TransportError`] on any delivery failure, after marking the
    /// transport invalid.
    async fn deliver(&mut self, batch: &Batch) -> Result<(), TransportError>;

    /// Cheap synchronous health check
    fn is_valid(&self) -> bool;

    /// Release the current connection without delivering. Idempotent.
    fn invalidate(&mut self);

    /// Establish a fresh connection from configuration
    ///
    /// Sets the transport valid on success.
    async fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Fast, best-effort teardown on operator cancellation
    fn interrupt(&mut self);

    /// A new watch pattern was discovered
    fn add_watch(&mut self, _pattern: &str, _files: &[PathBuf]) {}
}
