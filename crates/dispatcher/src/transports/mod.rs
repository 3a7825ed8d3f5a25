//! Transport implementations
//!
//! - StdoutTransport: print events on standard output
//! - FileTransport: append events to a local file
//! - TcpTransport: stream newline-delimited events to a TCP endpoint

mod file;
mod format;
mod stdout;
mod tcp;

use std::path::PathBuf;

use contracts::{Batch, Transport, TransportConfig, TransportError, TransportKind};
use tracing::instrument;

use crate::error::DispatcherError;

pub use file::{FileTransport, FileTransportConfig};
pub use format::EventFormatter;
pub use stdout::StdoutTransport;
pub use tcp::{TcpTransport, TcpTransportConfig};

/// Any configured transport
///
/// `Transport` uses `async fn` and cannot be boxed, so the configured
/// backend is picked through this enum.
pub enum AnyTransport {
    Stdout(StdoutTransport),
    File(FileTransport),
    Tcp(TcpTransport),
}

impl Transport for AnyTransport {
    fn name(&self) -> &str {
        match self {
            Self::Stdout(t) => t.name(),
            Self::File(t) => t.name(),
            Self::Tcp(t) => t.name(),
        }
    }

    async fn deliver(&mut self, batch: &Batch) -> Result<(), TransportError> {
        match self {
            Self::Stdout(t) => t.deliver(batch).await,
            Self::File(t) => t.deliver(batch).await,
            Self::Tcp(t) => t.deliver(batch).await,
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            Self::Stdout(t) => t.is_valid(),
            Self::File(t) => t.is_valid(),
            Self::Tcp(t) => t.is_valid(),
        }
    }

    fn invalidate(&mut self) {
        match self {
            Self::Stdout(t) => t.invalidate(),
            Self::File(t) => t.invalidate(),
            Self::Tcp(t) => t.invalidate(),
        }
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Stdout(t) => t.reconnect().await,
            Self::File(t) => t.reconnect().await,
            Self::Tcp(t) => t.reconnect().await,
        }
    }

    fn interrupt(&mut self) {
        match self {
            Self::Stdout(t) => t.interrupt(),
            Self::File(t) => t.interrupt(),
            Self::Tcp(t) => t.interrupt(),
        }
    }

    fn add_watch(&mut self, pattern: &str, files: &[PathBuf]) {
        match self {
            Self::Stdout(t) => t.add_watch(pattern, files),
            Self::File(t) => t.add_watch(pattern, files),
            Self::Tcp(t) => t.add_watch(pattern, files),
        }
    }
}

/// Create the configured transport
#[instrument(
    name = "dispatcher_create_transport",
    skip(config),
    fields(transport = config.kind.as_str(), format = ?config.format)
)]
pub async fn create_transport(
    config: &TransportConfig,
    hostname: &str,
) -> Result<AnyTransport, DispatcherError> {
    let name = config.kind.as_str();
    let formatter = EventFormatter::new(config.format, hostname);

    match config.kind {
        TransportKind::Stdout => Ok(AnyTransport::Stdout(StdoutTransport::new(name, formatter))),
        TransportKind::File => {
            let file_config = FileTransportConfig::from_params(&config.params)
                .map_err(|e| DispatcherError::transport_creation(name, e))?;
            let transport = FileTransport::new(name, file_config, formatter)
                .await
                .map_err(|e| DispatcherError::transport_creation(name, e.to_string()))?;
            Ok(AnyTransport::File(transport))
        }
        TransportKind::Tcp => {
            let tcp_config = TcpTransportConfig::from_params(&config.params)
                .map_err(|e| DispatcherError::transport_creation(name, e))?;
            let transport = TcpTransport::new(name, tcp_config, formatter)
                .await
                .map_err(|e| DispatcherError::transport_creation(name, e.to_string()))?;
            Ok(AnyTransport::Tcp(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_stdout_transport() {
        let transport = create_transport(&TransportConfig::default(), "host")
            .await
            .unwrap();
        assert!(matches!(transport, AnyTransport::Stdout(_)));
        assert_eq!(transport.name(), "stdout");
        assert!(transport.is_valid());
    }

    #[tokio::test]
    async fn test_create_file_transport() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.log");
        let config = TransportConfig {
            kind: TransportKind::File,
            params: HashMap::from([("path".to_string(), path.display().to_string())]),
            ..TransportConfig::default()
        };

        let mut transport = create_transport(&config, "host").await.unwrap();
        assert_eq!(transport.name(), "file");
        transport.invalidate();
        assert!(!transport.is_valid());
        transport.reconnect().await.unwrap();
        assert!(transport.is_valid());
    }

    #[tokio::test]
    async fn test_create_file_transport_missing_path() {
        let config = TransportConfig {
            kind: TransportKind::File,
            ..TransportConfig::default()
        };
        let err = create_transport(&config, "host").await.err().unwrap();
        assert!(matches!(err, DispatcherError::TransportCreation { .. }));
    }

    #[tokio::test]
    async fn test_create_tcp_transport_bad_address() {
        let config = TransportConfig {
            kind: TransportKind::Tcp,
            params: HashMap::from([("addr".to_string(), "not-an-address".to_string())]),
            ..TransportConfig::default()
        };
        let err = create_transport(&config, "host").await.err().unwrap();
        assert!(err.to_string().contains("tcp"));
    }
}
