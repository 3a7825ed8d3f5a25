//! TcpTransport - newline-delimited events over a TCP connection

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use contracts::{Batch, Transport, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::format::EventFormatter;

/// Configuration for TcpTransport
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Timeout for writing one batch
    pub write_timeout: Duration,
}

impl TcpTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        Ok(Self {
            addr,
            connect_timeout: millis_param(params, "connect_timeout_ms", 5_000)?,
            write_timeout: millis_param(params, "write_timeout_ms", 10_000)?,
        })
    }
}

fn millis_param(
    params: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, String> {
    match params.get(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .parse()
            .map(Duration::from_millis)
            .map_err(|e| format!("invalid '{}' value '{}': {}", key, raw, e)),
    }
}

/// Transport that streams events to a TCP endpoint
pub struct TcpTransport {
    name: String,
    config: TcpTransportConfig,
    formatter: EventFormatter,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create a new TcpTransport and connect
    #[instrument(name = "tcp_transport_new", skip(name, config, formatter), fields(addr = %config.addr))]
    pub async fn new(
        name: impl Into<String>,
        config: TcpTransportConfig,
        formatter: EventFormatter,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let stream = connect(&config).await?;
        info!(transport = %name, target = %config.addr, "TcpTransport connected");

        Ok(Self {
            name,
            config,
            formatter,
            stream: Some(stream),
        })
    }

    fn fail(&mut self, message: &str, source: std::io::Error) -> TransportError {
        self.stream = None;
        TransportError::with_source(&self.name, message, source)
    }
}

async fn connect(config: &TcpTransportConfig) -> std::io::Result<TcpStream> {
    let stream = timeout(config.connect_timeout, TcpStream::connect(config.addr))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl Transport for TcpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "tcp_transport_deliver",
        skip(self, batch),
        fields(transport = %self.name, lines = batch.len())
    )]
    async fn deliver(&mut self, batch: &Batch) -> Result<(), TransportError> {
        let mut buf = String::new();
        for event in self.formatter.format_batch(batch) {
            buf.push_str(&event);
            buf.push('\n');
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::new(&self.name, "not connected"));
        };

        let written = timeout(self.config.write_timeout, stream.write_all(buf.as_bytes())).await;
        match written {
            Ok(Ok(())) => {
                debug!(transport = %self.name, bytes = buf.len(), "Sent");
                Ok(())
            }
            Ok(Err(e)) => Err(self.fail("connection appears to have been lost", e)),
            Err(_) => Err(self.fail(
                "write timed out",
                std::io::Error::new(std::io::ErrorKind::TimedOut, "write timed out"),
            )),
        }
    }

    fn is_valid(&self) -> bool {
        self.stream.is_some()
    }

    fn invalidate(&mut self) {
        self.stream = None;
    }

    #[instrument(name = "tcp_transport_reconnect", skip(self), fields(transport = %self.name))]
    async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.stream = None;
        match connect(&self.config).await {
            Ok(stream) => {
                self.stream = Some(stream);
                info!(transport = %self.name, target = %self.config.addr, "Connected");
                Ok(())
            }
            Err(e) => {
                warn!(transport = %self.name, target = %self.config.addr, error = %e, "Connect failed");
                Err(TransportError::with_source(&self.name, "connect failed", e))
            }
        }
    }

    fn interrupt(&mut self) {
        self.stream = None;
    }

    fn add_watch(&mut self, pattern: &str, files: &[PathBuf]) {
        debug!(transport = %self.name, pattern, files = files.len(), "New watch registered");
    }
}
