//! FileTransport - appends formatted events to a local file

use std::collections::HashMap;
use std::path::PathBuf;

use contracts::{Batch, Transport, TransportError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use super::format::EventFormatter;

/// Configuration for FileTransport
#[derive(Debug, Clone)]
pub struct FileTransportConfig {
    /// Output file, created if missing
    pub path: PathBuf,
}

impl FileTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        Ok(Self {
            path: PathBuf::from(path),
        })
    }
}

/// Transport that appends one event per line to a file
pub struct FileTransport {
    name: String,
    config: FileTransportConfig,
    formatter: EventFormatter,
    file: Option<File>,
}

impl FileTransport {
    /// Create a new FileTransport, opening the output file
    pub async fn new(
        name: impl Into<String>,
        config: FileTransportConfig,
        formatter: EventFormatter,
    ) -> std::io::Result<Self> {
        let file = open_append(&config).await?;
        Ok(Self {
            name: name.into(),
            config,
            formatter,
            file: Some(file),
        })
    }

    /// Output path
    pub fn path(&self) -> &PathBuf {
        &self.config.path
    }
}

async fn open_append(config: &FileTransportConfig) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.path)
        .await
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_transport_deliver",
        skip(self, batch),
        fields(transport = %self.name, lines = batch.len())
    )]
    async fn deliver(&mut self, batch: &Batch) -> Result<(), TransportError> {
        let Some(file) = self.file.as_mut() else {
            return Err(TransportError::new(&self.name, "file not open"));
        };

        let mut buf = String::new();
        for event in self.formatter.format_batch(batch) {
            buf.push_str(&event);
            buf.push('\n');
        }

        let written = match file.write_all(buf.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            self.file = None;
            TransportError::with_source(&self.name, "file write failed", e)
        })
    }

    fn is_valid(&self) -> bool {
        self.file.is_some()
    }

    fn invalidate(&mut self) {
        self.file = None;
    }

    #[instrument(name = "file_transport_reconnect", skip(self), fields(transport = %self.name))]
    async fn reconnect(&mut self) -> Result<(), TransportError> {
        let file = open_append(&self.config).await.map_err(|e| {
            TransportError::with_source(
                &self.name,
                format!("cannot open '{}'", self.config.path.display()),
                e,
            )
        })?;
        self.file = Some(file);
        debug!(transport = %self.name, path = %self.config.path.display(), "File reopened");
        Ok(())
    }

    fn interrupt(&mut self) {
        self.file = None;
    }
}
