//! StdoutTransport - writes formatted events to standard output

use contracts::{Batch, Transport, TransportError};
use tokio::io::{AsyncWriteExt, Stdout};
use tracing::{debug, instrument};

use super::format::EventFormatter;

/// Transport that prints one event per line on stdout
pub struct StdoutTransport {
    name: String,
    formatter: EventFormatter,
    stdout: Stdout,
    valid: bool,
}

impl StdoutTransport {
    /// Create a new StdoutTransport
    pub fn new(name: impl Into<String>, formatter: EventFormatter) -> Self {
        Self {
            name: name.into(),
            formatter,
            stdout: tokio::io::stdout(),
            valid: true,
        }
    }

    async fn write_events(&mut self, events: Vec<String>) -> std::io::Result<()> {
        let mut buf = String::with_capacity(events.iter().map(|e| e.len() + 1).sum());
        for event in events {
            buf.push_str(&event);
            buf.push('\n');
        }
        self.stdout.write_all(buf.as_bytes()).await?;
        self.stdout.flush().await
    }
}

impl Transport for StdoutTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "stdout_transport_deliver",
        skip(self, batch),
        fields(transport = %self.name, lines = batch.len())
    )]
    async fn deliver(&mut self, batch: &Batch) -> Result<(), TransportError> {
        let events = self.formatter.format_batch(batch);
        self.write_events(events).await.map_err(|e| {
            self.valid = false;
            TransportError::with_source(&self.name, "stdout write failed", e)
        })
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.stdout = tokio::io::stdout();
        self.valid = true;
        debug!(transport = %self.name, "Stdout reattached");
        Ok(())
    }

    fn interrupt(&mut self) {
        self.valid = false;
    }
}
