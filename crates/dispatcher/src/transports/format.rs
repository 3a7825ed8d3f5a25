//! Event formatting shared by all transports

use chrono::{DateTime, SecondsFormat, Utc};
use contracts::{Batch, EventFormat};
use serde_json::{Map, Value};

/// Renders one line of a batch into the wire text for a backend
#[derive(Debug, Clone)]
pub struct EventFormatter {
    format: EventFormat,
    hostname: String,
}

impl EventFormatter {
    /// Create a formatter
    pub fn new(format: EventFormat, hostname: impl Into<String>) -> Self {
        Self {
            format,
            hostname: hostname.into(),
        }
    }

    /// Render every line of `batch`, in order
    pub fn format_batch(&self, batch: &Batch) -> Vec<String> {
        let timestamp = batch.timestamp.unwrap_or_else(Utc::now);
        batch
            .lines
            .iter()
            .map(|line| self.format_line(batch, line, timestamp))
            .collect()
    }

    fn format_line(&self, batch: &Batch, line: &str, timestamp: DateTime<Utc>) -> String {
        let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self.format {
            EventFormat::Raw => line.to_string(),
            EventFormat::String => format!("[{stamp}] {}: {line}", batch.filename),
            EventFormat::Json => {
                let mut event = Map::with_capacity(batch.fields.len() + 4);
                event.insert("@timestamp".into(), Value::String(stamp));
                event.insert("host".into(), Value::String(self.hostname.clone()));
                event.insert("file".into(), Value::String(batch.filename.clone()));
                event.insert("message".into(), Value::String(line.to_string()));
                // caller fields never override the core event keys
                for (key, value) in &batch.fields {
                    event.entry(key.clone()).or_insert_with(|| value.clone());
                }
                Value::Object(event).to_string()
            }
        }
    }
}
