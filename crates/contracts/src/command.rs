//! Command envelope - the queue protocol between watchers and the dispatcher
//!
//! Every command is consumed exactly once; commands are never re-queued.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Free-form metadata forwarded verbatim to the transport
pub type Fields = Map<String, Value>;

/// Queue item produced by file watchers and the config layer
#[derive(Debug, Clone)]
pub enum Command {
    /// Deliver a batch of harvested lines
    Callback(CallbackPayload),
    /// A new watch pattern was discovered
    AddGlob(AddGlob),
    /// Stop the dispatcher
    Exit,
}

impl Command {
    /// Command name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Callback(_) => "callback",
            Self::AddGlob(_) => "addglob",
            Self::Exit => "exit",
        }
    }
}

/// Payload of a `callback` command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackPayload {
    /// Source file path (advisory)
    pub filename: String,

    /// Raw lines in read order, not yet guaranteed to be valid text
    pub lines: Vec<Bytes>,

    /// Read position after the last line; governs checkpointing
    #[serde(default)]
    pub offset: Option<u64>,

    /// Drop lines that decode to empty text
    #[serde(default)]
    pub ignore_empty: bool,

    /// Harvest time, defaults to delivery time when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Extra metadata forwarded to the transport
    #[serde(default)]
    pub fields: Fields,
}

impl CallbackPayload {
    /// Create a payload for `filename` with the given raw lines
    pub fn new<I, L>(filename: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Bytes>,
    {
        Self {
            filename: filename.into(),
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Attach a read offset
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the ignore-empty flag
    pub fn with_ignore_empty(mut self, ignore_empty: bool) -> Self {
        self.ignore_empty = ignore_empty;
        self
    }

    /// Attach an extra metadata field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Payload of an `addglob` command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddGlob {
    /// The glob pattern being watched
    pub pattern: String,
    /// Files the pattern currently resolves to
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Lines ready for delivery, after decoding and filtering
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub filename: String,
    pub lines: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Fields,
}

impl Batch {
    /// Number of lines in the batch
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the batch has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
