//! SincedbStore - durable file identity -> read position mapping
//!
//! One SQLite file, one table:
//! `sincedb(identity TEXT PRIMARY KEY, filename TEXT, position INTEGER DEFAULT 1)`.
//! A connection is opened per operation and closed before returning, so
//! every successful write is on disk when the call returns.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::FileIdentity;
use rusqlite::{named_params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::SincedbError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sincedb (
    identity TEXT PRIMARY KEY,
    filename TEXT,
    position INTEGER DEFAULT 1
)";

/// A stored checkpoint row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Rendered [`FileIdentity`]
    pub identity: String,
    /// Last seen path (advisory)
    pub filename: String,
    /// Resume offset
    pub position: u64,
}

/// Checkpoint store
///
/// Built without a path, every operation is a silent no-op: `update_position`
/// returns `false` and `start_position` returns `None` without touching the
/// filesystem.
#[derive(Debug, Default)]
pub struct SincedbStore {
    path: Option<PathBuf>,
    schema_ready: AtomicBool,
}

impl SincedbStore {
    /// Create a store backed by `path`, or a disabled one for `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            schema_ready: AtomicBool::new(false),
        }
    }

    /// Create a store with checkpointing disabled
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Whether checkpointing is enabled
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create the sincedb table if needed. Idempotent.
    pub fn ensure_schema(&self) -> Result<(), SincedbError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if !path.exists() {
            debug!(path = %path.display(), "Initializing sincedb schema");
        }
        let conn = open(path)?;
        conn.execute(CREATE_TABLE, [])
            .map_err(|e| SincedbError::sqlite(path, e))?;
        self.schema_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Upsert the resume position for a file
    ///
    /// When `identity` is `None` it is derived from the live file at
    /// `filename`. Returns whether a write occurred (false only when
    /// checkpointing is disabled).
    pub fn update_position(
        &self,
        filename: &str,
        identity: Option<FileIdentity>,
        position: u64,
    ) -> Result<bool, SincedbError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };

        let identity = match identity {
            Some(identity) => identity,
            None => FileIdentity::from_path(filename)
                .map_err(|e| SincedbError::identity(filename, e))?,
        };
        let stored = i64::try_from(position).map_err(|_| SincedbError::PositionOutOfRange {
            filename: filename.to_string(),
            position,
        })?;

        self.ensure_schema()?;

        let mut conn = open(path)?;
        let tx = conn
            .transaction()
            .map_err(|e| SincedbError::sqlite(path, e))?;
        tx.execute(
            "INSERT OR IGNORE INTO sincedb (identity, filename) VALUES (:identity, :filename)",
            named_params! { ":identity": identity.to_string(), ":filename": filename },
        )
        .map_err(|e| SincedbError::sqlite(path, e))?;
        tx.execute(
            "UPDATE sincedb SET filename = :filename, position = :position WHERE identity = :identity",
            named_params! {
                ":identity": identity.to_string(),
                ":filename": filename,
                ":position": stored,
            },
        )
        .map_err(|e| SincedbError::sqlite(path, e))?;
        tx.commit().map_err(|e| SincedbError::sqlite(path, e))?;

        debug!(%identity, filename, position, "Updated sincedb position");
        Ok(true)
    }

    /// Stored resume position for an open file
    ///
    /// Returns `None` when the file was never checkpointed, so callers can
    /// tell "never seen" from "seen at offset 0".
    pub fn start_position(
        &self,
        file: &File,
        identity: Option<FileIdentity>,
    ) -> Result<Option<u64>, SincedbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let identity = match identity {
            Some(identity) => identity,
            None => FileIdentity::from_file(file)
                .map_err(|e| SincedbError::identity("<open file>", e))?,
        };
        self.position_for(identity)
    }

    /// Stored resume position for the live file at `path`
    pub fn start_position_for_path(&self, path: &Path) -> Result<Option<u64>, SincedbError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let identity = FileIdentity::from_path(path)
            .map_err(|e| SincedbError::identity(path.display().to_string(), e))?;
        self.position_for(identity)
    }

    /// Stored resume position for an identity
    pub fn position_for(&self, identity: FileIdentity) -> Result<Option<u64>, SincedbError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };
        self.ensure_schema()?;

        let key = identity.to_string();
        let conn = open(path)?;
        let stored: Option<i64> = conn
            .query_row(
                "SELECT position FROM sincedb WHERE identity = :identity",
                named_params! { ":identity": key },
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SincedbError::sqlite(path, e))?;

        debug!(identity = %key, position = ?stored, "Read sincedb start position");

        stored
            .map(|position| {
                u64::try_from(position).map_err(|_| SincedbError::CorruptPosition {
                    identity: key.clone(),
                    position,
                })
            })
            .transpose()
    }

    /// All stored checkpoint rows, ordered by filename
    pub fn records(&self) -> Result<Vec<CheckpointRecord>, SincedbError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };
        self.ensure_schema()?;

        let conn = open(path)?;
        let mut stmt = conn
            .prepare("SELECT identity, filename, position FROM sincedb ORDER BY filename")
            .map_err(|e| SincedbError::sqlite(path, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(|e| SincedbError::sqlite(path, e))?;

        let mut records = Vec::new();
        for row in rows {
            let (identity, filename, position) = row.map_err(|e| SincedbError::sqlite(path, e))?;
            let position = u64::try_from(position).map_err(|_| SincedbError::CorruptPosition {
                identity: identity.clone(),
                position,
            })?;
            records.push(CheckpointRecord {
                identity,
                filename: filename.unwrap_or_default(),
                position,
            });
        }
        Ok(records)
    }
}

fn open(path: &Path) -> Result<Connection, SincedbError> {
    Connection::open(path).map_err(|e| SincedbError::sqlite(path, e))
}
