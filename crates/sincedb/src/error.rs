//! Sincedb error types

use std::path::PathBuf;

use thiserror::Error;

/// Checkpoint store errors
///
/// Always fatal to the calling operation: a store that cannot be written is
/// a configuration problem, not a transient one.
#[derive(Debug, Error)]
pub enum SincedbError {
    /// SQLite open/query failure
    #[error("sincedb '{path}' error: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Could not stat the live file to derive its identity
    #[error("cannot identify '{filename}': {source}")]
    Identity {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// Position does not fit the store's integer column
    #[error("position {position} out of range for '{filename}'")]
    PositionOutOfRange { filename: String, position: u64 },

    /// Stored position is negative (corrupt row)
    #[error("corrupt position {position} stored for identity '{identity}'")]
    CorruptPosition { identity: String, position: i64 },
}

impl SincedbError {
    pub(crate) fn sqlite(path: impl Into<PathBuf>, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn identity(filename: impl Into<String>, source: std::io::Error) -> Self {
        Self::Identity {
            filename: filename.into(),
            source,
        }
    }
}
