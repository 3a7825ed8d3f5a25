//! One-shot line readers feeding the command queue.
//!
//! Each reader runs on a plain thread and blocks on the bounded queue when
//! the dispatcher falls behind.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{CallbackPayload, Command, Fields, SharedConfig};
use dispatcher::CommandSender;
use sincedb::SincedbStore;
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Counters shared by all readers
#[derive(Debug, Default)]
pub struct ReadCounters {
    pub lines_read: AtomicU64,
    pub callbacks_sent: AtomicU64,
}

/// Per-source reading settings
#[derive(Debug, Clone, Default)]
struct SourceSettings {
    ignore_empty: bool,
    fields: Fields,
}

impl SourceSettings {
    fn lookup(shared: &SharedConfig, filename: &str) -> Self {
        shared
            .file_config(filename)
            .map(|file| Self {
                ignore_empty: file.ignore_empty,
                fields: file.fields,
            })
            .unwrap_or_default()
    }
}

/// Reads sources to EOF and queues their lines as callbacks
#[derive(Clone)]
pub struct LineReader {
    tx: CommandSender,
    shared: SharedConfig,
    store: Arc<SincedbStore>,
    batch_lines: usize,
    counters: Arc<ReadCounters>,
}

impl LineReader {
    pub fn new(
        tx: CommandSender,
        shared: SharedConfig,
        store: Arc<SincedbStore>,
        batch_lines: usize,
        counters: Arc<ReadCounters>,
    ) -> Self {
        Self {
            tx,
            shared,
            store,
            batch_lines,
            counters,
        }
    }

    /// Ship `path` from its stored start position
    pub fn read_file(&self, path: &Path) -> Result<(), CliError> {
        let mut file = File::open(path).map_err(|e| CliError::reader(path, e))?;
        let len = file.metadata().map_err(|e| CliError::reader(path, e))?.len();

        let stored = match self.store.start_position(&file, None) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read start position, starting at 0");
                None
            }
        };
        let start = match stored {
            Some(position) if position > len => {
                info!(path = %path.display(), position, len, "File shrank, starting at 0");
                0
            }
            Some(position) => position,
            None => 0,
        };

        file.seek(SeekFrom::Start(start))
            .map_err(|e| CliError::reader(path, e))?;
        info!(path = %path.display(), start, "Reading file");

        let filename = path.display().to_string();
        let settings = SourceSettings::lookup(&self.shared, &filename);
        self.pump(BufReader::new(file), &filename, Some(start), &settings)
            .map_err(|e| CliError::reader(path, e))
    }

    /// Ship standard input; no offsets are attached
    pub fn read_stdin(&self) -> Result<(), CliError> {
        let settings = SourceSettings::lookup(&self.shared, "-");
        let stdin = std::io::stdin();
        self.pump(stdin.lock(), "-", None, &settings)
            .map_err(|e| CliError::reader("-", e))
    }

    fn pump<R: BufRead>(
        &self,
        mut reader: R,
        filename: &str,
        mut offset: Option<u64>,
        settings: &SourceSettings,
    ) -> std::io::Result<()> {
        let mut lines: Vec<Vec<u8>> = Vec::with_capacity(self.batch_lines);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            if let Some(offset) = offset.as_mut() {
                *offset += read as u64;
            }
            lines.push(trim_newline(&buf).to_vec());

            if lines.len() >= self.batch_lines && !self.send(filename, &mut lines, offset, settings) {
                return Ok(());
            }
        }

        if !lines.is_empty() {
            self.send(filename, &mut lines, offset, settings);
        }
        debug!(filename, offset = ?offset, "Reached end of input");
        Ok(())
    }

    /// Queue the pending lines; false once the dispatcher is gone
    fn send(
        &self,
        filename: &str,
        lines: &mut Vec<Vec<u8>>,
        offset: Option<u64>,
        settings: &SourceSettings,
    ) -> bool {
        let count = lines.len() as u64;
        let mut payload = CallbackPayload::new(filename, lines.drain(..))
            .with_ignore_empty(settings.ignore_empty);
        payload.offset = offset;
        payload.fields = settings.fields.clone();

        match self.tx.blocking_send(Command::Callback(payload)) {
            Ok(()) => {
                self.counters.lines_read.fetch_add(count, Ordering::Relaxed);
                self.counters.callbacks_sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                debug!(filename, error = %e, "Dispatcher stopped, reader exiting");
                false
            }
        }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Spawn one reader thread per file, or a stdin reader when there are none
///
/// A final thread waits for every reader and then queues `exit`.
pub fn spawn_readers(reader: LineReader, files: Vec<PathBuf>) -> std::io::Result<()> {
    let mut handles = Vec::new();

    if files.is_empty() {
        let stdin_reader = reader.clone();
        handles.push(
            std::thread::Builder::new()
                .name("reader-stdin".into())
                .spawn(move || stdin_reader.read_stdin())?,
        );
    }

    for (idx, path) in files.into_iter().enumerate() {
        let file_reader = reader.clone();
        handles.push(
            std::thread::Builder::new()
                .name(format!("reader-{idx}"))
                .spawn(move || file_reader.read_file(&path))?,
        );
    }

    std::thread::Builder::new()
        .name("reader-join".into())
        .spawn(move || {
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "Reader failed"),
                    Err(_) => warn!("Reader thread panicked"),
                }
            }
            if reader.tx.blocking_send(Command::Exit).is_ok() {
                debug!("All readers finished, exit queued");
            }
        })?;

    Ok(())
}
