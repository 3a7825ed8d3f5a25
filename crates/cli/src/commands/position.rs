//! `position` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use sincedb::{CheckpointRecord, SincedbStore};
use tracing::info;

use super::load_config;
use crate::cli::PositionArgs;
use crate::error::CliError;

#[derive(Serialize)]
struct PositionEntry {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<String>,
    position: Option<u64>,
}

impl From<CheckpointRecord> for PositionEntry {
    fn from(record: CheckpointRecord) -> Self {
        Self {
            path: record.filename,
            identity: Some(record.identity),
            position: Some(record.position),
        }
    }
}

/// Execute the `position` command
pub fn run_position(args: &PositionArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let Some(path) = config.sincedb.path else {
        return Err(CliError::sincedb_disabled(args.config.display().to_string()).into());
    };

    info!(sincedb = %path.display(), "Reading positions");
    let store = SincedbStore::new(Some(path));
    let entries = collect_positions(&store, args)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&entries).context("Failed to serialize positions")?;
        println!("{}", json);
    } else {
        for entry in &entries {
            match entry.position {
                Some(position) => println!("{}\t{}", entry.path, position),
                None => println!("{}\t-", entry.path),
            }
        }
    }
    Ok(())
}

fn collect_positions(store: &SincedbStore, args: &PositionArgs) -> Result<Vec<PositionEntry>> {
    if args.all {
        let records = store.records().context("Failed to list sincedb records")?;
        return Ok(records.into_iter().map(PositionEntry::from).collect());
    }

    args.paths
        .iter()
        .map(|path| {
            let position = store
                .start_position_for_path(path)
                .with_context(|| format!("Failed to look up {}", path.display()))?;
            Ok(PositionEntry {
                path: path.display().to_string(),
                identity: None,
                position,
            })
        })
        .collect()
}
