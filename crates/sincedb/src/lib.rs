//! # Sincedb
//!
//! Checkpoint subsystem.
//!
//! Responsible for:
//! - Durable file identity -> read position mapping (SQLite)
//! - Deciding when the dispatcher may write a new checkpoint for a file

pub mod error;
pub mod store;
pub mod throttle;

pub use error::SincedbError;
pub use store::{CheckpointRecord, SincedbStore};
pub use throttle::{CheckpointThrottle, WriteIntervalSource};
