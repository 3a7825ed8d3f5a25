//! # Contracts
//!
//! Shared interface contracts for the shipper: the command envelope pushed by
//! file watchers, the transport capability set, file identity and the
//! configuration model. Business crates depend on this crate, never the
//! other way round.
//!
//! ## Time Model
//! - Event timestamps are wall-clock UTC (`chrono`)
//! - Throttling and timeouts use monotonic instants owned by the dispatcher

mod command;
mod config;
mod error;
mod file_identity;
mod transport;

pub use command::*;
pub use config::*;
pub use error::*;
pub use file_identity::FileIdentity;
pub use transport::*;
