//! # Dispatcher
//!
//! Log delivery core.
//!
//! Responsibilities:
//! - Consume the bounded command queue (`callback`, `addglob`, `exit`)
//! - Deliver batches through the active transport, retrying with backoff
//! - Write throttled checkpoints into the sincedb

mod backoff;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod transports;

pub use backoff::Backoff;
pub use contracts::{Command, Transport};
pub use dispatcher::{
    create_dispatcher, DispatchOutcome, DispatchState, Dispatcher, DispatcherConfig, StopReason,
};
pub use error::DispatcherError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use queue::{command_queue, CommandReceiver, CommandSender};
pub use transports::{create_transport, AnyTransport};
