//! Command queue - bounded, blocking, multi-producer / single-consumer
//!
//! Producers block when the queue is full, so a stalled transport pushes
//! back on file watchers instead of growing memory without bound.

use tokio::sync::mpsc;
use tracing::warn;

use contracts::{AddGlob, CallbackPayload, Command};

use crate::error::DispatcherError;

/// Create a bounded command queue
///
/// # Panics
/// Panics if `capacity` is zero (rejected earlier by config validation).
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Producer handle, cheap to clone
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Queue a command, waiting for room
    pub async fn send(&self, command: Command) -> Result<(), DispatcherError> {
        let name = command.name();
        self.tx.send(command).await.map_err(|_| {
            warn!(command = name, "Dispatcher gone, command not queued");
            DispatcherError::QueueClosed { command: name }
        })
    }

    /// Queue a command from a plain (non-async) thread, blocking for room
    ///
    /// # Panics
    /// Panics when called from inside an async runtime.
    pub fn blocking_send(&self, command: Command) -> Result<(), DispatcherError> {
        let name = command.name();
        self.tx
            .blocking_send(command)
            .map_err(|_| DispatcherError::QueueClosed { command: name })
    }

    /// Queue a batch of lines
    pub async fn callback(&self, payload: CallbackPayload) -> Result<(), DispatcherError> {
        self.send(Command::Callback(payload)).await
    }

    /// Announce a new watch pattern
    pub async fn add_glob(&self, glob: AddGlob) -> Result<(), DispatcherError> {
        self.send(Command::AddGlob(glob)).await
    }

    /// Ask the dispatcher to stop
    pub async fn exit(&self) -> Result<(), DispatcherError> {
        self.send(Command::Exit).await
    }

    /// Free slots left in the queue
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer handle, owned by the dispatcher
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<Command>,
}

impl CommandReceiver {
    /// Next command, `None` once every sender is dropped and the queue drained
    pub async fn recv(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Commands currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no command is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_commands_arrive_in_order() {
        let (tx, mut rx) = command_queue(4);
        tx.callback(CallbackPayload::new("a.log", ["1"])).await.unwrap();
        tx.add_glob(AddGlob::default()).await.unwrap();
        tx.exit().await.unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.recv().await.unwrap().name(), "callback");
        assert_eq!(rx.recv().await.unwrap().name(), "addglob");
        assert_eq!(rx.recv().await.unwrap().name(), "exit");
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let (tx, mut rx) = command_queue(1);
        tx.exit().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.exit()).await;
        assert!(blocked.is_err(), "send should wait while the queue is full");

        rx.recv().await.unwrap();
        tx.exit().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = command_queue(1);
        drop(rx);
        let err = tx.exit().await.unwrap_err();
        assert!(matches!(err, DispatcherError::QueueClosed { command: "exit" }));
    }

    #[tokio::test]
    async fn test_recv_none_after_senders_dropped() {
        let (tx, mut rx) = command_queue(2);
        tx.exit().await.unwrap();
        drop(tx);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_blocking_send_from_thread() {
        let (tx, mut rx) = command_queue(2);
        std::thread::spawn(move || tx.blocking_send(Command::Exit).unwrap())
            .join()
            .unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert_eq!(runtime.block_on(rx.recv()).unwrap().name(), "exit");
    }
}
