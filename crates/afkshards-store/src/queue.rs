//! Background write queue.
//!
//! State transitions never touch the database directly. They
//! [`submit`](PersistHandle::submit) a [`PersistWrite`] to a bounded
//! channel and move on; a single worker task applies writes in
//! submission order. A full queue drops the write (logged and counted)
//! rather than stalling a tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use afkshards_types::{PlayerId, Position};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{SessionStore, StoreError};

/// One durable write.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistWrite {
    SaveSession {
        player: PlayerId,
        started_at: DateTime<Utc>,
    },
    RemoveSession {
        player: PlayerId,
    },
    SaveLocation(Position),
    ClearLocation,
    SavePosition {
        player: PlayerId,
        position: Position,
    },
}

impl PersistWrite {
    fn label(&self) -> &'static str {
        match self {
            Self::SaveSession { .. } => "save_session",
            Self::RemoveSession { .. } => "remove_session",
            Self::SaveLocation(_) => "save_location",
            Self::ClearLocation => "clear_location",
            Self::SavePosition { .. } => "save_position",
        }
    }

    async fn apply<S: SessionStore>(self, store: &S) -> Result<(), StoreError> {
        match self {
            Self::SaveSession { player, started_at } => {
                store.persist_session(player, started_at).await
            }
            Self::RemoveSession { player } => store.remove_session(player).await,
            Self::SaveLocation(location) => store.persist_location(location).await,
            Self::ClearLocation => store.clear_location().await,
            Self::SavePosition { player, position } => {
                store.save_last_known_position(player, position).await
            }
        }
    }
}

/// What actually travels on the channel.
#[derive(Debug)]
enum QueueMessage {
    Write(PersistWrite),
    /// Barrier: answered once every earlier write has been applied.
    Flush(oneshot::Sender<()>),
}

/// Cheap-to-clone sending side of the queue.
#[derive(Debug, Clone)]
pub struct PersistHandle {
    sender: mpsc::Sender<QueueMessage>,
    dropped: Arc<AtomicU64>,
}

impl PersistHandle {
    /// Creates a queue without a worker. Pair the inbox with
    /// [`PersistInbox::run`], or read it directly in tests.
    pub fn channel(capacity: usize) -> (PersistHandle, PersistInbox) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = PersistHandle {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (handle, PersistInbox { receiver })
    }

    /// Queues a write without waiting. Returns `false` when the write
    /// was dropped because the queue is full or the worker is gone.
    pub fn submit(&self, write: PersistWrite) -> bool {
        let label = write.label();
        match self.sender.try_send(QueueMessage::Write(write)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(write = label, "persistence queue full, dropping write");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(write = label, "persistence worker stopped, dropping write");
                false
            }
        }
    }

    /// Waits until every write submitted before this call has been
    /// applied (or failed and been logged).
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(QueueMessage::Flush(tx))
            .await
            .map_err(|_| StoreError::QueueClosed)?;
        rx.await.map_err(|_| StoreError::QueueClosed)
    }

    /// Writes lost to a full or closed queue since startup.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving side of the queue.
#[derive(Debug)]
pub struct PersistInbox {
    receiver: mpsc::Receiver<QueueMessage>,
}

impl PersistInbox {
    /// Applies writes until every [`PersistHandle`] is dropped.
    ///
    /// Failures are logged and skipped; the in-memory transition that
    /// produced the write has already happened and stays.
    pub async fn run<S: SessionStore>(mut self, store: Arc<S>) {
        debug!("persistence worker started");
        let mut applied = 0u64;
        while let Some(message) = self.receiver.recv().await {
            match message {
                QueueMessage::Write(write) => {
                    let label = write.label();
                    match write.apply(store.as_ref()).await {
                        Ok(()) => applied += 1,
                        Err(e) => warn!(write = label, error = %e, "persistence write failed"),
                    }
                }
                QueueMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        info!(applied, "persistence worker stopped");
    }

    /// Pops the next queued write without a worker, acknowledging any
    /// flush barriers on the way. `None` when the queue is empty.
    pub fn try_next(&mut self) -> Option<PersistWrite> {
        loop {
            match self.receiver.try_recv().ok()? {
                QueueMessage::Write(write) => return Some(write),
                QueueMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }

    /// Drains every queued write.
    pub fn drain(&mut self) -> Vec<PersistWrite> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

/// Starts the background worker on the current tokio runtime.
pub fn spawn_worker<S: SessionStore>(
    store: Arc<S>,
    capacity: usize,
) -> (PersistHandle, JoinHandle<()>) {
    let (handle, inbox) = PersistHandle::channel(capacity);
    let task = tokio::spawn(inbox.run(store));
    (handle, task)
}
