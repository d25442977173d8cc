//! Error types for the store layer.

use afkshards_types::TypesError;

/// Errors raised by store backends and the write queue.
///
/// None of these are fatal to the host: the worker logs them and moves
/// on, and startup recovery degrades to "nothing recovered".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected a query or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Preparing the database directory failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored id didn't parse.
    #[error(transparent)]
    InvalidRecord(#[from] TypesError),

    /// A stored row is readable but meaningless (e.g. a timestamp out
    /// of range).
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// The background worker has stopped; no more writes are accepted.
    #[error("persistence queue closed")]
    QueueClosed,

    /// An in-memory backend was told to fail (test hook).
    #[error("write rejected: {0}")]
    Rejected(String),
}
