//! Durable mirror of AFK session state.
//!
//! The in-memory session manager is the source of truth for a running
//! process. This crate keeps a copy on disk so a restart can tell which
//! players were AFK, where they stood before, and where the legacy AFK
//! location is:
//!
//! 1. **Backends**: the [`SessionStore`] trait, with
//!    [`SqliteSessionStore`] for production and [`MemorySessionStore`]
//!    for tests and embedding.
//! 2. **Recovery**: [`recover`] reads everything once at startup and
//!    discards sessions of players who are not online.
//! 3. **Write queue**: [`PersistHandle`] hands writes to a single
//!    background worker so a countdown or earning tick never waits on
//!    the database.
//!
//! ```text
//! Session manager ──submit()──▶ [bounded queue] ──▶ worker ──▶ SessionStore
//! ```

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod queue;
mod sqlite;
mod store;

pub use error::StoreError;
pub use memory::{MemorySessionStore, MemorySnapshot};
pub use queue::{PersistHandle, PersistInbox, PersistWrite, spawn_worker};
pub use sqlite::SqliteSessionStore;
pub use store::{Recovered, RecoveredSession, SessionRecord, SessionStore, recover};
