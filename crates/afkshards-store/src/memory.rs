//! In-process store backend.
//!
//! Behaves like the SQLite backend minus durability. Tests use
//! [`MemorySessionStore::snapshot`] to assert on what was written and
//! [`MemorySessionStore::fail_writes`] to simulate a broken database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use afkshards_types::{PlayerId, Position};
use chrono::{DateTime, Utc};

use crate::{SessionRecord, SessionStore, StoreError};

/// Copy of everything the store currently holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub sessions: HashMap<PlayerId, DateTime<Utc>>,
    pub location: Option<Position>,
    pub positions: HashMap<PlayerId, Position>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<MemorySnapshot>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from pre-existing contents, as if loaded from disk.
    pub fn with_snapshot(snapshot: MemorySnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail with [`StoreError::Rejected`].
    /// Reads keep working.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemorySnapshot> {
        // A panic mid-write can only leave a single map entry half
        // updated; the data is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<R>(&self, op: &str, f: impl FnOnce(&mut MemorySnapshot) -> R) -> Result<R, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(op.to_string()));
        }
        Ok(f(&mut self.lock()))
    }
}

impl SessionStore for MemorySessionStore {
    async fn load_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut records: Vec<SessionRecord> = self
            .lock()
            .sessions
            .iter()
            .map(|(player, started_at)| SessionRecord {
                player: *player,
                started_at: *started_at,
            })
            .collect();
        records.sort_by_key(|r| r.player);
        Ok(records)
    }

    async fn persist_session(
        &self,
        player: PlayerId,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.write("persist_session", |s| {
            s.sessions.insert(player, started_at);
        })
    }

    async fn remove_session(&self, player: PlayerId) -> Result<(), StoreError> {
        self.write("remove_session", |s| {
            s.sessions.remove(&player);
        })
    }

    async fn load_location(&self) -> Result<Option<Position>, StoreError> {
        Ok(self.lock().location.clone())
    }

    async fn persist_location(&self, location: Position) -> Result<(), StoreError> {
        self.write("persist_location", |s| {
            s.location = Some(location.with_rotation(0.0, 0.0));
        })
    }

    async fn clear_location(&self) -> Result<(), StoreError> {
        self.write("clear_location", |s| s.location = None)
    }

    async fn save_last_known_position(
        &self,
        player: PlayerId,
        position: Position,
    ) -> Result<(), StoreError> {
        self.write("save_last_known_position", |s| {
            s.positions.insert(player, position);
        })
    }

    async fn get_last_known_position(
        &self,
        player: PlayerId,
    ) -> Result<Option<Position>, StoreError> {
        Ok(self.lock().positions.get(&player).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_then_remove_session() {
        let store = MemorySessionStore::new();
        let player = PlayerId::new_v4();
        let now = Utc::now();

        store.persist_session(player, now).await.unwrap();
        assert_eq!(store.snapshot().sessions.get(&player), Some(&now));

        store.remove_session(player).await.unwrap();
        assert!(store.snapshot().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_location_drops_orientation() {
        let store = MemorySessionStore::new();
        let loc = Position::new("world", 1.0, 2.0, 3.0).with_rotation(45.0, 10.0);

        store.persist_location(loc).await.unwrap();

        assert_eq!(
            store.load_location().await.unwrap(),
            Some(Position::new("world", 1.0, 2.0, 3.0))
        );
    }

    #[tokio::test]
    async fn test_fail_writes_rejects_but_reads_work() {
        let store = MemorySessionStore::new();
        store.fail_writes(true);

        let result = store.persist_session(PlayerId::new_v4(), Utc::now()).await;

        assert!(matches!(result, Err(StoreError::Rejected(op)) if op == "persist_session"));
        assert!(store.load_sessions().await.unwrap().is_empty());
    }
}
