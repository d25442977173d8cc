//! The storage contract and startup recovery.

use std::future::Future;

use afkshards_types::{PlayerId, Position};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::StoreError;

/// A durable AFK session row. Only sessions in the AFK state are ever
/// written; a player mid-countdown has no row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub player: PlayerId,
    pub started_at: DateTime<Utc>,
}

/// Persistence backend for session state.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one instance is shared between the
/// startup path and the background write worker. Every returned future
/// is `Send` so the worker can run on any runtime thread.
pub trait SessionStore: Send + Sync + 'static {
    /// All durable sessions, online or not. Rows that can't be decoded
    /// are left out (and may be deleted) rather than failing the load.
    fn load_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionRecord>, StoreError>> + Send;

    /// Records `player` as AFK since `started_at` (insert or replace).
    fn persist_session(
        &self,
        player: PlayerId,
        started_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the durable session, if any.
    fn remove_session(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The legacy single-node AFK location. Orientation is not stored.
    fn load_location(
        &self,
    ) -> impl Future<Output = Result<Option<Position>, StoreError>> + Send;

    fn persist_location(
        &self,
        location: Position,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn clear_location(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Saves the pre-AFK return point, independent of session state.
    fn save_last_known_position(
        &self,
        player: PlayerId,
        position: Position,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_last_known_position(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<Position>, StoreError>> + Send;
}

/// A durable AFK session that belongs to a connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredSession {
    pub player: PlayerId,
    pub started_at: DateTime<Utc>,
    /// The saved return point, when one was written before the restart.
    pub last_position: Option<Position>,
}

/// Everything startup needs to rebuild in-memory state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    pub afk_location: Option<Position>,
    pub sessions: Vec<RecoveredSession>,
    /// Sessions dropped because their player is offline.
    pub discarded: usize,
}

/// Reads the durable mirror once at startup.
///
/// Sessions for players that `is_online` rejects are deleted from the
/// store: there is no meaningful way to restore AFK state for someone
/// who isn't here, and a leftover row must never block a later login.
/// A failed delete is logged and the session is still left out.
///
/// Never fails: an unreadable location or session table is logged and
/// treated as empty, so a damaged store costs recovered state but never
/// keeps the engine from starting.
pub async fn recover<S, F>(store: &S, is_online: F) -> Recovered
where
    S: SessionStore,
    F: Fn(PlayerId) -> bool,
{
    let afk_location = store.load_location().await.unwrap_or_else(|e| {
        warn!(error = %e, "AFK location unreadable, starting without one");
        None
    });
    let records = store.load_sessions().await.unwrap_or_else(|e| {
        warn!(error = %e, "AFK sessions unreadable, nothing restored");
        Vec::new()
    });

    let mut sessions = Vec::new();
    let mut discarded = 0;
    for record in records {
        if !is_online(record.player) {
            discarded += 1;
            if let Err(e) = store.remove_session(record.player).await {
                warn!(player = %record.player, error = %e, "failed to discard offline session");
            }
            continue;
        }
        let last_position = match store.get_last_known_position(record.player).await {
            Ok(p) => p,
            Err(e) => {
                warn!(player = %record.player, error = %e, "last known position unreadable");
                None
            }
        };
        sessions.push(RecoveredSession {
            player: record.player,
            started_at: record.started_at,
            last_position,
        });
    }

    info!(
        restored = sessions.len(),
        discarded,
        has_location = afk_location.is_some(),
        "session store recovered"
    );

    Recovered {
        afk_location,
        sessions,
        discarded,
    }
}
