//! Engine: owns the shared session state and routes players to shards.

use std::sync::Arc;

use afkshards_session::{AfkLocation, AfkState, Collaborators, QuitOutcome, SessionManager};
use afkshards_store::{PersistHandle, SessionStore, SqliteSessionStore, recover, spawn_worker};
use afkshards_types::{PlayerId, Position};
use tokio::task::JoinHandle;

use crate::shard::spawn_shard;
use crate::{ActionGuard, AfkError, EngineConfig, LifecycleEvent, ShardHandle, ShardInfo};

/// Command channel size for each shard actor.
const SHARD_CHANNEL_SIZE: usize = 256;

/// A running AFK engine.
///
/// Session state lives in one [`SessionManager`] shared by every shard.
/// Players are split across shards by [`PlayerId::bucket`]; a player's
/// events, commands and ticks always go to the same shard.
pub struct AfkEngine {
    manager: Arc<SessionManager>,
    guard: ActionGuard,
    shards: Vec<ShardHandle>,
    tasks: Vec<JoinHandle<()>>,
    persist: PersistHandle,
    worker: JoinHandle<()>,
}

impl AfkEngine {
    /// Opens the SQLite store named by `config.storage` and starts.
    pub async fn open(config: EngineConfig, collaborators: Collaborators) -> Result<Self, AfkError> {
        let store = SqliteSessionStore::connect(&config.storage.path).await?;
        Self::start(config, collaborators, Arc::new(store)).await
    }

    /// Recovers durable state from `store`, then spawns the persistence
    /// worker and the shard actors.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start<S: SessionStore>(
        config: EngineConfig,
        collaborators: Collaborators,
        store: Arc<S>,
    ) -> Result<Self, AfkError> {
        let config = config.validated();

        let world = Arc::clone(&collaborators.world);
        let recovered = recover(store.as_ref(), |p| world.is_online(p)).await;

        let (persist, worker) = spawn_worker(store, config.storage.queue_capacity);
        let manager = Arc::new(SessionManager::new(
            config.afk,
            collaborators,
            AfkLocation::new(recovered.afk_location),
            persist.clone(),
        ));
        manager.restore(recovered.sessions);

        let mut shards = Vec::with_capacity(config.shards);
        let mut tasks = Vec::with_capacity(config.shards);
        for index in 0..config.shards {
            let (handle, task) = spawn_shard(
                index,
                config.shards,
                Arc::clone(&manager),
                config.tick.clone(),
                SHARD_CHANNEL_SIZE,
            );
            shards.push(handle);
            tasks.push(task);
        }

        tracing::info!(
            shards = config.shards,
            restored = manager.afk_count(),
            discarded = recovered.discarded,
            "AFK engine started"
        );

        Ok(Self {
            guard: ActionGuard::new(Arc::clone(&manager)),
            manager,
            shards,
            tasks,
            persist,
            worker,
        })
    }

    // -- Routing ----------------------------------------------------------

    /// The shard that owns `player`.
    pub fn shard_for(&self, player: PlayerId) -> &ShardHandle {
        &self.shards[player.bucket(self.shards.len())]
    }

    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<(), AfkError> {
        self.shard_for(event.player()).dispatch(event).await
    }

    /// Begins the entry countdown. Returns its length in ticks.
    pub async fn start_afk(&self, player: PlayerId) -> Result<u32, AfkError> {
        self.shard_for(player).start_afk(player).await
    }

    pub async fn quit_afk(&self, player: PlayerId) -> Result<QuitOutcome, AfkError> {
        self.shard_for(player).quit_afk(player).await
    }

    /// Drops every trace of the player without moving them.
    pub async fn remove_afk_data(&self, player: PlayerId) -> Result<bool, AfkError> {
        self.shard_for(player).remove_afk_data(player).await
    }

    // -- AFK location -----------------------------------------------------

    pub fn set_afk_location(&self, actor: PlayerId, position: Position) -> Result<(), AfkError> {
        Ok(self.manager.set_afk_location(actor, position)?)
    }

    pub fn remove_afk_location(&self, actor: PlayerId) -> bool {
        self.manager.remove_afk_location(actor)
    }

    pub fn afk_location(&self) -> Option<Position> {
        self.manager.location().get()
    }

    // -- Queries ----------------------------------------------------------

    pub fn state(&self, player: PlayerId) -> AfkState {
        self.manager.state(player)
    }

    pub fn is_afk(&self, player: PlayerId) -> bool {
        self.manager.is_afk(player)
    }

    pub fn is_pending_afk(&self, player: PlayerId) -> bool {
        self.manager.is_pending_afk(player)
    }

    /// Action checks for the host's own event handlers.
    pub fn guard(&self) -> &ActionGuard {
        &self.guard
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Persistence writes lost to a full queue since startup.
    pub fn dropped_writes(&self) -> u64 {
        self.persist.dropped_writes()
    }

    /// Queries every shard. Shards that fail to answer are skipped.
    pub async fn shard_info(&self) -> Vec<ShardInfo> {
        let mut infos = Vec::with_capacity(self.shards.len());
        for handle in &self.shards {
            if let Ok(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos
    }

    /// Waits until every write queued so far has reached the store.
    pub async fn flush(&self) -> Result<(), AfkError> {
        Ok(self.persist.flush().await?)
    }

    /// Stops the shards, drains the persistence queue, and stops the
    /// worker.
    ///
    /// In-memory sessions are not cleared; their durable rows stay so
    /// the next start can restore them.
    pub async fn shutdown(self) -> Result<(), AfkError> {
        let Self {
            manager,
            guard,
            shards,
            tasks,
            persist,
            worker,
        } = self;

        for handle in &shards {
            let _ = handle.shutdown().await;
        }
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "shard task ended abnormally");
            }
        }
        drop(shards);

        let flushed = persist.flush().await;
        drop(persist);
        drop(guard);

        // The worker exits once the last queue handle is gone. A host
        // still holding the manager keeps it alive, so only wait when
        // ours was the last reference.
        match Arc::try_unwrap(manager) {
            Ok(manager) => {
                drop(manager);
                if let Err(e) = worker.await {
                    tracing::warn!(error = %e, "persistence worker ended abnormally");
                }
            }
            Err(_) => {
                tracing::debug!("session manager still shared, detaching persistence worker");
            }
        }

        tracing::info!("AFK engine stopped");
        Ok(flushed?)
    }
}
