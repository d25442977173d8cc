//! Shard actor: an isolated Tokio task that owns a slice of the players.
//!
//! Each shard runs in its own task, communicating with the engine
//! through an mpsc channel. Every transition for a given player runs on
//! the one shard that owns them, so a player's events and ticks are
//! totally ordered without any lock around the session maps.

use std::sync::Arc;

use afkshards_session::{QuitOutcome, Rejection, SessionManager};
use afkshards_tick::{TickConfig, TickInfo, TickScheduler, TickStats};
use afkshards_types::PlayerId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{AfkError, LifecycleHooks};

/// A host event the engine routes to the owning shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Join(PlayerId),
    Quit(PlayerId),
    Teleport(PlayerId),
    RegionEnter(PlayerId),
    RegionExit(PlayerId),
}

impl LifecycleEvent {
    pub fn player(&self) -> PlayerId {
        match *self {
            Self::Join(p)
            | Self::Quit(p)
            | Self::Teleport(p)
            | Self::RegionEnter(p)
            | Self::RegionExit(p) => p,
        }
    }
}

/// Commands sent to a shard actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel.
pub(crate) enum ShardCommand {
    Event(LifecycleEvent),

    StartAfk {
        player: PlayerId,
        reply: oneshot::Sender<Result<u32, Rejection>>,
    },

    QuitAfk {
        player: PlayerId,
        reply: oneshot::Sender<Result<QuitOutcome, Rejection>>,
    },

    RemoveAfkData {
        player: PlayerId,
        reply: oneshot::Sender<bool>,
    },

    GetInfo {
        reply: oneshot::Sender<ShardInfo>,
    },

    Shutdown,
}

/// A snapshot of shard metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub index: usize,
    /// Ticks run since the shard started.
    pub ticks: u64,
    /// Deferred hook actions waiting to fire.
    pub pending_actions: usize,
    pub tick_stats: TickStats,
}

/// Handle to a running shard actor.
///
/// Cheap to clone; it's just an `mpsc::Sender` wrapper.
#[derive(Debug, Clone)]
pub struct ShardHandle {
    index: usize,
    sender: mpsc::Sender<ShardCommand>,
}

impl ShardHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Queues a host event (fire-and-forget).
    pub async fn dispatch(&self, event: LifecycleEvent) -> Result<(), AfkError> {
        self.sender
            .send(ShardCommand::Event(event))
            .await
            .map_err(|_| AfkError::ShardUnavailable(self.index))
    }

    /// Runs `start_afk_process` on the shard and waits for the outcome.
    pub async fn start_afk(&self, player: PlayerId) -> Result<u32, AfkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(ShardCommand::StartAfk {
            player,
            reply: reply_tx,
        })
        .await?;
        Ok(self.await_reply(reply_rx).await??)
    }

    pub async fn quit_afk(&self, player: PlayerId) -> Result<QuitOutcome, AfkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(ShardCommand::QuitAfk {
            player,
            reply: reply_tx,
        })
        .await?;
        Ok(self.await_reply(reply_rx).await??)
    }

    pub async fn remove_afk_data(&self, player: PlayerId) -> Result<bool, AfkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(ShardCommand::RemoveAfkData {
            player,
            reply: reply_tx,
        })
        .await?;
        self.await_reply(reply_rx).await
    }

    pub async fn info(&self) -> Result<ShardInfo, AfkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request(ShardCommand::GetInfo { reply: reply_tx }).await?;
        self.await_reply(reply_rx).await
    }

    /// Tells the shard to stop after the commands already queued.
    pub async fn shutdown(&self) -> Result<(), AfkError> {
        self.request(ShardCommand::Shutdown).await
    }

    async fn request(&self, cmd: ShardCommand) -> Result<(), AfkError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AfkError::ShardUnavailable(self.index))
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, AfkError> {
        rx.await.map_err(|_| AfkError::ShardUnavailable(self.index))
    }
}

/// The internal shard actor state. Runs inside a Tokio task.
struct ShardActor {
    index: usize,
    shard_count: usize,
    manager: Arc<SessionManager>,
    hooks: LifecycleHooks,
    scheduler: TickScheduler,
    receiver: mpsc::Receiver<ShardCommand>,
}

impl ShardActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(
            shard = self.index,
            rate_hz = self.scheduler.tick_rate_hz(),
            "shard actor started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(ShardCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle(cmd),
                },
                info = self.scheduler.wait_for_tick() => {
                    self.on_tick(info);
                    self.scheduler.record_tick_end();
                }
            }
        }

        tracing::info!(
            shard = self.index,
            ticks = self.scheduler.tick_count(),
            "shard actor stopped"
        );
    }

    fn handle(&mut self, cmd: ShardCommand) {
        match cmd {
            ShardCommand::Event(event) => self.handle_event(event),
            ShardCommand::StartAfk { player, reply } => {
                let _ = reply.send(self.manager.start_afk_process(player));
            }
            ShardCommand::QuitAfk { player, reply } => {
                let _ = reply.send(self.manager.quit_afk(player));
            }
            ShardCommand::RemoveAfkData { player, reply } => {
                let _ = reply.send(self.manager.remove_afk_data(player));
            }
            ShardCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            // Handled by the run loop.
            ShardCommand::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: LifecycleEvent) {
        tracing::debug!(shard = self.index, ?event, "lifecycle event");
        match event {
            LifecycleEvent::Join(p) => self.hooks.on_join(p),
            LifecycleEvent::Quit(p) => self.hooks.on_quit(p),
            LifecycleEvent::Teleport(p) => self.hooks.on_teleport(p),
            LifecycleEvent::RegionEnter(p) => self.hooks.on_region_enter(p),
            LifecycleEvent::RegionExit(p) => self.hooks.on_region_exit(p),
        }
    }

    /// Timers first, then deferred hook actions, so an auto-start that
    /// fires this tick isn't also counted down this tick.
    fn on_tick(&mut self, info: TickInfo) {
        let (index, shards) = (self.index, self.shard_count);
        self.manager.tick(|p| p.bucket(shards) == index);
        self.hooks.advance();
        tracing::trace!(shard = index, tick = info.tick, "shard tick");
    }

    fn info(&self) -> ShardInfo {
        ShardInfo {
            index: self.index,
            ticks: self.scheduler.tick_count(),
            pending_actions: self.hooks.pending_actions(),
            tick_stats: self.scheduler.stats().clone(),
        }
    }
}

/// Spawns a shard actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it fills.
pub(crate) fn spawn_shard(
    index: usize,
    shard_count: usize,
    manager: Arc<SessionManager>,
    tick: TickConfig,
    channel_size: usize,
) -> (ShardHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = ShardActor {
        index,
        shard_count,
        hooks: LifecycleHooks::new(Arc::clone(&manager)),
        manager,
        scheduler: TickScheduler::new(tick),
        receiver: rx,
    };

    let task = tokio::spawn(actor.run());

    (ShardHandle { index, sender: tx }, task)
}
