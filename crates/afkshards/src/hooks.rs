//! Host events mapped onto lifecycle transitions.
//!
//! [`LifecycleHooks`] reacts to join, quit, teleport and region events.
//! Two of its reactions are delayed (the join grace period and the
//! region auto-start), so it keeps a small queue of deferred actions
//! keyed by tick and re-checks every condition when an action comes due.
//!
//! [`ActionGuard`] answers the synchronous "may this AFK player do
//! that?" questions the host asks from its own event handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use afkshards_session::SessionManager;
use afkshards_types::{Notice, PlayerId};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// LifecycleHooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    /// End the grace period after a join.
    ClearStale(PlayerId),
    /// Start AFK for a player who walked into a zone.
    AutoStart(PlayerId),
}

/// Per-shard event reactions.
///
/// Owned by one shard actor; its deferred queue advances with that
/// shard's clock.
pub struct LifecycleHooks {
    manager: Arc<SessionManager>,
    now: u64,
    deferred: BTreeMap<u64, Vec<Deferred>>,
}

impl LifecycleHooks {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            now: 0,
            deferred: BTreeMap::new(),
        }
    }

    /// A player connected. After the join grace period, a session left
    /// over from an unclean shutdown is cleared. Sessions entered since
    /// startup are left alone.
    pub fn on_join(&mut self, player: PlayerId) {
        let grace = self.manager.settings().join_grace_ticks;
        self.schedule(grace, Deferred::ClearStale(player));
    }

    /// A player disconnected. Any countdown or AFK session is dropped
    /// without relocation.
    pub fn on_quit(&mut self, player: PlayerId) {
        if self.manager.is_afk(player) || self.manager.is_pending_afk(player) {
            self.manager.remove_afk_data(player);
            debug!(%player, "AFK data cleared on disconnect");
        }
    }

    /// A player was teleported. Only a running countdown cares.
    pub fn on_teleport(&mut self, player: PlayerId) {
        if self.manager.is_pending_afk(player) {
            self.manager.cancel_afk_process(player);
            self.notify(player, Notice::CancelledMovement);
        }
    }

    /// A player walked into an AFK zone.
    pub fn on_region_enter(&mut self, player: PlayerId) {
        let regions = &self.manager.collaborators().regions;
        if !regions.is_enabled() {
            return;
        }
        let auto_start = regions.auto_start_enabled();

        self.notify(player, Notice::RegionEntered);
        if auto_start && !self.manager.is_afk(player) {
            let delay = self.manager.settings().auto_start_delay_ticks;
            self.schedule(delay, Deferred::AutoStart(player));
        }
    }

    /// A player walked out of an AFK zone.
    pub fn on_region_exit(&mut self, player: PlayerId) {
        let regions = &self.manager.collaborators().regions;
        if !regions.is_enabled() {
            return;
        }
        let auto_stop = regions.auto_stop_enabled();

        self.notify(player, Notice::RegionLeft);
        if auto_stop && self.manager.is_afk(player) {
            let _ = self.manager.quit_afk(player);
            info!(%player, "AFK auto-stopped on region exit");
        }
    }

    /// Advances the hook clock by one tick and runs whatever came due.
    pub fn advance(&mut self) {
        self.now += 1;
        let later = self.deferred.split_off(&(self.now + 1));
        let due = std::mem::replace(&mut self.deferred, later);
        for action in due.into_values().flatten() {
            self.run(action);
        }
    }

    /// Deferred actions not yet run.
    pub fn pending_actions(&self) -> usize {
        self.deferred.values().map(Vec::len).sum()
    }

    fn schedule(&mut self, delay: u32, action: Deferred) {
        if delay == 0 {
            self.run(action);
            return;
        }
        self.deferred
            .entry(self.now + u64::from(delay))
            .or_default()
            .push(action);
    }

    fn run(&mut self, action: Deferred) {
        match action {
            Deferred::ClearStale(player) => {
                if self.manager.is_stale_afk(player) {
                    self.manager.remove_afk_data(player);
                    self.notify(player, Notice::AutoStopped);
                    info!(%player, "stale AFK session cleared after join");
                }
            }
            Deferred::AutoStart(player) => {
                let collaborators = self.manager.collaborators();
                let still_eligible = collaborators.world.is_online(player)
                    && collaborators.regions.is_in_designated_zone(player)
                    && !self.manager.is_afk(player)
                    && !self.manager.is_pending_afk(player);
                if still_eligible {
                    let _ = self.manager.start_afk_process(player);
                } else {
                    debug!(%player, "auto-start no longer applies");
                }
            }
        }
    }

    fn notify(&self, player: PlayerId, notice: Notice) {
        self.manager
            .collaborators()
            .notifier
            .notify(player, &notice);
    }
}

// ---------------------------------------------------------------------------
// ActionGuard
// ---------------------------------------------------------------------------

/// Whether the host should let an action through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Veto,
}

impl Verdict {
    pub fn is_veto(self) -> bool {
        self == Verdict::Veto
    }
}

/// Synchronous action checks. Callable from any thread.
#[derive(Clone)]
pub struct ActionGuard {
    manager: Arc<SessionManager>,
}

impl ActionGuard {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Command input. AFK players may only run the allowed prefixes; a
    /// vetoed command tells the player why.
    pub fn on_command(&self, player: PlayerId, command: &str) -> Verdict {
        if !self.manager.is_afk(player) || self.manager.settings().is_command_allowed(command) {
            return Verdict::Allow;
        }
        self.blocked(player);
        debug!(%player, command, "command blocked while AFK");
        Verdict::Veto
    }

    /// Block or entity interaction.
    pub fn on_interact(&self, player: PlayerId) -> Verdict {
        if !self.manager.is_afk(player) {
            return Verdict::Allow;
        }
        self.blocked(player);
        Verdict::Veto
    }

    /// Incoming damage. AFK players are invulnerable. Silent, since
    /// damage can arrive many times a second.
    pub fn on_damage_received(&self, player: PlayerId) -> Verdict {
        if self.manager.is_afk(player) {
            Verdict::Veto
        } else {
            Verdict::Allow
        }
    }

    /// Outgoing damage. AFK players can't attack.
    pub fn on_damage_dealt(&self, player: PlayerId) -> Verdict {
        if self.manager.is_afk(player) {
            Verdict::Veto
        } else {
            Verdict::Allow
        }
    }

    fn blocked(&self, player: PlayerId) {
        self.manager
            .collaborators()
            .notifier
            .notify(player, &Notice::Blocked);
    }
}
