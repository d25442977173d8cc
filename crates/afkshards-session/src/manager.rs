//! The session manager: every player's AFK state in one place.
//!
//! # Concurrency
//!
//! All three maps are `DashMap`s, so any thread can ask
//! [`SessionManager::is_afk`] without a global lock, and shard actors
//! tick disjoint sets of players in parallel. Transitions for one player
//! are serialized by the engine (a player always routes to the same
//! shard), so the manager itself never has to arbitrate two transitions
//! of the same player.
//!
//! No map guard is held across a call into a collaborator or another
//! map operation: collaborators may call back into `is_afk`, and a
//! DashMap shard lock is not re-entrant.

use afkshards_store::{PersistHandle, PersistWrite, RecoveredSession};
use afkshards_types::{Cue, Notice, PlayerId, Position};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use crate::{
    AfkLocation, AfkSettings, Collaborators, CountdownStep, EarningTimer, PendingEntry, Rejection,
    RelocationMode, has_moved,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a player is in the AFK lifecycle.
///
/// ```text
/// NotAfk ──start──→ EnteringAfk ──countdown hits 0──→ Afk
///    ↑                  │                              │
///    └── moved / cancel / teleport / disconnect ───────┤
///    └───────────── quit / disconnect / forced removal ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfkState {
    NotAfk,
    EnteringAfk,
    Afk,
}

/// One player's AFK session. Absent from the manager means `NotAfk`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub player: PlayerId,
    /// `EnteringAfk` or `Afk`; a `NotAfk` session is never stored.
    pub state: AfkState,
    /// Set on the transition into `Afk`.
    pub started_at: Option<DateTime<Utc>>,
    /// Where to send the player when they leave AFK.
    pub pre_afk_position: Position,
    /// Rebuilt from the store at startup rather than entered this run.
    pub restored: bool,
}

/// How a successful quit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOutcome {
    /// The player was still counting down; the countdown was cancelled.
    EntryCancelled,
    /// The player was AFK and has left.
    Left,
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

pub struct SessionManager {
    settings: AfkSettings,
    collaborators: Collaborators,
    location: AfkLocation,
    persist: PersistHandle,

    sessions: DashMap<PlayerId, Session>,
    /// Present exactly while the session is `EnteringAfk`.
    pending: DashMap<PlayerId, PendingEntry>,
    /// Present exactly while the session is `Afk`.
    earning: DashMap<PlayerId, EarningTimer>,
}

impl SessionManager {
    pub fn new(
        settings: AfkSettings,
        collaborators: Collaborators,
        location: AfkLocation,
        persist: PersistHandle,
    ) -> Self {
        let settings = settings.validated();
        if settings.relocation == RelocationMode::CrossNode
            && !collaborators.relocation.is_enabled()
        {
            warn!("cross-node relocation configured but the relocation gate is disabled, using local");
        }
        Self {
            settings,
            collaborators,
            location,
            persist,
            sessions: DashMap::new(),
            pending: DashMap::new(),
            earning: DashMap::new(),
        }
    }

    // -- Entry ------------------------------------------------------------

    /// Starts the entry countdown for `player`.
    ///
    /// Preconditions are checked in order and the first failure wins:
    /// already AFK, already counting down, outside a mandatory region,
    /// no AFK location in legacy mode, no known position. The rejection
    /// notice goes to the player.
    ///
    /// Returns the countdown length in ticks.
    pub fn start_afk_process(&self, player: PlayerId) -> Result<u32, Rejection> {
        let anchor = match self.check_start(player) {
            Ok(anchor) => anchor,
            Err(rejection) => {
                debug!(%player, reason = %rejection, "AFK start rejected");
                self.notify_rejection(player, &rejection);
                return Err(rejection);
            }
        };

        let ticks = self.settings.countdown_ticks;
        self.pending
            .insert(player, PendingEntry::new(anchor.clone(), ticks));
        self.sessions.insert(
            player,
            Session {
                player,
                state: AfkState::EnteringAfk,
                started_at: None,
                pre_afk_position: anchor,
                restored: false,
            },
        );

        self.collaborators
            .notifier
            .notify(player, &Notice::Entering { seconds: ticks });
        info!(%player, ticks, "AFK countdown started");
        Ok(ticks)
    }

    fn check_start(&self, player: PlayerId) -> Result<Position, Rejection> {
        match self.state(player) {
            AfkState::Afk => return Err(Rejection::AlreadyAfk),
            AfkState::EnteringAfk => return Err(Rejection::AlreadyPending),
            AfkState::NotAfk => {}
        }

        let region_required = self.collaborators.region_required();
        if region_required && !self.collaborators.regions.is_in_designated_zone(player) {
            return Err(Rejection::RegionRequired);
        }
        if !region_required && !self.location.is_set() {
            return Err(Rejection::NoLocation);
        }

        self.collaborators.locate(player).ok_or(Rejection::Offline)
    }

    /// Cancels a running countdown. No-op (returning `false`) unless the
    /// player is entering AFK. Sends no notice; callers decide which one
    /// fits.
    pub fn cancel_afk_process(&self, player: PlayerId) -> bool {
        let had_entry = self.pending.remove(&player).is_some();
        let had_session = self
            .sessions
            .remove_if(&player, |_, s| s.state == AfkState::EnteringAfk)
            .is_some();

        let cancelled = had_entry || had_session;
        if cancelled {
            info!(%player, "AFK countdown cancelled");
        }
        cancelled
    }

    /// Countdown reached zero.
    fn complete_afk_process(&self, player: PlayerId) {
        let Some((_, entry)) = self.pending.remove(&player) else {
            return;
        };
        let anchor = entry.anchor;

        self.persist.submit(PersistWrite::SavePosition {
            player,
            position: anchor.clone(),
        });
        self.relocate_to_afk(player);

        let started_at = Utc::now();
        self.sessions.insert(
            player,
            Session {
                player,
                state: AfkState::Afk,
                started_at: Some(started_at),
                pre_afk_position: anchor,
                restored: false,
            },
        );
        self.persist
            .submit(PersistWrite::SaveSession { player, started_at });
        self.earning
            .insert(player, EarningTimer::new(self.settings.earn_interval_ticks));

        self.collaborators.notifier.notify(player, &Notice::Started);
        info!(%player, "player is now AFK");
    }

    // -- Exit -------------------------------------------------------------

    /// Leaves AFK (or abandons a countdown) at the player's request.
    ///
    /// From `Afk` the player is sent back where they came from; a failed
    /// move is logged and the session is removed anyway.
    pub fn quit_afk(&self, player: PlayerId) -> Result<QuitOutcome, Rejection> {
        if self.is_pending_afk(player) {
            self.cancel_afk_process(player);
            self.collaborators.notifier.notify(player, &Notice::Cancelled);
            return Ok(QuitOutcome::EntryCancelled);
        }

        let Some((_, session)) = self
            .sessions
            .remove_if(&player, |_, s| s.state == AfkState::Afk)
        else {
            self.notify_rejection(player, &Rejection::NotAfk);
            return Err(Rejection::NotAfk);
        };
        self.earning.remove(&player);

        self.relocate_back(player, &session.pre_afk_position);
        self.persist.submit(PersistWrite::RemoveSession { player });

        self.collaborators.notifier.notify(player, &Notice::Quit);
        info!(%player, "player left AFK");
        Ok(QuitOutcome::Left)
    }

    /// Forces `player` to `NotAfk` with no relocation and no notice.
    ///
    /// Used on disconnect and for stale sessions. Returns whether there
    /// was anything to remove; when there wasn't, nothing is written.
    pub fn remove_afk_data(&self, player: PlayerId) -> bool {
        let had_entry = self.pending.remove(&player).is_some();
        let had_timer = self.earning.remove(&player).is_some();
        let removed = self.sessions.remove(&player);

        if removed.is_none() && !had_entry && !had_timer {
            return false;
        }

        self.persist.submit(PersistWrite::RemoveSession { player });
        if self.collaborators.relocation.is_enabled() {
            self.collaborators.relocation.forget(player);
        }
        info!(
            %player,
            state = ?removed.map(|(_, s)| s.state),
            "AFK data removed"
        );
        true
    }

    // -- Relocation -------------------------------------------------------

    fn cross_node(&self) -> bool {
        self.settings.relocation == RelocationMode::CrossNode
            && self.collaborators.relocation.is_enabled()
    }

    fn relocate_to_afk(&self, player: PlayerId) {
        let result = if self.cross_node() {
            self.collaborators.relocation.send_to_afk_node(player)
        } else if self.collaborators.region_required() {
            // Region mode: the player is already standing where they AFK.
            return;
        } else if let Some(target) = self.location.get() {
            self.collaborators.world.teleport(player, &target)
        } else {
            return;
        };

        if let Err(e) = result {
            warn!(%player, error = %e, "relocation to AFK failed, staying in place");
        }
    }

    fn relocate_back(&self, player: PlayerId, origin: &Position) {
        let result = if self.cross_node() {
            self.collaborators.relocation.return_to_origin(player)
        } else if self.collaborators.region_required() {
            return;
        } else {
            self.collaborators.world.teleport(player, origin)
        };

        if let Err(e) = result {
            warn!(%player, error = %e, "return from AFK failed");
        }
    }

    // -- Ticking ----------------------------------------------------------

    /// Advances one countdown by a tick.
    ///
    /// An offline player (or a countdown already torn down) stops
    /// silently. A player who moved gets the movement notice and is
    /// cancelled. Otherwise the counter drops, progress is reported, and
    /// at zero the player enters AFK.
    pub fn tick_countdown(&self, player: PlayerId) {
        let Some(current) = self.collaborators.locate(player) else {
            if self.cancel_afk_process(player) {
                debug!(%player, "countdown stopped, player offline");
            }
            return;
        };

        let tolerance = self.settings.movement_tolerance;
        let step = match self.pending.get_mut(&player) {
            Some(mut entry) => entry.advance(&current, tolerance),
            None => {
                self.cancel_afk_process(player);
                return;
            }
        };

        let notifier = &self.collaborators.notifier;
        match step {
            CountdownStep::Continue { remaining, total } => {
                notifier.progress(player, remaining, total);
                trace!(%player, remaining, "countdown tick");
            }
            CountdownStep::Moved => {
                notifier.notify(player, &Notice::CancelledMovement);
                self.cancel_afk_process(player);
            }
            CountdownStep::Complete { total } => {
                notifier.progress(player, 0, total);
                self.complete_afk_process(player);
            }
        }
    }

    /// Advances one earning timer by a tick. Returns `true` when a
    /// payout was made.
    ///
    /// A player no longer AFK loses the timer. An offline player, or one
    /// outside a mandatory region, doesn't count down this tick.
    pub fn tick_earning(&self, player: PlayerId) -> bool {
        if !self.is_afk(player) {
            self.earning.remove(&player);
            return false;
        }
        if !self.collaborators.world.is_online(player) {
            return false;
        }
        if self.collaborators.region_required()
            && !self.collaborators.regions.is_in_designated_zone(player)
        {
            trace!(%player, "outside AFK region, payout paused");
            return false;
        }

        let due = match self.earning.get_mut(&player) {
            Some(mut timer) => timer.advance(),
            None => return false,
        };
        if !due {
            return false;
        }

        let amount = self.settings.earn_amount;
        self.collaborators.rewards.grant(player, amount);
        self.collaborators
            .notifier
            .notify(player, &Notice::Earned { amount });
        self.collaborators.world.play_cue(player, Cue::Payout);
        debug!(%player, amount, "AFK payout");
        true
    }

    /// Runs one tick for every countdown and earning timer whose player
    /// satisfies `owns`.
    ///
    /// Both player sets are captured before anything runs, so a player
    /// who completes entry this tick starts earning on the next one.
    pub fn tick(&self, owns: impl Fn(PlayerId) -> bool) {
        let counting: Vec<PlayerId> = self
            .pending
            .iter()
            .map(|e| *e.key())
            .filter(|p| owns(*p))
            .collect();
        let earning: Vec<PlayerId> = self
            .earning
            .iter()
            .map(|e| *e.key())
            .filter(|p| owns(*p))
            .collect();

        for player in counting {
            self.tick_countdown(player);
        }
        for player in earning {
            self.tick_earning(player);
        }
    }

    // -- Startup ----------------------------------------------------------

    /// Reinstates AFK sessions read back from the store.
    ///
    /// Each gets its original start time and a fresh earning timer. The
    /// return point is the saved last-known position, or failing that
    /// wherever the player stands now. Returns how many were restored.
    pub fn restore(&self, recovered: Vec<RecoveredSession>) -> usize {
        let mut restored = 0;
        for r in recovered {
            if self.sessions.contains_key(&r.player) {
                continue;
            }
            let Some(pre_afk_position) = r
                .last_position
                .or_else(|| self.collaborators.locate(r.player))
            else {
                warn!(player = %r.player, "no position to restore AFK session with, skipping");
                continue;
            };

            self.sessions.insert(
                r.player,
                Session {
                    player: r.player,
                    state: AfkState::Afk,
                    started_at: Some(r.started_at),
                    pre_afk_position,
                    restored: true,
                },
            );
            self.earning
                .insert(r.player, EarningTimer::new(self.settings.earn_interval_ticks));
            restored += 1;
        }
        if restored > 0 {
            info!(restored, "AFK sessions restored");
        }
        restored
    }

    // -- AFK location -----------------------------------------------------

    /// Admin: places the AFK location. Orientation is dropped. Worlds on
    /// the blocked list are refused.
    pub fn set_afk_location(&self, actor: PlayerId, position: Position) -> Result<(), Rejection> {
        if self.settings.is_world_blocked(&position.world) {
            let rejection = Rejection::BlockedWorld(position.world);
            self.notify_rejection(actor, &rejection);
            return Err(rejection);
        }

        let location = position.with_rotation(0.0, 0.0);
        self.location.set(location.clone());
        self.persist
            .submit(PersistWrite::SaveLocation(location.clone()));
        self.collaborators
            .notifier
            .notify(actor, &Notice::LocationSet);
        info!(%actor, %location, "AFK location set");
        Ok(())
    }

    /// Admin: clears the AFK location. Returns whether one was set.
    pub fn remove_afk_location(&self, actor: PlayerId) -> bool {
        let previous = self.location.clear();
        self.persist.submit(PersistWrite::ClearLocation);
        self.collaborators
            .notifier
            .notify(actor, &Notice::LocationRemoved);
        info!(%actor, had_location = previous.is_some(), "AFK location removed");
        previous.is_some()
    }

    /// Replaces the in-memory location without writing it back.
    pub fn reload_afk_location(&self, value: Option<Position>) {
        debug!(has_location = value.is_some(), "AFK location reloaded");
        self.location.reload(value);
    }

    // -- Queries ----------------------------------------------------------

    pub fn state(&self, player: PlayerId) -> AfkState {
        self.sessions
            .get(&player)
            .map_or(AfkState::NotAfk, |s| s.state)
    }

    pub fn is_afk(&self, player: PlayerId) -> bool {
        self.state(player) == AfkState::Afk
    }

    pub fn is_pending_afk(&self, player: PlayerId) -> bool {
        self.state(player) == AfkState::EnteringAfk
    }

    /// AFK only because a session was restored at startup; the player
    /// never entered AFK during this run.
    pub fn is_stale_afk(&self, player: PlayerId) -> bool {
        self.sessions
            .get(&player)
            .is_some_and(|s| s.state == AfkState::Afk && s.restored)
    }

    pub fn session(&self, player: PlayerId) -> Option<Session> {
        self.sessions.get(&player).map(|s| s.clone())
    }

    /// Ticks left on the player's countdown.
    pub fn pending_remaining(&self, player: PlayerId) -> Option<u32> {
        self.pending.get(&player).map(|e| e.remaining_ticks)
    }

    /// Ticks left until the player's next payout.
    pub fn earning_remaining(&self, player: PlayerId) -> Option<u32> {
        self.earning.get(&player).map(|t| t.remaining_ticks)
    }

    pub fn has_player_moved(&self, anchor: &Position, current: &Position) -> bool {
        has_moved(anchor, current, self.settings.movement_tolerance)
    }

    pub fn afk_count(&self) -> usize {
        self.earning.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn settings(&self) -> &AfkSettings {
        &self.settings
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn location(&self) -> &AfkLocation {
        &self.location
    }

    fn notify_rejection(&self, player: PlayerId, rejection: &Rejection) {
        if let Some(notice) = rejection.notice() {
            self.collaborators.notifier.notify(player, &notice);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the transitions. Longer multi-tick scenarios live
    //! in `tests/lifecycle.rs`.

    use afkshards_store::PersistInbox;

    use super::*;
    use crate::testing::Recorders;

    // -- Helpers ----------------------------------------------------------

    fn spawn_pos() -> Position {
        Position::new("world", 0.0, 64.0, 0.0)
    }

    fn afk_spot() -> Position {
        Position::new("world", 500.0, 80.0, 500.0)
    }

    fn manager(rec: &Recorders) -> (SessionManager, PersistInbox) {
        let (persist, inbox) = PersistHandle::channel(64);
        let mgr = SessionManager::new(
            AfkSettings::default(),
            rec.collaborators(),
            AfkLocation::new(Some(afk_spot())),
            persist,
        );
        (mgr, inbox)
    }

    fn online(rec: &Recorders) -> PlayerId {
        let p = PlayerId::new_v4();
        rec.world.join(p, spawn_pos());
        p
    }

    // =====================================================================
    // start_afk_process()
    // =====================================================================

    #[test]
    fn test_start_fresh_player_enters_countdown() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        let p = online(&rec);

        assert_eq!(mgr.start_afk_process(p), Ok(5));

        assert!(mgr.is_pending_afk(p));
        assert!(!mgr.is_afk(p));
        assert_eq!(mgr.pending_remaining(p), Some(5));
        assert_eq!(rec.notices.last_for(p), Some(Notice::Entering { seconds: 5 }));
    }

    #[test]
    fn test_start_twice_rejects_with_movement_notice() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        let p = online(&rec);
        mgr.start_afk_process(p).unwrap();

        assert_eq!(mgr.start_afk_process(p), Err(Rejection::AlreadyPending));
        assert_eq!(rec.notices.last_for(p), Some(Notice::CancelledMovement));
        assert_eq!(mgr.pending_remaining(p), Some(5));
    }

    #[test]
    fn test_start_without_location_rejects() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        mgr.reload_afk_location(None);
        let p = online(&rec);

        assert_eq!(mgr.start_afk_process(p), Err(Rejection::NoLocation));
        assert_eq!(mgr.state(p), AfkState::NotAfk);
    }

    #[test]
    fn test_start_offline_player_rejects_silently() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        let p = PlayerId::new_v4();

        assert_eq!(mgr.start_afk_process(p), Err(Rejection::Offline));
        assert!(rec.notices.for_player(p).is_empty());
    }

    // =====================================================================
    // cancel_afk_process()
    // =====================================================================

    #[test]
    fn test_cancel_pending_returns_true_and_clears() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        let p = online(&rec);
        mgr.start_afk_process(p).unwrap();

        assert!(mgr.cancel_afk_process(p));
        assert!(!mgr.cancel_afk_process(p));
        assert_eq!(mgr.state(p), AfkState::NotAfk);
        assert_eq!(mgr.pending_remaining(p), None);
    }

    // =====================================================================
    // tick_countdown()
    // =====================================================================

    #[test]
    fn test_tick_countdown_reports_progress() {
        let rec = Recorders::new();
        let (mgr, _inbox) = manager(&rec);
        let p = online(&rec);
        mgr.start_afk_process(p).unwrap();

        mgr.tick_countdown(p);
        mgr.tick_countdown(p);

        assert_eq!(rec.notices.progress_for(p), vec![(4, 5), (3, 5)]);
    }

    #[test]
    fn test_tick_countdown_completion_persists_position_then_session() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let p = online(&rec);
        mgr.start_afk_process(p).unwrap();

        for _ in 0..5 {
            mgr.tick_countdown(p);
        }

        let writes = inbox.drain();
        assert_eq!(writes.len(), 2);
        assert_eq!(
            writes[0],
            PersistWrite::SavePosition {
                player: p,
                position: spawn_pos()
            }
        );
        assert!(matches!(writes[1], PersistWrite::SaveSession { player, .. } if player == p));
    }

    // =====================================================================
    // quit_afk()
    // =====================================================================

    #[test]
    fn test_quit_not_afk_rejects() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let p = online(&rec);

        assert_eq!(mgr.quit_afk(p), Err(Rejection::NotAfk));
        assert_eq!(rec.notices.last_for(p), Some(Notice::NotAfk));
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_quit_during_countdown_cancels_with_notice() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let p = online(&rec);
        mgr.start_afk_process(p).unwrap();

        assert_eq!(mgr.quit_afk(p), Ok(QuitOutcome::EntryCancelled));
        assert_eq!(rec.notices.last_for(p), Some(Notice::Cancelled));
        assert!(inbox.drain().is_empty());
    }

    // =====================================================================
    // remove_afk_data()
    // =====================================================================

    #[test]
    fn test_remove_afk_data_not_afk_is_noop() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let p = online(&rec);

        assert!(!mgr.remove_afk_data(p));
        assert!(inbox.drain().is_empty());
        assert!(rec.notices.for_player(p).is_empty());
    }

    // =====================================================================
    // AFK location
    // =====================================================================

    #[test]
    fn test_set_afk_location_blocked_world_rejected() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let admin = online(&rec);

        let result = mgr.set_afk_location(admin, Position::new("world_nether", 0.0, 64.0, 0.0));

        assert_eq!(result, Err(Rejection::BlockedWorld("world_nether".into())));
        assert_eq!(mgr.location().get(), Some(afk_spot()));
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn test_set_afk_location_strips_rotation_and_persists() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let admin = online(&rec);
        let spot = Position::new("world", 1.0, 70.0, 1.0).with_rotation(90.0, 10.0);

        mgr.set_afk_location(admin, spot).unwrap();

        let stored = Position::new("world", 1.0, 70.0, 1.0);
        assert_eq!(mgr.location().get(), Some(stored.clone()));
        assert_eq!(inbox.drain(), vec![PersistWrite::SaveLocation(stored)]);
        assert_eq!(rec.notices.last_for(admin), Some(Notice::LocationSet));
    }

    #[test]
    fn test_remove_afk_location_clears_and_persists() {
        let rec = Recorders::new();
        let (mgr, mut inbox) = manager(&rec);
        let admin = online(&rec);

        assert!(mgr.remove_afk_location(admin));

        assert!(!mgr.location().is_set());
        assert_eq!(inbox.drain(), vec![PersistWrite::ClearLocation]);
        assert_eq!(rec.notices.last_for(admin), Some(Notice::LocationRemoved));
    }
}
