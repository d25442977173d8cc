//! Recording collaborators.
//!
//! In-process stand-ins for every collaborator trait. They keep a log of
//! what the lifecycle asked for, so tests (and dry runs of a host
//! integration) can assert on teleports, payouts and notices without a
//! game server. [`Recorders`] bundles one of each.
//!
//! Only built for this crate's tests or with the `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use afkshards_types::{Cue, Notice, PlayerId, Position};

use crate::{
    Collaborators, NotificationSink, PlayerWorld, RegionGate, RelocationError, RelocationGate,
    RewardSink,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// FakeWorld
// ---------------------------------------------------------------------------

/// Online players and where they stand.
#[derive(Debug, Default)]
pub struct FakeWorld {
    players: Mutex<HashMap<PlayerId, Position>>,
    teleports: Mutex<Vec<(PlayerId, Position)>>,
    cues: Mutex<Vec<(PlayerId, Cue)>>,
    fail_teleports: AtomicBool,
}

impl FakeWorld {
    /// Connects `player` at `at`.
    pub fn join(&self, player: PlayerId, at: Position) {
        lock(&self.players).insert(player, at);
    }

    pub fn leave(&self, player: PlayerId) {
        lock(&self.players).remove(&player);
    }

    /// Moves an online player. Ignored for offline players.
    pub fn move_to(&self, player: PlayerId, to: Position) {
        if let Some(pos) = lock(&self.players).get_mut(&player) {
            *pos = to;
        }
    }

    pub fn fail_teleports(&self, failing: bool) {
        self.fail_teleports.store(failing, Ordering::SeqCst);
    }

    /// Every successful teleport, oldest first.
    pub fn teleports(&self) -> Vec<(PlayerId, Position)> {
        lock(&self.teleports).clone()
    }

    pub fn cues(&self) -> Vec<(PlayerId, Cue)> {
        lock(&self.cues).clone()
    }
}

impl PlayerWorld for FakeWorld {
    fn is_online(&self, player: PlayerId) -> bool {
        lock(&self.players).contains_key(&player)
    }

    fn position(&self, player: PlayerId) -> Option<Position> {
        lock(&self.players).get(&player).cloned()
    }

    fn teleport(&self, player: PlayerId, to: &Position) -> Result<(), RelocationError> {
        if self.fail_teleports.load(Ordering::SeqCst) {
            return Err(RelocationError::WorldUnavailable(to.world.clone()));
        }
        let mut players = lock(&self.players);
        let Some(pos) = players.get_mut(&player) else {
            return Err(RelocationError::Offline(player));
        };
        *pos = to.clone();
        drop(players);
        lock(&self.teleports).push((player, to.clone()));
        Ok(())
    }

    fn play_cue(&self, player: PlayerId, cue: Cue) {
        lock(&self.cues).push((player, cue));
    }
}

// ---------------------------------------------------------------------------
// FakeRegions
// ---------------------------------------------------------------------------

/// Region policy toggles plus the set of players inside a zone.
#[derive(Debug, Default)]
pub struct FakeRegions {
    enabled: AtomicBool,
    required: AtomicBool,
    auto_start: AtomicBool,
    auto_stop: AtomicBool,
    inside: Mutex<HashSet<PlayerId>>,
}

impl FakeRegions {
    /// Regions on, and mandatory.
    pub fn mandatory() -> Self {
        let regions = Self::default();
        regions.enabled.store(true, Ordering::SeqCst);
        regions.required.store(true, Ordering::SeqCst);
        regions
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_required(&self, required: bool) {
        self.required.store(required, Ordering::SeqCst);
    }

    pub fn set_auto_start(&self, on: bool) {
        self.auto_start.store(on, Ordering::SeqCst);
    }

    pub fn set_auto_stop(&self, on: bool) {
        self.auto_stop.store(on, Ordering::SeqCst);
    }

    pub fn set_inside(&self, player: PlayerId, inside: bool) {
        let mut set = lock(&self.inside);
        if inside {
            set.insert(player);
        } else {
            set.remove(&player);
        }
    }
}

impl RegionGate for FakeRegions {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn requires_region(&self) -> bool {
        self.required.load(Ordering::SeqCst)
    }

    fn is_in_designated_zone(&self, player: PlayerId) -> bool {
        lock(&self.inside).contains(&player)
    }

    fn auto_start_enabled(&self) -> bool {
        self.auto_start.load(Ordering::SeqCst)
    }

    fn auto_stop_enabled(&self) -> bool {
        self.auto_stop.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// FakeRelocation
// ---------------------------------------------------------------------------

/// One call made to a [`RelocationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationCall {
    SendToAfkNode(PlayerId),
    ReturnToOrigin(PlayerId),
    Forget(PlayerId),
}

#[derive(Debug, Default)]
pub struct FakeRelocation {
    enabled: AtomicBool,
    failing: AtomicBool,
    calls: Mutex<Vec<RelocationCall>>,
}

impl FakeRelocation {
    pub fn enabled() -> Self {
        let gate = Self::default();
        gate.enabled.store(true, Ordering::SeqCst);
        gate
    }

    /// Makes moves fail (they are still recorded).
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RelocationCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: RelocationCall) -> Result<(), RelocationError> {
        lock(&self.calls).push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(RelocationError::Rejected("proxy unreachable".into()))
        } else {
            Ok(())
        }
    }
}

impl RelocationGate for FakeRelocation {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn send_to_afk_node(&self, player: PlayerId) -> Result<(), RelocationError> {
        self.record(RelocationCall::SendToAfkNode(player))
    }

    fn return_to_origin(&self, player: PlayerId) -> Result<(), RelocationError> {
        self.record(RelocationCall::ReturnToOrigin(player))
    }

    fn forget(&self, player: PlayerId) {
        lock(&self.calls).push(RelocationCall::Forget(player));
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingRewards {
    grants: Mutex<Vec<(PlayerId, u64)>>,
}

impl RecordingRewards {
    pub fn grants(&self) -> Vec<(PlayerId, u64)> {
        lock(&self.grants).clone()
    }

    /// Sum of everything granted to `player`.
    pub fn total_for(&self, player: PlayerId) -> u64 {
        lock(&self.grants)
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, amount)| amount)
            .sum()
    }
}

impl RewardSink for RecordingRewards {
    fn grant(&self, player: PlayerId, amount: u64) {
        lock(&self.grants).push((player, amount));
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(PlayerId, Notice)>>,
    progress: Mutex<Vec<(PlayerId, u32, u32)>>,
}

impl RecordingNotifier {
    /// Notices sent to `player`, oldest first.
    pub fn for_player(&self, player: PlayerId) -> Vec<Notice> {
        lock(&self.notices)
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Notice keys sent to `player`, oldest first.
    pub fn keys_for(&self, player: PlayerId) -> Vec<&'static str> {
        self.for_player(player).iter().map(Notice::key).collect()
    }

    pub fn last_for(&self, player: PlayerId) -> Option<Notice> {
        self.for_player(player).pop()
    }

    /// `(remaining, total)` progress updates for `player`.
    pub fn progress_for(&self, player: PlayerId) -> Vec<(u32, u32)> {
        lock(&self.progress)
            .iter()
            .filter(|(p, _, _)| *p == player)
            .map(|(_, remaining, total)| (*remaining, *total))
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.notices).clear();
        lock(&self.progress).clear();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, player: PlayerId, notice: &Notice) {
        lock(&self.notices).push((player, notice.clone()));
    }

    fn progress(&self, player: PlayerId, remaining: u32, total: u32) {
        lock(&self.progress).push((player, remaining, total));
    }
}

// ---------------------------------------------------------------------------
// Recorders
// ---------------------------------------------------------------------------

/// One of each recording collaborator, with handles kept for assertions.
#[derive(Debug, Clone, Default)]
pub struct Recorders {
    pub world: Arc<FakeWorld>,
    pub regions: Arc<FakeRegions>,
    pub relocation: Arc<FakeRelocation>,
    pub rewards: Arc<RecordingRewards>,
    pub notices: Arc<RecordingNotifier>,
}

impl Recorders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region support on and mandatory.
    pub fn with_mandatory_regions() -> Self {
        Self {
            regions: Arc::new(FakeRegions::mandatory()),
            ..Self::default()
        }
    }

    /// Cross-node relocation available.
    pub fn with_cross_node() -> Self {
        Self {
            relocation: Arc::new(FakeRelocation::enabled()),
            ..Self::default()
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            world: self.world.clone(),
            regions: self.regions.clone(),
            relocation: self.relocation.clone(),
            rewards: self.rewards.clone(),
            notifier: self.notices.clone(),
        }
    }
}
