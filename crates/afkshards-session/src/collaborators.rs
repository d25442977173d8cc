//! The host-side services the lifecycle depends on.
//!
//! The session manager never reaches into the game server directly. It
//! asks these traits:
//!
//! - [`PlayerWorld`]: presence, position, teleports, sound cues
//! - [`RegionGate`]: AFK-zone membership and region policy
//! - [`RelocationGate`]: moves to and from a dedicated AFK node
//! - [`RewardSink`]: where earned shards go
//! - [`NotificationSink`]: what the player is told
//!
//! Every method is synchronous and must return quickly: they run on the
//! shard actor's tick. Anything slow (a proxy round-trip, a currency
//! write) should be queued by the implementation and return at once.

use std::sync::Arc;

use afkshards_types::{Cue, Notice, PlayerId, Position};
use tracing::{debug, info, warn};

use crate::RelocationError;

/// Presence and position of connected players.
pub trait PlayerWorld: Send + Sync + 'static {
    fn is_online(&self, player: PlayerId) -> bool;

    /// Current position, `None` when the player isn't connected.
    fn position(&self, player: PlayerId) -> Option<Position>;

    /// Moves the player on this node.
    fn teleport(&self, player: PlayerId, to: &Position) -> Result<(), RelocationError>;

    fn play_cue(&self, player: PlayerId, cue: Cue);
}

/// Region policy. Pure queries, no side effects.
pub trait RegionGate: Send + Sync + 'static {
    /// Whether region support is active at all. When `false` every other
    /// answer is ignored.
    fn is_enabled(&self) -> bool;

    /// Whether standing in an AFK zone is mandatory to enter and to earn.
    fn requires_region(&self) -> bool;

    fn is_in_designated_zone(&self, player: PlayerId) -> bool;

    /// Start the countdown automatically on entering a zone.
    fn auto_start_enabled(&self) -> bool;

    /// End AFK automatically on leaving a zone.
    fn auto_stop_enabled(&self) -> bool;
}

/// Cross-node relocation. Fire-and-forget from the manager's side.
pub trait RelocationGate: Send + Sync + 'static {
    fn is_enabled(&self) -> bool;

    /// Sends the player to the AFK node, remembering where they came
    /// from.
    fn send_to_afk_node(&self, player: PlayerId) -> Result<(), RelocationError>;

    /// Sends the player back to the node they came from.
    fn return_to_origin(&self, player: PlayerId) -> Result<(), RelocationError>;

    /// Drops any remembered origin for the player.
    fn forget(&self, player: PlayerId);
}

/// Receives earned shards.
pub trait RewardSink: Send + Sync + 'static {
    fn grant(&self, player: PlayerId, amount: u64);
}

/// Delivers notices to players.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, player: PlayerId, notice: &Notice);

    /// Countdown display: `remaining` of `total` ticks left.
    fn progress(&self, player: PlayerId, remaining: u32, total: u32);
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Region support switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegions;

impl RegionGate for NoRegions {
    fn is_enabled(&self) -> bool {
        false
    }

    fn requires_region(&self) -> bool {
        false
    }

    fn is_in_designated_zone(&self, _player: PlayerId) -> bool {
        false
    }

    fn auto_start_enabled(&self) -> bool {
        false
    }

    fn auto_stop_enabled(&self) -> bool {
        false
    }
}

/// Single-node deployment: no cross-node moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelocation;

impl RelocationGate for NoRelocation {
    fn is_enabled(&self) -> bool {
        false
    }

    fn send_to_afk_node(&self, player: PlayerId) -> Result<(), RelocationError> {
        Err(RelocationError::Rejected(format!(
            "cross-node relocation disabled, cannot move {player}"
        )))
    }

    fn return_to_origin(&self, player: PlayerId) -> Result<(), RelocationError> {
        Err(RelocationError::Rejected(format!(
            "cross-node relocation disabled, cannot return {player}"
        )))
    }

    fn forget(&self, _player: PlayerId) {}
}

/// Writes notices to the log as JSON payloads. Useful headless and as a
/// fallback until the host wires real messaging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, player: PlayerId, notice: &Notice) {
        match notice.to_json() {
            Ok(payload) => info!(%player, key = notice.key(), %payload, "notice"),
            Err(e) => warn!(%player, key = notice.key(), error = %e, "notice not serializable"),
        }
    }

    fn progress(&self, player: PlayerId, remaining: u32, total: u32) {
        debug!(%player, remaining, total, "countdown progress");
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Every collaborator the engine needs, shared by all shards.
#[derive(Clone)]
pub struct Collaborators {
    pub world: Arc<dyn PlayerWorld>,
    pub regions: Arc<dyn RegionGate>,
    pub relocation: Arc<dyn RelocationGate>,
    pub rewards: Arc<dyn RewardSink>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// The two collaborators every host must supply. Regions and
    /// cross-node relocation start disabled; notices go to the log.
    pub fn new(world: Arc<dyn PlayerWorld>, rewards: Arc<dyn RewardSink>) -> Self {
        Self {
            world,
            regions: Arc::new(NoRegions),
            relocation: Arc::new(NoRelocation),
            rewards,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_regions(mut self, regions: Arc<dyn RegionGate>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_relocation(mut self, relocation: Arc<dyn RelocationGate>) -> Self {
        self.relocation = relocation;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Regions are on and standing in one is mandatory.
    pub fn region_required(&self) -> bool {
        self.regions.is_enabled() && self.regions.requires_region()
    }

    /// Online and with a known position.
    pub fn locate(&self, player: PlayerId) -> Option<Position> {
        if self.world.is_online(player) {
            self.world.position(player)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("regions_enabled", &self.regions.is_enabled())
            .field("relocation_enabled", &self.relocation.is_enabled())
            .finish_non_exhaustive()
    }
}
