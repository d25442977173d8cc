//! Error types for the session layer.

use afkshards_types::{Notice, PlayerId};

/// Why a lifecycle request was turned down.
///
/// Rejections are ordinary outcomes, not failures: state is unchanged
/// and the player has already been told (see [`Rejection::notice`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("player is already AFK")]
    AlreadyAfk,

    /// A countdown is already running for this player.
    #[error("AFK countdown already running")]
    AlreadyPending,

    /// Regions are mandatory and the player stands outside every AFK
    /// zone.
    #[error("player must stand in an AFK region")]
    RegionRequired,

    /// Legacy mode without an AFK location set.
    #[error("no AFK location configured")]
    NoLocation,

    #[error("player is not AFK")]
    NotAfk,

    /// The host has no position for the player, so they can't be
    /// anchored.
    #[error("player is offline")]
    Offline,

    /// An admin tried to put the AFK location in a blocked world.
    #[error("AFK location not allowed in world {0}")]
    BlockedWorld(String),
}

impl Rejection {
    /// The notice sent to the requesting player, if any.
    ///
    /// A second start request during a countdown answers with the
    /// movement-cancel notice; it only signals that nothing new
    /// happened.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::AlreadyAfk => Some(Notice::AlreadyAfk),
            Self::AlreadyPending => Some(Notice::CancelledMovement),
            Self::RegionRequired => Some(Notice::RegionRequired),
            Self::NoLocation => Some(Notice::NoLocation),
            Self::NotAfk => Some(Notice::NotAfk),
            Self::Offline => None,
            Self::BlockedWorld(world) => Some(Notice::LocationBlocked {
                world: world.clone(),
            }),
        }
    }
}

/// A teleport or cross-node move that didn't happen.
///
/// Always logged and then ignored: the state transition that asked for
/// the move completes regardless.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelocationError {
    #[error("player {0} is offline")]
    Offline(PlayerId),

    /// The target world isn't loaded on this node.
    #[error("world {0} is not available")]
    WorldUnavailable(String),

    /// The host or proxy refused the move.
    #[error("relocation rejected: {0}")]
    Rejected(String),
}
