//! User-visible outcomes.
//!
//! The lifecycle engine never formats text. It emits a [`Notice`] and
//! the host's notification sink maps [`Notice::key`] to a message
//! template, substituting [`Notice::params`].

use serde::{Deserialize, Serialize};

/// Every outcome the engine reports to a player or admin.
///
/// Serializes as `{"key": "afk.entering", "seconds": 5}` so hosts that
/// forward notices over a plugin channel get a self-describing payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key")]
pub enum Notice {
    /// Countdown started.
    #[serde(rename = "afk.entering")]
    Entering { seconds: u32 },
    /// Countdown finished, player is now AFK.
    #[serde(rename = "afk.started")]
    Started,
    /// Countdown aborted because the player moved or teleported. Also
    /// the reply to a second start request while one is pending.
    #[serde(rename = "afk.cancelled-movement")]
    CancelledMovement,
    /// Countdown aborted by an explicit quit.
    #[serde(rename = "afk.cancelled")]
    Cancelled,
    #[serde(rename = "afk.region-required")]
    RegionRequired,
    #[serde(rename = "afk.no-location")]
    NoLocation,
    #[serde(rename = "afk.already")]
    AlreadyAfk,
    #[serde(rename = "afk.not-afk")]
    NotAfk,
    #[serde(rename = "afk.quit")]
    Quit,
    /// One payout landed.
    #[serde(rename = "afk.earned")]
    Earned { amount: u64 },
    /// A stale session from an unclean shutdown was cleared on join.
    #[serde(rename = "afk.auto-stopped")]
    AutoStopped,
    #[serde(rename = "afk.region-entered")]
    RegionEntered,
    #[serde(rename = "afk.region-left")]
    RegionLeft,
    /// An action was vetoed because the player is AFK.
    #[serde(rename = "afk.blocked")]
    Blocked,
    #[serde(rename = "admin.location-set")]
    LocationSet,
    #[serde(rename = "admin.location-removed")]
    LocationRemoved,
    /// The admin tried to place the AFK location in a blocked world.
    #[serde(rename = "admin.location-blocked")]
    LocationBlocked { world: String },
}

impl Notice {
    /// The message-template key for this notice.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Entering { .. } => "afk.entering",
            Self::Started => "afk.started",
            Self::CancelledMovement => "afk.cancelled-movement",
            Self::Cancelled => "afk.cancelled",
            Self::RegionRequired => "afk.region-required",
            Self::NoLocation => "afk.no-location",
            Self::AlreadyAfk => "afk.already",
            Self::NotAfk => "afk.not-afk",
            Self::Quit => "afk.quit",
            Self::Earned { .. } => "afk.earned",
            Self::AutoStopped => "afk.auto-stopped",
            Self::RegionEntered => "afk.region-entered",
            Self::RegionLeft => "afk.region-left",
            Self::Blocked => "afk.blocked",
            Self::LocationSet => "admin.location-set",
            Self::LocationRemoved => "admin.location-removed",
            Self::LocationBlocked { .. } => "admin.location-blocked",
        }
    }

    /// Placeholder substitutions for the template, as `(name, value)`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Entering { seconds } => vec![("seconds", seconds.to_string())],
            Self::Earned { amount } => vec![("amount", amount.to_string())],
            Self::LocationBlocked { world } => vec![("world", world.clone())],
            _ => Vec::new(),
        }
    }

    /// JSON payload for hosts that relay notices out of process.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Audible confirmations the engine asks the host to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cue {
    /// Played after each payout.
    Payout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches_serde_tag() {
        let notices = [
            Notice::Entering { seconds: 5 },
            Notice::Started,
            Notice::CancelledMovement,
            Notice::Earned { amount: 3 },
            Notice::LocationBlocked { world: "world_nether".into() },
            Notice::LocationRemoved,
        ];
        for notice in notices {
            let value: serde_json::Value =
                serde_json::from_str(&notice.to_json().unwrap()).unwrap();
            assert_eq!(value["key"], notice.key(), "tag mismatch for {notice:?}");
        }
    }

    #[test]
    fn test_params_for_entering() {
        let params = Notice::Entering { seconds: 5 }.params();
        assert_eq!(params, vec![("seconds", "5".to_string())]);
    }

    #[test]
    fn test_params_empty_for_plain_notices() {
        assert!(Notice::Quit.params().is_empty());
        assert!(Notice::AlreadyAfk.params().is_empty());
    }

    #[test]
    fn test_earned_json_payload() {
        let json = Notice::Earned { amount: 1 }.to_json().unwrap();
        assert_eq!(json, r#"{"key":"afk.earned","amount":1}"#);
    }
}
