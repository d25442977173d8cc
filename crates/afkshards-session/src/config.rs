//! Lifecycle tuning knobs.

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RelocationMode
// ---------------------------------------------------------------------------

/// Where an AFK player is sent when their countdown completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocationMode {
    /// Teleport to the AFK location on this node (when one is set and
    /// no region is mandatory).
    #[default]
    Local,
    /// Hand the player to the relocation gate, which moves them to a
    /// dedicated AFK node and back.
    CrossNode,
}

// ---------------------------------------------------------------------------
// AfkSettings
// ---------------------------------------------------------------------------

/// Settings for the session manager and lifecycle hooks.
///
/// All durations are in ticks of the shard clock (one second at the
/// default 1 Hz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfkSettings {
    /// Length of the entry countdown.
    pub countdown_ticks: u32,
    /// Distance a player may drift during the countdown without it
    /// counting as movement. Compared squared, boundary inclusive.
    pub movement_tolerance: f64,
    /// Ticks between payouts while AFK.
    pub earn_interval_ticks: u32,
    /// Shards granted per payout.
    pub earn_amount: u64,
    pub relocation: RelocationMode,
    /// Delay before a joining player's stale session is cleared.
    pub join_grace_ticks: u32,
    /// Delay between entering an AFK region and the automatic start.
    pub auto_start_delay_ticks: u32,
    /// Command prefixes an AFK player may still use.
    pub allowed_commands: Vec<String>,
    /// Worlds the AFK location may not be placed in.
    pub blocked_worlds: Vec<String>,
}

impl Default for AfkSettings {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            movement_tolerance: 0.1,
            earn_interval_ticks: 30,
            earn_amount: 1,
            relocation: RelocationMode::default(),
            join_grace_ticks: 1,
            auto_start_delay_ticks: 2,
            allowed_commands: vec!["/quitafk".to_string()],
            blocked_worlds: vec!["world_nether".to_string(), "world_the_end".to_string()],
        }
    }
}

impl AfkSettings {
    /// Clamp out-of-range values.
    ///
    /// A zero countdown or interval would complete or pay out on every
    /// tick, so both are raised to 1. A negative or non-finite tolerance
    /// falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.countdown_ticks == 0 {
            warn!("countdown_ticks is 0, using 1");
            self.countdown_ticks = 1;
        }
        if self.earn_interval_ticks == 0 {
            warn!("earn_interval_ticks is 0, using 1");
            self.earn_interval_ticks = 1;
        }
        if !self.movement_tolerance.is_finite() || self.movement_tolerance < 0.0 {
            warn!(
                tolerance = self.movement_tolerance,
                "invalid movement_tolerance, using default"
            );
            self.movement_tolerance = Self::default().movement_tolerance;
        }
        for prefix in &mut self.allowed_commands {
            *prefix = prefix.trim().to_lowercase();
        }
        self.allowed_commands.retain(|p| !p.is_empty());
        self
    }

    /// Whether an AFK player may run `command` (the raw input, leading
    /// slash included). Case-insensitive prefix match.
    pub fn is_command_allowed(&self, command: &str) -> bool {
        let command = command.trim_start().to_lowercase();
        self.allowed_commands
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
    }

    /// Whether the AFK location may be placed in `world`.
    pub fn is_world_blocked(&self, world: &str) -> bool {
        self.blocked_worlds
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_documented_values() {
        let s = AfkSettings::default();
        assert_eq!(s.countdown_ticks, 5);
        assert_eq!(s.movement_tolerance, 0.1);
        assert_eq!(s.earn_interval_ticks, 30);
        assert_eq!(s.earn_amount, 1);
        assert_eq!(s.relocation, RelocationMode::Local);
        assert_eq!(s.join_grace_ticks, 1);
        assert_eq!(s.auto_start_delay_ticks, 2);
        assert_eq!(s.allowed_commands, vec!["/quitafk"]);
    }

    #[test]
    fn test_deserialize_partial_fills_defaults() {
        let s: AfkSettings = toml::from_str(
            r#"
            countdown_ticks = 10
            relocation = "cross-node"
            "#,
        )
        .unwrap();

        assert_eq!(s.countdown_ticks, 10);
        assert_eq!(s.relocation, RelocationMode::CrossNode);
        assert_eq!(s.earn_interval_ticks, 30);
    }

    #[test]
    fn test_validated_zero_durations_raised_to_one() {
        let s = AfkSettings {
            countdown_ticks: 0,
            earn_interval_ticks: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(s.countdown_ticks, 1);
        assert_eq!(s.earn_interval_ticks, 1);
    }

    #[test]
    fn test_validated_negative_tolerance_uses_default() {
        let s = AfkSettings {
            movement_tolerance: -1.0,
            ..Default::default()
        }
        .validated();

        assert_eq!(s.movement_tolerance, 0.1);
    }

    #[test]
    fn test_validated_zero_tolerance_kept() {
        let s = AfkSettings {
            movement_tolerance: 0.0,
            ..Default::default()
        }
        .validated();

        assert_eq!(s.movement_tolerance, 0.0);
    }

    #[test]
    fn test_is_command_allowed_prefix_and_case() {
        let s = AfkSettings::default().validated();

        assert!(s.is_command_allowed("/quitafk"));
        assert!(s.is_command_allowed("/QUITAFK now"));
        assert!(!s.is_command_allowed("/spawn"));
        assert!(!s.is_command_allowed("quitafk"));
    }

    #[test]
    fn test_is_world_blocked_ignores_case() {
        let s = AfkSettings::default();

        assert!(s.is_world_blocked("world_nether"));
        assert!(s.is_world_blocked("World_The_End"));
        assert!(!s.is_world_blocked("world"));
    }
}
