//! Identity and spatial types.
//!
//! These values flow through every layer: the session manager keys its
//! maps by [`PlayerId`], the countdown compares [`Position`]s every tick,
//! and the store writes both to disk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TypesError;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A unique, stable identifier for a player.
///
/// Newtype over a UUID so a player key can't be confused with any other
/// UUID in the host (world ids, entity ids). Serializes as the bare UUID
/// string, which is also the primary key format in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Generates a fresh random id. Mostly useful in tests and demos.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the hyphenated UUID form used by the store.
    pub fn parse(text: &str) -> Result<Self, TypesError> {
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|e| TypesError::InvalidPlayerId(text.to_string(), e))
    }

    /// Picks one of `buckets` shards for this player.
    ///
    /// Stable for the life of the id, so a player always lands on the
    /// same shard and its transitions stay totally ordered.
    pub fn bucket(&self, buckets: usize) -> usize {
        if buckets <= 1 {
            return 0;
        }
        (self.0.as_u128() % buckets as u128) as usize
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PlayerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A world-qualified coordinate with orientation.
///
/// `yaw`/`pitch` ride along so a player returned to their pre-AFK spot
/// faces the same way, but they never take part in movement checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
}

impl Position {
    /// A position with neutral orientation.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Same coordinate, given orientation.
    pub fn with_rotation(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Squared Euclidean distance to `other`, or `None` when the two
    /// positions are in different worlds and can't be compared.
    pub fn distance_squared(&self, other: &Position) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }

    /// Rejects NaN/infinite coordinates, such as ones read back from a
    /// damaged store.
    pub fn checked(self) -> Result<Self, TypesError> {
        if [self.x, self.y, self.z].iter().all(|c| c.is_finite()) {
            Ok(self)
        } else {
            Err(TypesError::NonFiniteCoordinate(self.world))
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({:.2}, {:.2}, {:.2})", self.world, self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display_round_trips_through_parse() {
        let id = PlayerId::new_v4();
        let parsed: PlayerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_player_id_parse_rejects_garbage() {
        let result = PlayerId::parse("not-a-uuid");
        assert!(matches!(result, Err(TypesError::InvalidPlayerId(..))));
    }

    #[test]
    fn test_player_id_serializes_as_bare_string() {
        let id = PlayerId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_bucket_is_stable_and_in_range() {
        let id = PlayerId::new_v4();
        let first = id.bucket(7);
        assert!(first < 7);
        assert_eq!(id.bucket(7), first);
        assert_eq!(id.bucket(1), 0);
        assert_eq!(id.bucket(0), 0);
    }

    #[test]
    fn test_distance_squared_same_world() {
        let a = Position::new("world", 0.0, 64.0, 0.0);
        let b = Position::new("world", 3.0, 64.0, 4.0);
        assert_eq!(a.distance_squared(&b), Some(25.0));
    }

    #[test]
    fn test_distance_squared_ignores_rotation() {
        let a = Position::new("world", 1.0, 2.0, 3.0);
        let b = a.clone().with_rotation(90.0, -45.0);
        assert_eq!(a.distance_squared(&b), Some(0.0));
    }

    #[test]
    fn test_distance_squared_other_world_is_none() {
        let a = Position::new("world", 0.0, 0.0, 0.0);
        let b = Position::new("world_nether", 0.0, 0.0, 0.0);
        assert_eq!(a.distance_squared(&b), None);
    }

    #[test]
    fn test_checked_rejects_nan() {
        let p = Position::new("world", f64::NAN, 0.0, 0.0);
        assert!(matches!(p.checked(), Err(TypesError::NonFiniteCoordinate(w)) if w == "world"));
    }
}
