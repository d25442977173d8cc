//! Movement detection for the entry countdown.

use afkshards_types::Position;

/// Whether `current` is far enough from `anchor` to cancel a countdown.
///
/// Moved means the squared distance is strictly greater than
/// `tolerance²`, so a player exactly at the tolerance boundary has not
/// moved. A different world always counts as moved, as does a
/// coordinate that isn't finite. Orientation is ignored: turning the
/// camera is not movement.
pub fn has_moved(anchor: &Position, current: &Position, tolerance: f64) -> bool {
    match anchor.distance_squared(current) {
        Some(dist_sq) => !dist_sq.is_finite() || dist_sq > tolerance * tolerance,
        None => true,
    }
}
