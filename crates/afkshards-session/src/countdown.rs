//! The entry countdown.
//!
//! A [`PendingEntry`] exists only while its player is entering AFK.
//! [`PendingEntry::advance`] is the only thing that touches
//! `remaining_ticks`; the session manager calls it once per tick.

use afkshards_types::Position;

use crate::has_moved;

/// What one tick of a countdown produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Still counting. `remaining` is the value after this tick.
    Continue { remaining: u32, total: u32 },
    /// The player left the anchor; the entry must be cancelled.
    Moved,
    /// The counter reached zero; the entry must be completed.
    Complete { total: u32 },
}

/// A running entry countdown.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    /// Where the player stood when the countdown started. Becomes the
    /// pre-AFK return point on completion.
    pub anchor: Position,
    pub remaining_ticks: u32,
    /// The starting value, kept for progress display.
    pub total_ticks: u32,
}

impl PendingEntry {
    pub fn new(anchor: Position, ticks: u32) -> Self {
        let ticks = ticks.max(1);
        Self {
            anchor,
            remaining_ticks: ticks,
            total_ticks: ticks,
        }
    }

    /// Runs one tick: movement is checked before the counter moves, so
    /// a player who steps away on the last tick is still cancelled.
    pub fn advance(&mut self, current: &Position, tolerance: f64) -> CountdownStep {
        if has_moved(&self.anchor, current, tolerance) {
            return CountdownStep::Moved;
        }
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        if self.remaining_ticks == 0 {
            CountdownStep::Complete {
                total: self.total_ticks,
            }
        } else {
            CountdownStep::Continue {
                remaining: self.remaining_ticks,
                total: self.total_ticks,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot() -> Position {
        Position::new("world", 10.0, 64.0, 10.0)
    }

    #[test]
    fn test_advance_five_ticks_completes_on_fifth() {
        let mut entry = PendingEntry::new(spot(), 5);

        for expected in [4, 3, 2, 1] {
            assert_eq!(
                entry.advance(&spot(), 0.1),
                CountdownStep::Continue {
                    remaining: expected,
                    total: 5
                }
            );
        }
        assert_eq!(entry.advance(&spot(), 0.1), CountdownStep::Complete { total: 5 });
    }

    #[test]
    fn test_advance_moved_leaves_counter_untouched() {
        let mut entry = PendingEntry::new(spot(), 5);
        entry.advance(&spot(), 0.1);

        let moved = Position::new("world", 12.0, 64.0, 10.0);

        assert_eq!(entry.advance(&moved, 0.1), CountdownStep::Moved);
        assert_eq!(entry.remaining_ticks, 4);
    }

    #[test]
    fn test_advance_moved_on_last_tick_still_cancels() {
        let mut entry = PendingEntry::new(spot(), 1);
        let moved = Position::new("world", 11.0, 64.0, 10.0);

        assert_eq!(entry.advance(&moved, 0.1), CountdownStep::Moved);
    }

    #[test]
    fn test_new_zero_ticks_raised_to_one() {
        let mut entry = PendingEntry::new(spot(), 0);

        assert_eq!(entry.total_ticks, 1);
        assert_eq!(entry.advance(&spot(), 0.1), CountdownStep::Complete { total: 1 });
    }
}
