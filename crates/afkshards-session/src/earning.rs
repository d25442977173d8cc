//! Payout timer for AFK players.

/// Counts down to the next payout. Exists only while its player is AFK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningTimer {
    pub remaining_ticks: u32,
    pub interval: u32,
}

impl EarningTimer {
    pub fn new(interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            remaining_ticks: interval,
            interval,
        }
    }

    /// Counts one eligible tick. Returns `true` when a payout is due;
    /// the timer has then already been reset to the full interval.
    pub fn advance(&mut self) -> bool {
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        if self.remaining_ticks == 0 {
            self.remaining_ticks = self.interval;
            true
        } else {
            false
        }
    }
}
