//! The legacy single-node AFK location.
//!
//! One process-wide optional target. Admin commands write it; every
//! countdown completion reads it. A `watch` channel gives cheap reads
//! from any shard and lets the host subscribe to changes (e.g. to
//! refresh a hologram at the spot).

use std::sync::Arc;

use afkshards_types::Position;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct AfkLocation {
    cell: Arc<watch::Sender<Option<Position>>>,
}

impl AfkLocation {
    pub fn new(initial: Option<Position>) -> Self {
        let (cell, _) = watch::channel(initial);
        Self {
            cell: Arc::new(cell),
        }
    }

    pub fn get(&self) -> Option<Position> {
        self.cell.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.cell.borrow().is_some()
    }

    /// Replaces the location, returning the previous one.
    pub fn set(&self, location: Position) -> Option<Position> {
        self.cell.send_replace(Some(location))
    }

    /// Clears the location, returning the previous one.
    pub fn clear(&self) -> Option<Position> {
        self.cell.send_replace(None)
    }

    /// Replaces the value wholesale, e.g. with what the store holds.
    pub fn reload(&self, value: Option<Position>) {
        self.cell.send_replace(value);
    }

    /// A receiver that observes every later change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Position>> {
        self.cell.subscribe()
    }
}

impl Default for AfkLocation {
    fn default() -> Self {
        Self::new(None)
    }
}
