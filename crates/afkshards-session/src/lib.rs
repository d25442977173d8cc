//! The AFK session lifecycle for afkshards.
//!
//! This crate owns every piece of per-player AFK state:
//!
//! 1. **Sessions**: who is entering AFK and who is AFK
//!    ([`SessionManager`])
//! 2. **Countdowns**: the entry delay, cancelled by movement
//!    ([`PendingEntry`])
//! 3. **Earning**: periodic payouts while AFK ([`EarningTimer`])
//! 4. **The AFK location**: the legacy single-node target
//!    ([`AfkLocation`])
//!
//! Everything outside the state machine (who is online, where they
//! stand, regions, cross-node moves, rewards, messages) is reached
//! through the collaborator traits in [`collaborators`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)         ← shard actors call tick() and route events here
//!     ↕
//! Session (this crate)   ← owns Session / PendingEntry / EarningTimer
//!     ↕
//! Store (below)          ← durable mirror, written through a queue
//! ```

pub mod collaborators;
mod config;
mod countdown;
mod earning;
mod error;
mod guard;
mod location;
mod manager;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use collaborators::{
    Collaborators, LogNotifier, NoRegions, NoRelocation, NotificationSink, PlayerWorld, RegionGate,
    RelocationGate, RewardSink,
};
pub use config::{AfkSettings, RelocationMode};
pub use countdown::{CountdownStep, PendingEntry};
pub use earning::EarningTimer;
pub use error::{RelocationError, Rejection};
pub use guard::has_moved;
pub use location::AfkLocation;
pub use manager::{AfkState, QuitOutcome, Session, SessionManager};
