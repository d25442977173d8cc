//! # afkshards
//!
//! Grants "shards" to players who are away from keyboard, protects them
//! while they are, and survives restarts without losing who was AFK.
//!
//! The engine ties the layers together:
//!
//! ```text
//! host events ──▶ AfkEngine ──route by player──▶ shard actor (one task each)
//!                                                   │  LifecycleHooks
//!                                                   │  TickScheduler (1 Hz)
//!                                                   ▼
//!                                            SessionManager ──▶ persistence queue ──▶ SQLite
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use afkshards::prelude::*;
//!
//! afkshards::init_tracing();
//! let config = EngineConfig::load("afkshards.toml")?;
//! let collaborators = Collaborators::new(world, rewards)
//!     .with_regions(regions)
//!     .with_notifier(messages);
//! let engine = AfkEngine::open(config, collaborators).await?;
//!
//! engine.dispatch(LifecycleEvent::Join(player)).await?;
//! engine.start_afk(player).await?;
//! ```

mod config;
mod engine;
mod error;
mod hooks;
mod shard;

pub use config::{EngineConfig, StorageConfig};
pub use engine::AfkEngine;
pub use error::{AfkError, ConfigError};
pub use hooks::{ActionGuard, LifecycleHooks, Verdict};
pub use shard::{LifecycleEvent, ShardHandle, ShardInfo};

/// Everything a host needs in one import.
pub mod prelude {
    pub use crate::{
        ActionGuard, AfkEngine, AfkError, EngineConfig, LifecycleEvent, Verdict,
    };
    pub use afkshards_session::{
        AfkSettings, AfkState, Collaborators, NotificationSink, PlayerWorld, QuitOutcome,
        RegionGate, Rejection, RelocationError, RelocationGate, RelocationMode, RewardSink,
    };
    pub use afkshards_types::{Cue, Notice, PlayerId, Position};
}

/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG`, falling
/// back to `afkshards=info`. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "afkshards=info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
