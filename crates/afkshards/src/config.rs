//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! shards = 4
//!
//! [afk]
//! countdown_ticks = 5
//! earn_interval_ticks = 30
//! relocation = "local"
//!
//! [tick]
//! tick_rate_hz = 1
//! policy = { mode = "skip" }
//!
//! [storage]
//! path = "storage/afkshards.db"
//! queue_capacity = 256
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::{Path, PathBuf};

use afkshards_session::AfkSettings;
use afkshards_tick::TickConfig;
use serde::Deserialize;
use tracing::warn;

use crate::ConfigError;

/// Where the durable mirror lives.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. Parent directories are created.
    pub path: PathBuf,
    /// Bounded capacity of the persistence queue.
    pub queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("storage/afkshards.db"),
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub afk: AfkSettings,
    pub tick: TickConfig,
    pub storage: StorageConfig,
    /// Number of shard actors players are spread across.
    pub shards: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            afk: AfkSettings::default(),
            tick: TickConfig::default(),
            storage: StorageConfig::default(),
            shards: 4,
        }
    }
}

impl EngineConfig {
    pub const MAX_SHARDS: usize = 64;

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file. Not validated yet; see
    /// [`validated`](Self::validated).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Clamp out-of-range values, including every nested section.
    pub fn validated(mut self) -> Self {
        if !(1..=Self::MAX_SHARDS).contains(&self.shards) {
            let clamped = self.shards.clamp(1, Self::MAX_SHARDS);
            warn!(shards = self.shards, clamped, "shard count out of range, clamping");
            self.shards = clamped;
        }
        if self.storage.queue_capacity == 0 {
            warn!("storage.queue_capacity is 0, using 1");
            self.storage.queue_capacity = 1;
        }
        self.afk = self.afk.validated();
        self.tick = self.tick.validated();
        self
    }
}
