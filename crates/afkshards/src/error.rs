//! Unified error type for afkshards.

use std::path::PathBuf;

use afkshards_session::Rejection;
use afkshards_store::StoreError;

/// The engine configuration couldn't be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level error that wraps every crate-specific error a caller can
/// see.
///
/// The `#[from]` variants let `?` lift sub-crate errors directly. Failed
/// relocations are logged by the session manager and never reach here.
#[derive(Debug, thiserror::Error)]
pub enum AfkError {
    /// Loading or writing the durable mirror failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A lifecycle request was turned down (player already notified).
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The shard actor owning the player has stopped.
    #[error("shard {0} is unavailable")]
    ShardUnavailable(usize),
}
