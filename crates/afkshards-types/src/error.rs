//! Error types for the shared vocabulary.

/// Errors raised while building shared values from untrusted input
/// (database rows, config files).
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The text is not a valid player identity.
    #[error("invalid player id {0:?}: {1}")]
    InvalidPlayerId(String, uuid::Error),

    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate in world {0}")]
    NonFiniteCoordinate(String),
}
