//! Mapping store error types.

use thiserror::Error;
use veil_model::IdentifierKind;

#[derive(Debug, Error)]
pub enum MapError {
    /// The store was created with a different seed than the one supplied.
    #[error("mapping store seed is {stored}, but {provided} was requested")]
    SeedMismatch { stored: u64, provided: u64 },

    #[error("{kind} pseudonym pool exhausted after {capacity} names")]
    PoolExhausted { kind: IdentifierKind, capacity: usize },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored bookkeeping that cannot be interpreted.
    #[error("invalid stored state for '{key}': {value}")]
    InvalidState { key: String, value: String },

    #[error("failed to encode repair rule: {0}")]
    Encode(#[from] serde_json::Error),
}

impl MapError {
    /// A hint for the operator, when one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::SeedMismatch { .. } => {
                Some("Omit the seed to reuse the stored one, or point at a new mapping store.")
            }
            Self::PoolExhausted { .. } => {
                Some("Start a separate mapping store for the remaining data.")
            }
            Self::InvalidState { .. } => {
                Some("The mapping store may be corrupted; restore it from a backup.")
            }
            Self::Database(_) | Self::Encode(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
