//! Error types for the rocket store.
//!
//! All errors are propagated via [`DbError`]. `NotFound` and
//! `AlreadyExists` are part of the store contract; the rest are transient or
//! infrastructure failures that callers should treat as retryable.

/// Errors that can occur in the rocket store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No rocket is stored under the given owner and ID.
    #[error("rocket {id} not found for {owner}")]
    NotFound {
        /// The owner that was looked up.
        owner: String,
        /// The rocket ID that was looked up.
        id: String,
    },

    /// A rocket with this ID already exists.
    #[error("rocket {id} already exists")]
    AlreadyExists {
        /// The conflicting rocket ID.
        id: String,
    },

    /// The store cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this error means the rocket does not exist.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
