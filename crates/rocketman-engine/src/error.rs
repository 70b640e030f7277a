//! Error types for the rocket engine.
//!
//! [`RocketError`] is what the rocket service returns to the API and what
//! the event handlers use to decide between acknowledging a delivery and
//! handing it back to the broker.

use rocketman_core::config::BoundsViolation;
use rocketman_db::DbError;

/// Errors from rocket operations and event handling.
#[derive(Debug, thiserror::Error)]
pub enum RocketError {
    /// Requested geometry is outside the configured bounds, or the rocket
    /// can no longer be edited.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A rocket with this ID already exists.
    #[error("rocket {id} already exists")]
    AlreadyExists {
        /// The conflicting rocket ID.
        id: String,
    },

    /// The rocket does not exist for this owner.
    #[error("rocket {id} not found")]
    NotFound {
        /// The rocket ID that was looked up.
        id: String,
    },

    /// The operation is not allowed in the rocket's current phase.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The ID generator could not find a free ID.
    #[error("no free rocket ID after {attempts} attempts")]
    ExhaustedRetries {
        /// Candidates tried.
        attempts: u32,
    },

    /// An event body or routing key could not be understood.
    #[error("malformed event on {subject}: {reason}")]
    MalformedEvent {
        /// The routing key the event arrived on.
        subject: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The store failed.
    #[error("store error: {0}")]
    Store(DbError),

    /// The event bus failed.
    #[error("event bus error: {0}")]
    Bus(String),
}

impl RocketError {
    /// Whether a delivery that failed with this error should still be
    /// acknowledged. Redelivery cannot fix a malformed event.
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::MalformedEvent { .. })
    }
}

impl From<DbError> for RocketError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { id, .. } => Self::NotFound { id },
            DbError::AlreadyExists { id } => Self::AlreadyExists { id },
            other => Self::Store(other),
        }
    }
}

impl From<BoundsViolation> for RocketError {
    fn from(v: BoundsViolation) -> Self {
        Self::Validation(v.to_string())
    }
}
