//! Errors of the measurement persistence layer.

use crate::measurement::types::{EventId, MeasurementId};
use crate::storage::database::DatabaseError;
use thiserror::Error;

/// Errors raised while managing measurements or deriving their metrics.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The referenced measurement does not exist.
    #[error("No measurement with id {0}")]
    NoSuchMeasurement(MeasurementId),

    /// The referenced event does not exist.
    #[error("No event with id {0}")]
    NoSuchEvent(EventId),

    /// Stored state contradicts a lifecycle or event log invariant.
    ///
    /// Never recovered locally: the measurement's data must not be trusted.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// The measurement is still OPEN or PAUSED.
    #[error("Measurement {0} is still being captured")]
    MeasurementActive(MeasurementId),

    /// The storage mutex was poisoned by a panicking holder.
    #[error("Storage lock poisoned: {0}")]
    LockPoisoned(String),

    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl PersistenceError {
    /// Build an invariant violation and log it.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("Invariant violated: {}", message);
        PersistenceError::InvariantViolation(message)
    }

    /// Whether the error belongs to the not-found class.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistenceError::NoSuchMeasurement(_) | PersistenceError::NoSuchEvent(_)
        )
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
