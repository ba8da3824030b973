//! Event buffer error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while parking or dispatching events.
#[derive(Debug, Error)]
pub enum EventBufferError {
    /// No entry is parked under the given uuid.
    #[error("No event parked under uuid {0}")]
    NotParked(String),

    /// The parked-entry store failed.
    #[error("Parked event store error: {0}")]
    Store(String),

    /// Re-submitting the parked event failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub type Result<T> = std::result::Result<T, EventBufferError>;
