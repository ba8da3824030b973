use thiserror::Error;

use crate::{AggregateId, ExpectedVersion, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream was not at the version the writer expected.
    #[error(
        "Concurrency conflict for stream {aggregate_id}: expected {expected}, found {}",
        display_actual(.actual)
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: ExpectedVersion,
        actual: Option<Version>,
    },

    /// The batch handed to `append_to_stream` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// An event envelope was built without a required field.
    #[error("Event is missing required field `{0}`")]
    IncompleteEvent(&'static str),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing log failed or is unreachable; nothing was written.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),
}

fn display_actual(actual: &Option<Version>) -> String {
    match actual {
        Some(version) => version.to_string(),
        None => "no stream".to_string(),
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
