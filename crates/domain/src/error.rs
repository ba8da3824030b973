//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, ExpectedVersion, Version};
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The stream has no events.
    #[error("Aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// A stored event carries a type tag the aggregate does not know.
    #[error("Invalid event type `{event_type}` for {aggregate_type}")]
    InvalidEventType {
        aggregate_type: String,
        event_type: String,
    },

    /// A tagged command names a kind the aggregate does not handle.
    #[error("Invalid command type `{command_type}` for {aggregate_type}")]
    InvalidCommandType {
        aggregate_type: String,
        command_type: String,
    },

    /// The stream moved on between load and save.
    #[error("Wrong expected version for {aggregate_id}: expected {expected}, actual {}", display_actual(.actual))]
    WrongExpectedVersion {
        aggregate_id: AggregateId,
        expected: ExpectedVersion,
        actual: Option<Version>,
    },

    /// A command field is missing or invalid.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A command references another aggregate that does not exist.
    #[error("Referenced {aggregate_type} {object_id} not found")]
    ReferencedAggregateNotFound {
        aggregate_type: String,
        object_id: String,
    },

    /// A business rule rejects the command in the aggregate's current state.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A persisted event payload could not be decoded.
    #[error("Corrupt event {event_type} at version {version} of {aggregate_id}: {source}")]
    CorruptEvent {
        aggregate_id: AggregateId,
        event_type: String,
        version: Version,
        #[source]
        source: serde_json::Error,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn display_actual(actual: &Option<Version>) -> String {
    match actual {
        Some(version) => version.to_string(),
        None => "no stream".to_string(),
    }
}

/// Coarse classification of a [`DomainError`], used by callers to choose a
/// reaction (retry, reject, report) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict {
        expected: ExpectedVersion,
        actual: Option<Version>,
    },
    NotFound,
    Validation,
    InvalidType,
    Precondition,
    Cancelled,
    Internal,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongExpectedVersion {
                expected, actual, ..
            } => ErrorKind::Conflict {
                expected: *expected,
                actual: *actual,
            },
            Self::AggregateNotFound(_) | Self::ReferencedAggregateNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidEventType { .. } | Self::InvalidCommandType { .. } => {
                ErrorKind::InvalidType
            }
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::CorruptEvent { .. } | Self::EventStore(_) | Self::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true for optimistic-concurrency conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict { .. })
    }

    pub fn missing_field(field: &str) -> Self {
        Self::Validation(format!("missing required field `{field}`"))
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
