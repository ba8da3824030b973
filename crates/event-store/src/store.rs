use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, ExpectedVersion, Result, Version};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Append-only log of versioned event streams.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to one stream.
    ///
    /// The batch is atomic: either every event becomes visible or none does.
    /// Fails with `ConcurrencyConflict` when the stream's head does not
    /// satisfy `expected`, in which case nothing is written.
    ///
    /// Returns the version of the last appended event.
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected: ExpectedVersion,
        events: Vec<EventEnvelope>,
    ) -> Result<Version>;

    /// Reads a whole stream, oldest first. An unknown stream reads as empty.
    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Gets the version of the last event in a stream, or None if it has none.
    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>>;

    /// Streams every event in the store in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event.
    async fn append_event(
        &self,
        event: EventEnvelope,
        expected: ExpectedVersion,
    ) -> Result<Version> {
        let aggregate_id = event.aggregate_id.clone();
        self.append_to_stream(&aggregate_id, expected, vec![event])
            .await
    }

    /// Checks if a stream has at least one event.
    async fn stream_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.stream_version(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending it to `aggregate_id`.
///
/// The batch must be non-empty, target the given stream with a single
/// aggregate type, and carry contiguous versions.
pub fn validate_events_for_append(
    aggregate_id: &AggregateId,
    events: &[EventEnvelope],
) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append empty event list".to_string(),
        ));
    };

    for event in events {
        if &event.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "event {} belongs to stream {}, not {aggregate_id}",
                event.event_id, event.aggregate_id
            )));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
    }

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
