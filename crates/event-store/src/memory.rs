use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, ExpectedVersion, Result, Version,
    event::next_version,
    store::{EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// Every committed event in commit order.
    log: Vec<EventEnvelope>,
    /// Number of upcoming appends that fail as if the log were unreachable.
    failures_pending: usize,
}

/// In-memory event store.
///
/// Backs tests and the default server wiring. Appends are serialized by a
/// single write lock, so each batch is committed atomically.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }

    /// Makes the next `count` appends fail with `Unavailable` without writing anything.
    pub async fn fail_next_appends(&self, count: usize) {
        self.inner.write().await.failures_pending = count;
    }

    /// Clears all streams.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.streams.clear();
        inner.log.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected: ExpectedVersion,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, &events)?;

        let mut inner = self.inner.write().await;

        if inner.failures_pending > 0 {
            inner.failures_pending -= 1;
            return Err(EventStoreError::Unavailable(
                "injected append failure".to_string(),
            ));
        }

        let current = inner
            .streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version);

        if !expected.matches(current) {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected,
                actual: current,
            });
        }

        // Versions are dense per stream, so a batch must continue the head exactly.
        if events[0].version != next_version(current) {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected,
                actual: current,
            });
        }

        let last_version = events[events.len() - 1].version;
        let count = events.len() as u64;

        inner.log.extend(events.iter().cloned());
        inner
            .streams
            .entry(aggregate_id.clone())
            .or_default()
            .extend(events);

        metrics::counter!("events_appended_total").increment(count);
        tracing::debug!(%aggregate_id, %last_version, "Events appended");

        Ok(last_version)
    }

    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner.streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.inner.read().await.log.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use common::{AggregateType, Tenant};

    use super::*;
    use crate::EventStoreExt;

    const CONTRACT: AggregateType = AggregateType::from_static("contract");

    fn stream(object_id: &str) -> AggregateId {
        AggregateId::new(&CONTRACT, &Tenant::new("acme"), object_id)
    }

    fn create_test_event(aggregate_id: &AggregateId, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id.clone())
            .aggregate_type(CONTRACT)
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");
        let event = create_test_event(&id, 0, "ContractCreateV1");

        let result = store.append_event(event, ExpectedVersion::NoStream).await;
        assert_eq!(result.unwrap(), Version::first());

        let events = store.read_stream(&id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_multiple_events() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");

        let events = vec![
            create_test_event(&id, 0, "ContractCreateV1"),
            create_test_event(&id, 1, "ContractUpdateV1"),
            create_test_event(&id, 2, "ContractUpdateStatusV1"),
        ];

        let result = store
            .append_to_stream(&id, ExpectedVersion::NoStream, events)
            .await;
        assert_eq!(result.unwrap(), Version::new(2));

        let stored = store.read_stream(&id).await.unwrap();
        let versions: Vec<_> = stored.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");

        store
            .append_event(create_test_event(&id, 0, "ContractCreateV1"), ExpectedVersion::NoStream)
            .await
            .unwrap();

        let result = store
            .append_event(
                create_test_event(&id, 1, "ContractUpdateV1"),
                ExpectedVersion::NoStream,
            )
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict { expected, actual, .. }) => {
                assert_eq!(expected, ExpectedVersion::NoStream);
                assert_eq!(actual, Some(Version::first()));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.read_stream(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_with_matching_version_succeeds() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");

        store
            .append_event(create_test_event(&id, 0, "ContractCreateV1"), ExpectedVersion::NoStream)
            .await
            .unwrap();

        let result = store
            .append_event(
                create_test_event(&id, 1, "ContractUpdateV1"),
                ExpectedVersion::Exact(Version::first()),
            )
            .await;

        assert_eq!(result.unwrap(), Version::new(1));
    }

    #[tokio::test]
    async fn any_still_requires_contiguous_versions() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");

        store
            .append_event(create_test_event(&id, 0, "ContractCreateV1"), ExpectedVersion::Any)
            .await
            .unwrap();

        let stale = store
            .append_event(create_test_event(&id, 0, "ContractUpdateV1"), ExpectedVersion::Any)
            .await;
        assert!(matches!(
            stale,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn injected_failure_writes_nothing() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");
        store.fail_next_appends(1).await;

        let events = vec![
            create_test_event(&id, 0, "ContractCreateV1"),
            create_test_event(&id, 1, "ContractUpdateV1"),
        ];
        let result = store
            .append_to_stream(&id, ExpectedVersion::NoStream, events.clone())
            .await;
        assert!(matches!(result, Err(EventStoreError::Unavailable(_))));
        assert!(!store.stream_exists(&id).await.unwrap());
        assert_eq!(store.event_count().await, 0);

        store
            .append_to_stream(&id, ExpectedVersion::NoStream, events)
            .await
            .unwrap();
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_stream_reads_empty() {
        let store = InMemoryEventStore::new();
        let id = stream("missing");
        assert!(store.read_stream(&id).await.unwrap().is_empty());
        assert_eq!(store.stream_version(&id).await.unwrap(), None);
        assert!(!store.stream_exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn stream_all_events_in_commit_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let first = stream("c-1");
        let second = stream("c-2");

        store
            .append_event(create_test_event(&first, 0, "ContractCreateV1"), ExpectedVersion::Any)
            .await
            .unwrap();
        store
            .append_event(create_test_event(&second, 0, "ContractCreateV1"), ExpectedVersion::Any)
            .await
            .unwrap();
        store
            .append_event(create_test_event(&first, 1, "ContractUpdateV1"), ExpectedVersion::Any)
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.collect().await;
        let order: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| (e.aggregate_id, e.version.as_i64()))
            .collect();
        assert_eq!(order, vec![(first.clone(), 0), (second, 0), (first, 1)]);
    }

    #[tokio::test]
    async fn concurrent_appends_one_wins() {
        let store = InMemoryEventStore::new();
        let id = stream("c-1");

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_event(
                        create_test_event(&id, 0, &format!("Writer{n}")),
                        ExpectedVersion::NoStream,
                    )
                    .await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.read_stream(&id).await.unwrap().len(), 1);
    }
}
