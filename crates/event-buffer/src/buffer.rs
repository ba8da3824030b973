//! Parking events and dispatching them once they expire.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::Tenant;
use domain::{
    AggregateStore, Cancellation, CommandHandler, DomainError, EventRegistry, RawEvent, Republish,
    RetryConfig, StreamAggregate,
};
use event_store::{EventEnvelope, EventStore};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::entry::{DispatchReport, ParkedEvent};
use crate::error::{EventBufferError, Result};
use crate::store::ParkedEventStore;

/// Settings for an [`EventBuffer`].
#[derive(Debug, Clone)]
pub struct EventBufferConfig {
    /// Interval between dispatch passes of the background task.
    pub tick: Duration,
    /// Conflict retry policy used when re-submitting parked events.
    pub retry: RetryConfig,
    /// Event types accepted for parking and release.
    pub registry: EventRegistry,
}

impl Default for EventBufferConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            retry: RetryConfig::default(),
            registry: EventRegistry::default(),
        }
    }
}

/// Re-submits parked events through the command pipeline.
struct Dispatcher<S: EventStore, P> {
    parked: P,
    registry: EventRegistry,
    handler: CommandHandler<S, StreamAggregate>,
}

impl<S: EventStore, P: ParkedEventStore> Dispatcher<S, P> {
    async fn dispatch(&self, cancel: &Cancellation) -> Result<DispatchReport> {
        let due = self.parked.list_expired(Utc::now()).await?;
        let mut report = DispatchReport::default();
        if due.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = due.len(), "Dispatching expired parked events");
        for entry in due {
            if cancel.is_cancelled() {
                tracing::debug!("Dispatch interrupted by cancellation");
                break;
            }
            match self.release(&entry, cancel).await {
                Ok(()) => report.dispatched += 1,
                Err(EventBufferError::Domain(DomainError::Cancelled)) => break,
                Err(err) => {
                    report.failed += 1;
                    metrics::counter!("event_buffer_dispatch_failures_total").increment(1);
                    tracing::error!(
                        uuid = %entry.uuid,
                        tenant = %entry.tenant,
                        event_type = %entry.event.event_type,
                        error = %err,
                        "Failed to dispatch parked event"
                    );
                }
            }
        }

        if report.dispatched > 0 || report.failed > 0 {
            tracing::info!(
                dispatched = report.dispatched,
                failed = report.failed,
                "Dispatch pass finished"
            );
        }
        Ok(report)
    }

    async fn dispatch_by_uuid(&self, uuid: &str, cancel: &Cancellation) -> Result<()> {
        let entry = self
            .parked
            .get(uuid)
            .await?
            .ok_or_else(|| EventBufferError::NotParked(uuid.to_string()))?;
        self.release(&entry, cancel).await
    }

    /// Re-submits the entry's event, then removes the entry.
    ///
    /// The entry stays parked if re-submission fails, so the next pass retries it.
    /// Only the dispatched entry is removed: one re-parked under the same uuid
    /// meanwhile is left for a later pass.
    async fn release(&self, entry: &ParkedEvent, cancel: &Cancellation) -> Result<()> {
        let span = tracing::info_span!(
            "release_parked_event",
            uuid = %entry.uuid,
            tenant = %entry.tenant,
            aggregate_id = %entry.event.aggregate_id,
            event_type = %entry.event.event_type
        );
        async {
            self.registry.validate(&entry.event)?;
            let command = republish_command(entry);
            let outcome = self.handler.handle(&command, cancel).await?;
            if !self.parked.delete_exact(entry).await? {
                tracing::debug!("Entry was re-parked during dispatch, keeping the new one");
            }

            metrics::counter!("event_buffer_dispatched_total").increment(1);
            tracing::debug!(
                version = ?outcome.events.last().map(|e| e.version),
                attempts = outcome.attempts,
                "Parked event re-submitted"
            );
            Ok::<(), EventBufferError>(())
        }
        .instrument(span)
        .await
    }
}

fn republish_command(entry: &ParkedEvent) -> Republish {
    let event = &entry.event;
    let mut command = Republish::new(
        entry.tenant.clone(),
        event.aggregate_id.clone(),
        event.aggregate_type.clone(),
        RawEvent {
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
        },
    );
    command.metadata = event.metadata.clone();
    command.causation_id = Some(event.event_id);
    command
}

struct Worker {
    cancel: Cancellation,
    handle: JoinHandle<()>,
}

/// Holds events back until their expiry, then replays them into their streams.
///
/// A background task started with [`start`](Self::start) runs a dispatch pass
/// every tick. Delivery is at least once: an entry is removed only after its
/// event was appended, so a failure between the two re-submits it later.
pub struct EventBuffer<S: EventStore, P: ParkedEventStore> {
    dispatcher: Arc<Dispatcher<S, P>>,
    tick: Duration,
    worker: Mutex<Option<Worker>>,
}

impl<S, P> EventBuffer<S, P>
where
    S: EventStore + 'static,
    P: ParkedEventStore + 'static,
{
    pub fn new(store: AggregateStore<S>, parked: P, config: EventBufferConfig) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher {
                parked,
                registry: config.registry,
                handler: CommandHandler::new(store).with_retry(config.retry),
            }),
            tick: config.tick,
            worker: Mutex::new(None),
        }
    }

    /// Returns a reference to the parked-entry store.
    pub fn parked_store(&self) -> &P {
        &self.dispatcher.parked
    }

    /// Parks `event` under `uuid` until `expiry`.
    ///
    /// The event must decode as one of its aggregate's event types.
    /// Parking an already parked uuid replaces the entry. Replacing one that
    /// has not expired yet is logged and counted, since it usually means the
    /// same work was scheduled twice.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn park(
        &self,
        event: EventEnvelope,
        tenant: Tenant,
        uuid: &str,
        expiry: DateTime<Utc>,
    ) -> Result<()> {
        if uuid.trim().is_empty() {
            return Err(DomainError::missing_field("uuid").into());
        }
        if tenant.is_empty() {
            return Err(DomainError::missing_field("tenant").into());
        }
        self.dispatcher.registry.validate(&event)?;

        let entry = ParkedEvent::new(uuid, tenant, event, expiry);
        let previous = self.dispatcher.parked.upsert(entry).await?;
        metrics::counter!("event_buffer_parked_total").increment(1);

        if let Some(previous) = previous
            && !previous.is_due(Utc::now())
        {
            metrics::counter!("event_buffer_overwrites_total").increment(1);
            tracing::warn!(
                previous_expiry = %previous.expiry,
                "Overwrote a parked event that had not expired yet"
            );
        }
        Ok(())
    }

    /// Dispatches every entry whose expiry has passed.
    ///
    /// A failing entry is counted and left parked; it never stops the pass.
    #[tracing::instrument(skip_all)]
    pub async fn dispatch(&self, cancel: &Cancellation) -> Result<DispatchReport> {
        self.dispatcher.dispatch(cancel).await
    }

    /// Dispatches one entry right away, whatever its expiry.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn dispatch_by_uuid(&self, uuid: &str, cancel: &Cancellation) -> Result<()> {
        self.dispatcher.dispatch_by_uuid(uuid, cancel).await
    }

    /// Spawns the periodic dispatch task.
    ///
    /// Returns false without spawning if the task is already running.
    pub async fn start(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            tracing::debug!("Event buffer already running");
            return false;
        }

        let cancel = Cancellation::new();
        let handle = tokio::spawn(run_periodic(
            Arc::clone(&self.dispatcher),
            self.tick,
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
        tracing::info!(tick = ?self.tick, "Event buffer started");
        true
    }

    /// Cancels the periodic task and waits for it to finish.
    ///
    /// No-op when not running; [`start`](Self::start) may be called again afterwards.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.cancel.cancel();
        if let Err(err) = worker.handle.await {
            tracing::error!(error = %err, "Event buffer task ended abnormally");
        }
        tracing::info!("Event buffer stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

async fn run_periodic<S, P>(dispatcher: Arc<Dispatcher<S, P>>, tick: Duration, cancel: Cancellation)
where
    S: EventStore,
    P: ParkedEventStore,
{
    let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(err) = dispatcher.dispatch(&cancel).await {
                    tracing::error!(error = %err, "Dispatch pass failed");
                }
            }
        }
    }
    tracing::debug!("Event buffer task exiting");
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use common::{AggregateId, AggregateType, metadata};
    use event_store::{EventMetadata, InMemoryEventStore, Version};

    use super::*;
    use crate::store::InMemoryParkedEventStore;

    const CONTRACT: AggregateType = AggregateType::from_static("contract");

    type Buffer = EventBuffer<InMemoryEventStore, InMemoryParkedEventStore>;

    fn tenant() -> Tenant {
        Tenant::new("t1")
    }

    fn buffer(store: &InMemoryEventStore, tick: Duration) -> Buffer {
        EventBuffer::new(
            AggregateStore::new(store.clone()),
            InMemoryParkedEventStore::new(),
            EventBufferConfig {
                tick,
                ..EventBufferConfig::default()
            },
        )
    }

    fn stream(object_id: &str) -> AggregateId {
        AggregateId::new(&CONTRACT, &tenant(), object_id)
    }

    fn event(object_id: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type("ContractRolloutRenewalOpportunityV1")
            .aggregate_id(stream(object_id))
            .aggregate_type(CONTRACT)
            .version(Version::first())
            .payload_raw(serde_json::json!({ "requestedAt": "2026-01-01T00:00:00Z" }))
            .with_metadata(&EventMetadata::for_tenant(&tenant()).user_id("u-1"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn expired_entry_is_dispatched_and_removed() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let parked = event("k-1");

        buffer
            .park(parked.clone(), tenant(), "u1", Utc::now())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();
        assert_eq!(report, DispatchReport { dispatched: 1, failed: 0 });
        assert!(
            buffer
                .parked_store()
                .list_expired(Utc::now())
                .await
                .unwrap()
                .is_empty()
        );

        let events = store.read_stream(&stream("k-1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, parked.event_type);
        assert_eq!(events[0].payload, parked.payload);
        assert_eq!(events[0].metadata_str(metadata::USER_ID), Some("u-1"));
        assert_eq!(
            events[0].metadata_str(metadata::CAUSATION_ID),
            Some(parked.event_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn explicit_release_ignores_expiry() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let far_future = Utc::now() + ChronoDuration::days(365);
        buffer
            .park(event("k-1"), tenant(), "u1", far_future)
            .await
            .unwrap();

        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();
        assert_eq!(report, DispatchReport::default());

        buffer
            .dispatch_by_uuid("u1", &Cancellation::new())
            .await
            .unwrap();
        assert!(buffer.parked_store().get("u1").await.unwrap().is_none());
        assert_eq!(store.read_stream(&stream("k-1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn releasing_unknown_uuid_is_not_parked() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let err = buffer
            .dispatch_by_uuid("missing", &Cancellation::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EventBufferError::NotParked(uuid) if uuid == "missing"));
    }

    #[tokio::test]
    async fn republished_event_lands_at_stream_head() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        store
            .append_to_stream(
                &stream("k-1"),
                event_store::ExpectedVersion::NoStream,
                vec![event("k-1")],
            )
            .await
            .unwrap();

        buffer
            .park(event("k-1"), tenant(), "u1", Utc::now())
            .await
            .unwrap();
        buffer
            .dispatch_by_uuid("u1", &Cancellation::new())
            .await
            .unwrap();

        let versions: Vec<Version> = store
            .read_stream(&stream("k-1"))
            .await
            .unwrap()
            .iter()
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![Version::new(0), Version::new(1)]);
    }

    #[tokio::test]
    async fn failed_entry_stays_parked_without_aborting_the_pass() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let now = Utc::now();
        buffer
            .park(event("k-1"), tenant(), "u1", now - ChronoDuration::seconds(2))
            .await
            .unwrap();
        buffer
            .park(event("k-2"), tenant(), "u2", now - ChronoDuration::seconds(1))
            .await
            .unwrap();

        store.fail_next_appends(1).await;
        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();

        assert_eq!(report, DispatchReport { dispatched: 1, failed: 1 });
        assert!(buffer.parked_store().get("u1").await.unwrap().is_some());
        assert!(buffer.parked_store().get("u2").await.unwrap().is_none());

        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();
        assert_eq!(report, DispatchReport { dispatched: 1, failed: 0 });
    }

    #[tokio::test]
    async fn repark_overwrites_entry() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let later = Utc::now() + ChronoDuration::hours(1);

        buffer
            .park(event("k-1"), tenant(), "u1", later)
            .await
            .unwrap();
        buffer
            .park(event("k-2"), tenant(), "u1", later + ChronoDuration::hours(1))
            .await
            .unwrap();

        let entry = buffer.parked_store().get("u1").await.unwrap().unwrap();
        assert_eq!(entry.event.aggregate_id, stream("k-2"));
        assert_eq!(buffer.parked_store().len().await, 1);
    }

    #[tokio::test]
    async fn park_requires_uuid_and_tenant() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let err = buffer
            .park(event("k-1"), tenant(), " ", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EventBufferError::Domain(DomainError::Validation(_))));

        let err = buffer
            .park(event("k-1"), Tenant::new(""), "u1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EventBufferError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn park_rejects_events_the_aggregate_does_not_know() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let mut bogus = event("k-1");
        bogus.event_type = "ContractBogusV9".to_string();

        let err = buffer
            .park(bogus, tenant(), "u1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventBufferError::Domain(DomainError::InvalidEventType { ref event_type, .. })
                if event_type == "ContractBogusV9"
        ));

        let mut garbled = event("k-1");
        garbled.payload = serde_json::json!({ "requestedAt": "soon" });
        let err = buffer
            .park(garbled, tenant(), "u1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EventBufferError::Domain(DomainError::Validation(_))));
        assert!(buffer.parked_store().is_empty().await);
    }

    #[tokio::test]
    async fn unknown_event_type_is_never_appended() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_secs(30));
        let mut bogus = event("k-1");
        bogus.event_type = "ContractBogusV9".to_string();
        buffer
            .parked_store()
            .upsert(ParkedEvent::new("u1", tenant(), bogus, Utc::now()))
            .await
            .unwrap();

        let err = buffer
            .dispatch_by_uuid("u1", &Cancellation::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventBufferError::Domain(DomainError::InvalidEventType { .. })
        ));
        assert!(buffer.parked_store().get("u1").await.unwrap().is_some());
        assert_eq!(store.event_count().await, 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();
        assert_eq!(report, DispatchReport { dispatched: 0, failed: 1 });
        assert_eq!(store.event_count().await, 0);
    }

    /// Parks `replacement` under its uuid just before a dispatched entry is removed.
    #[derive(Clone)]
    struct ReparkingStore {
        inner: InMemoryParkedEventStore,
        replacement: ParkedEvent,
    }

    #[async_trait::async_trait]
    impl ParkedEventStore for ReparkingStore {
        async fn upsert(&self, entry: ParkedEvent) -> Result<Option<ParkedEvent>> {
            self.inner.upsert(entry).await
        }

        async fn delete(&self, uuid: &str) -> Result<bool> {
            self.inner.delete(uuid).await
        }

        async fn delete_exact(&self, entry: &ParkedEvent) -> Result<bool> {
            self.inner.upsert(self.replacement.clone()).await?;
            self.inner.delete_exact(entry).await
        }

        async fn get(&self, uuid: &str) -> Result<Option<ParkedEvent>> {
            self.inner.get(uuid).await
        }

        async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<ParkedEvent>> {
            self.inner.list_expired(now).await
        }
    }

    #[tokio::test]
    async fn entry_reparked_during_dispatch_survives() {
        let store = InMemoryEventStore::new();
        let later = Utc::now() + ChronoDuration::hours(1);
        let parked = ReparkingStore {
            inner: InMemoryParkedEventStore::new(),
            replacement: ParkedEvent::new("u1", tenant(), event("k-2"), later),
        };
        let buffer = EventBuffer::new(
            AggregateStore::new(store.clone()),
            parked.clone(),
            EventBufferConfig::default(),
        );

        buffer
            .park(event("k-1"), tenant(), "u1", Utc::now())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let report = buffer.dispatch(&Cancellation::new()).await.unwrap();
        assert_eq!(report, DispatchReport { dispatched: 1, failed: 0 });
        assert_eq!(store.read_stream(&stream("k-1")).await.unwrap().len(), 1);

        let kept = parked.inner.get("u1").await.unwrap().unwrap();
        assert_eq!(kept, parked.replacement);
        assert_eq!(kept.event.aggregate_id, stream("k-2"));
        assert!(store.read_stream(&stream("k-2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn background_task_dispatches_on_tick() {
        let store = InMemoryEventStore::new();
        let buffer = buffer(&store, Duration::from_millis(50));

        assert!(buffer.start().await);
        assert!(!buffer.start().await);
        assert!(buffer.is_running().await);

        buffer
            .park(event("k-1"), tenant(), "u1", Utc::now())
            .await
            .unwrap();

        let mut delivered = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            if store.event_count().await == 1 {
                delivered = true;
                break;
            }
        }
        assert!(delivered);
        assert!(buffer.parked_store().is_empty().await);

        buffer.stop().await;
        assert!(!buffer.is_running().await);
        buffer.stop().await;

        assert!(buffer.start().await);
        buffer.stop().await;
    }
}
