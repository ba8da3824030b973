//! Loading and saving aggregates on top of the event log.

use common::{AggregateId, AggregateType, Tenant};
use event_store::{EventStore, EventStoreError, ExpectedVersion};

use crate::aggregate::Aggregate;
use crate::error::{DomainError, Result};

/// Persists aggregates as their event streams.
#[derive(Debug, Clone)]
pub struct AggregateStore<S> {
    store: S,
}

impl<S: EventStore> AggregateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying event log.
    pub fn event_store(&self) -> &S {
        &self.store
    }

    /// Hydrates an empty aggregate by replaying its stream.
    ///
    /// Fails with `AggregateNotFound` when the stream has no events.
    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate.id()))]
    pub async fn load<A: Aggregate>(&self, aggregate: &mut A) -> Result<()> {
        let events = self.store.read_stream(aggregate.id()).await?;
        if events.is_empty() {
            return Err(DomainError::AggregateNotFound(aggregate.id().clone()));
        }

        for event in &events {
            aggregate.raise_event(event).inspect_err(|err| {
                tracing::error!(
                    event_type = %event.event_type,
                    version = %event.version,
                    error = %err,
                    "Failed to replay event"
                );
            })?;
        }

        tracing::debug!(version = ?aggregate.version(), events = events.len(), "Aggregate loaded");
        Ok(())
    }

    /// Appends the aggregate's uncommitted events in one atomic batch.
    ///
    /// The expected version is the version the aggregate was loaded at. On
    /// success the pending events are cleared and the version advances; on a
    /// mismatch nothing is written and `WrongExpectedVersion` is returned.
    #[tracing::instrument(skip_all, fields(aggregate_id = %aggregate.id()))]
    pub async fn save<A: Aggregate>(&self, aggregate: &mut A) -> Result<()> {
        let events = aggregate.uncommitted_events().to_vec();
        if events.is_empty() {
            return Ok(());
        }

        let expected = ExpectedVersion::from_current(aggregate.version());
        let count = events.len();
        let new_version = self
            .store
            .append_to_stream(aggregate.id(), expected, events)
            .await
            .map_err(|err| match err {
                EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                } => DomainError::WrongExpectedVersion {
                    aggregate_id,
                    expected,
                    actual,
                },
                other => DomainError::EventStore(other),
            })?;

        aggregate.base_mut().mark_committed(new_version);
        tracing::debug!(%new_version, count, "Aggregate saved");
        Ok(())
    }

    /// Checks that a stream has at least one event, without replaying it.
    pub async fn exists(&self, aggregate_id: &AggregateId) -> Result<()> {
        match self.store.stream_version(aggregate_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::AggregateNotFound(aggregate_id.clone())),
        }
    }

    /// Checks that another aggregate a command points at has been created.
    ///
    /// A missing stream surfaces as `ReferencedAggregateNotFound` rather than
    /// `AggregateNotFound`, since the command's own aggregate is not the one missing.
    pub async fn require_reference(
        &self,
        aggregate_type: &AggregateType,
        tenant: &Tenant,
        object_id: &str,
    ) -> Result<()> {
        let id = AggregateId::new(aggregate_type, tenant, object_id);
        self.exists(&id).await.map_err(|err| match err {
            DomainError::AggregateNotFound(_) => DomainError::ReferencedAggregateNotFound {
                aggregate_type: aggregate_type.to_string(),
                object_id: object_id.to_string(),
            },
            other => other,
        })
    }
}
