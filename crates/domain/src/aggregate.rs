//! Core aggregate and domain event traits.

use std::collections::HashMap;

use common::{AggregateId, AggregateType, Tenant};
use event_store::{EventEnvelope, EventMetadata, Version, next_version};
use serde::de::DeserializeOwned;

use crate::command::Command;
use crate::error::{DomainError, Result};

/// Trait for domain events.
///
/// Each aggregate declares one event sum type; every variant maps to a
/// versioned type tag such as `"ContractCreateV1"`.
pub trait DomainEvent: Send + Sync + Sized {
    /// Returns the versioned type tag written to the log.
    fn event_type(&self) -> &str;

    /// Serializes the variant's data into the envelope payload.
    fn to_payload(&self) -> Result<serde_json::Value>;

    /// Decodes a stored envelope back into the sum type.
    ///
    /// Unknown tags fail with `InvalidEventType`; payloads that do not match
    /// the tag fail with `CorruptEvent`.
    fn from_envelope(envelope: &EventEnvelope) -> Result<Self>;
}

/// Deserializes an envelope payload, reporting a mismatch as a corrupt event.
pub fn decode_payload<T: DeserializeOwned>(envelope: &EventEnvelope) -> Result<T> {
    envelope
        .payload_as()
        .map_err(|source| DomainError::CorruptEvent {
            aggregate_id: envelope.aggregate_id.clone(),
            event_type: envelope.event_type.clone(),
            version: envelope.version,
            source,
        })
}

pub fn invalid_event_type(aggregate_type: &AggregateType, envelope: &EventEnvelope) -> DomainError {
    DomainError::InvalidEventType {
        aggregate_type: aggregate_type.to_string(),
        event_type: envelope.event_type.clone(),
    }
}

/// State shared by every aggregate: identity, version and pending events.
#[derive(Debug, Clone)]
pub struct AggregateBase {
    id: AggregateId,
    aggregate_type: AggregateType,
    tenant: Tenant,
    version: Option<Version>,
    uncommitted: Vec<EventEnvelope>,
}

impl AggregateBase {
    pub fn new(aggregate_type: AggregateType, tenant: Tenant, object_id: &str) -> Self {
        let id = AggregateId::new(&aggregate_type, &tenant, object_id);
        Self::with_raw_id(aggregate_type, tenant, id)
    }

    /// Wraps an already formatted stream id.
    pub fn with_raw_id(aggregate_type: AggregateType, tenant: Tenant, id: AggregateId) -> Self {
        Self {
            id,
            aggregate_type,
            tenant,
            version: None,
            uncommitted: Vec::new(),
        }
    }

    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn object_id(&self) -> &str {
        self.id.object_id(&self.aggregate_type, &self.tenant)
    }

    /// Version of the last event loaded or saved; None before the first one.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn uncommitted_events(&self) -> &[EventEnvelope] {
        &self.uncommitted
    }

    /// True once the stream has at least one event, persisted or pending.
    pub fn exists(&self) -> bool {
        self.version.is_some() || !self.uncommitted.is_empty()
    }

    /// Version the next applied event receives.
    fn next_version(&self) -> Version {
        let head = self.uncommitted.last().map(|e| e.version).or(self.version);
        next_version(head)
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    pub(crate) fn mark_committed(&mut self, version: Version) {
        self.version = Some(version);
        self.uncommitted.clear();
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate's state is derived only from its stream: [`raise_event`]
/// replays stored events, [`apply`] records new ones produced by
/// [`handle_command`]. Both paths run the same [`when`] mutation.
///
/// [`raise_event`]: Aggregate::raise_event
/// [`apply`]: Aggregate::apply
/// [`handle_command`]: Aggregate::handle_command
/// [`when`]: Aggregate::when
pub trait Aggregate: Send + Sync + Sized {
    /// The event sum type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The command sum type this aggregate accepts.
    type Command: Command;

    const AGGREGATE_TYPE: AggregateType;

    /// Constructs an empty aggregate for one object of one tenant.
    fn with_tenant_and_id(tenant: Tenant, object_id: &str) -> Self;

    fn base(&self) -> &AggregateBase;

    fn base_mut(&mut self) -> &mut AggregateBase;

    /// Mutates state for one event. Must be deterministic and must not fail.
    fn when(&mut self, event: &Self::Event);

    /// Validates a command against current state and applies the resulting events.
    fn handle_command(&mut self, command: &Self::Command) -> Result<()>;

    /// Constructs the empty aggregate a command targets.
    fn for_command(command: &Self::Command) -> Self {
        let base = command.base();
        Self::with_tenant_and_id(base.tenant.clone(), &base.object_id)
    }

    fn id(&self) -> &AggregateId {
        self.base().id()
    }

    fn tenant(&self) -> &Tenant {
        self.base().tenant()
    }

    fn version(&self) -> Option<Version> {
        self.base().version()
    }

    fn uncommitted_events(&self) -> &[EventEnvelope] {
        self.base().uncommitted_events()
    }

    fn exists(&self) -> bool {
        self.base().exists()
    }

    /// Replays one stored event.
    ///
    /// Internal log events (type prefixed with `$`) are skipped.
    fn raise_event(&mut self, envelope: &EventEnvelope) -> Result<()> {
        if envelope.is_internal() {
            return Ok(());
        }
        let event = Self::Event::from_envelope(envelope)?;
        self.when(&event);
        self.base_mut().set_version(envelope.version);
        Ok(())
    }

    /// Records a new event with tenant, user and app metadata, and mutates state.
    fn apply(&mut self, event: Self::Event, metadata: &EventMetadata) -> Result<()> {
        let mut raw = HashMap::new();
        metadata.write_into(&mut raw);
        self.apply_with_raw_metadata(event, raw)
    }

    /// Like [`apply`](Aggregate::apply) but keeps a caller-supplied metadata map as is.
    fn apply_with_raw_metadata(
        &mut self,
        event: Self::Event,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        let base = self.base();
        let mut builder = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(base.id().clone())
            .aggregate_type(base.aggregate_type().clone())
            .version(base.next_version())
            .payload_raw(event.to_payload()?);
        for (key, value) in metadata {
            builder = builder.metadata(key, value);
        }
        let envelope = builder.build()?;

        self.base_mut().uncommitted.push(envelope);
        self.when(&event);
        Ok(())
    }
}
