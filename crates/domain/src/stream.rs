//! A schema-less aggregate over any stream, used to re-append stored events.

use std::collections::HashMap;

use common::{AggregateId, AggregateType, Tenant, metadata};
use event_store::{EventEnvelope, EventId};

use crate::aggregate::{Aggregate, AggregateBase, DomainEvent};
use crate::command::{BaseCommand, Command};
use crate::error::Result;

const STREAM: AggregateType = AggregateType::from_static("stream");

/// An event carried by type tag and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl DomainEvent for RawEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(self.payload.clone())
    }

    fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        Ok(Self {
            event_type: envelope.event_type.clone(),
            payload: envelope.payload.clone(),
        })
    }
}

/// Re-appends an event at the head of its stream.
#[derive(Debug, Clone)]
pub struct Republish {
    pub base: BaseCommand,
    pub aggregate_id: AggregateId,
    pub aggregate_type: AggregateType,
    pub event: RawEvent,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Id of the event this one re-publishes.
    pub causation_id: Option<EventId>,
}

impl Republish {
    pub fn new(
        tenant: Tenant,
        aggregate_id: AggregateId,
        aggregate_type: AggregateType,
        event: RawEvent,
    ) -> Self {
        Self {
            base: BaseCommand::new(tenant, aggregate_id.as_str()),
            aggregate_id,
            aggregate_type,
            event,
            metadata: HashMap::new(),
            causation_id: None,
        }
    }
}

impl Command for Republish {
    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn command_type(&self) -> &'static str {
        "Republish"
    }

    fn creates_stream(&self) -> bool {
        true
    }
}

/// Aggregate that accepts any event type and keeps no state beyond its version.
#[derive(Debug)]
pub struct StreamAggregate {
    base: AggregateBase,
}

impl Aggregate for StreamAggregate {
    type Event = RawEvent;
    type Command = Republish;

    const AGGREGATE_TYPE: AggregateType = STREAM;

    fn with_tenant_and_id(tenant: Tenant, object_id: &str) -> Self {
        Self {
            base: AggregateBase::new(STREAM, tenant, object_id),
        }
    }

    fn for_command(command: &Republish) -> Self {
        Self {
            base: AggregateBase::with_raw_id(
                command.aggregate_type.clone(),
                command.base.tenant.clone(),
                command.aggregate_id.clone(),
            ),
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, _event: &RawEvent) {}

    fn handle_command(&mut self, command: &Republish) -> Result<()> {
        let mut metadata = command.metadata.clone();
        if let Some(causation_id) = command.causation_id {
            metadata.insert(
                metadata::CAUSATION_ID.to_string(),
                serde_json::Value::String(causation_id.to_string()),
            );
        }
        self.apply_with_raw_metadata(command.event.clone(), metadata)
    }
}

#[cfg(test)]
mod tests {
    use event_store::{EventStore, InMemoryEventStore, Version};

    use super::*;
    use crate::cancel::Cancellation;
    use crate::command::CommandHandler;
    use crate::store::AggregateStore;

    const CONTRACT: AggregateType = AggregateType::from_static("contract");

    fn republish(object_id: &str) -> Republish {
        let tenant = Tenant::new("acme");
        let aggregate_id = AggregateId::new(&CONTRACT, &tenant, object_id);
        let mut command = Republish::new(
            tenant,
            aggregate_id,
            CONTRACT,
            RawEvent {
                event_type: "ContractRolloutRenewalOpportunityV1".to_string(),
                payload: serde_json::json!({"requestedAt": "2026-01-01T00:00:00Z"}),
            },
        );
        command.metadata.insert(
            metadata::USER_ID.to_string(),
            serde_json::Value::String("u-9".to_string()),
        );
        command
    }

    #[tokio::test]
    async fn republish_appends_at_stream_head() {
        let inner = InMemoryEventStore::new();
        let handler: CommandHandler<_, StreamAggregate> =
            CommandHandler::new(AggregateStore::new(inner.clone()));
        let cancel = Cancellation::new();
        let original = EventId::new();

        let mut first = republish("c-1");
        first.causation_id = Some(original);
        handler.handle(&first, &cancel).await.unwrap();
        let outcome = handler.handle(&republish("c-1"), &cancel).await.unwrap();

        assert_eq!(outcome.events[0].version, Version::new(1));

        let stored = inner.read_stream(&first.aggregate_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].aggregate_type, CONTRACT);
        assert_eq!(stored[0].event_type, "ContractRolloutRenewalOpportunityV1");
        assert_eq!(stored[0].metadata_str(metadata::USER_ID), Some("u-9"));
        assert_eq!(
            stored[0].metadata_str(metadata::CAUSATION_ID),
            Some(original.to_string().as_str())
        );
        assert_eq!(stored[1].metadata_str(metadata::CAUSATION_ID), None);
    }
}
