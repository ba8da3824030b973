//! Lookup of the event types each aggregate type accepts.

use std::collections::HashMap;

use common::AggregateType;
use event_store::EventEnvelope;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::contract::Contract;
use crate::error::{DomainError, Result};
use crate::organization::Organization;
use crate::service_line_item::ServiceLineItem;

type Check = fn(&EventEnvelope) -> Result<()>;

fn decodes_as<A: Aggregate>(envelope: &EventEnvelope) -> Result<()> {
    A::Event::from_envelope(envelope).map(drop)
}

/// Checks raw envelopes against the event sum types of registered aggregates.
///
/// Raw envelopes bypass the typed command path, so anything that appends
/// them (the event buffer) validates here first.
#[derive(Debug, Clone)]
pub struct EventRegistry {
    checks: HashMap<AggregateType, Check>,
}

impl EventRegistry {
    pub fn empty() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    pub fn register<A: Aggregate>(mut self) -> Self {
        self.checks.insert(A::AGGREGATE_TYPE, decodes_as::<A>);
        self
    }

    pub fn contains(&self, aggregate_type: &AggregateType) -> bool {
        self.checks.contains_key(aggregate_type)
    }

    /// Accepts the envelope only if its aggregate type is registered and the
    /// aggregate decodes its event type and payload.
    ///
    /// Unknown aggregate or event types fail with `InvalidEventType`; a
    /// payload that does not match its type fails with `Validation`.
    pub fn validate(&self, envelope: &EventEnvelope) -> Result<()> {
        let check = self.checks.get(&envelope.aggregate_type).ok_or_else(|| {
            DomainError::InvalidEventType {
                aggregate_type: envelope.aggregate_type.to_string(),
                event_type: envelope.event_type.clone(),
            }
        })?;
        check(envelope).map_err(|err| match err {
            DomainError::CorruptEvent {
                event_type, source, ..
            } => DomainError::Validation(format!("payload of `{event_type}`: {source}")),
            other => other,
        })
    }
}

impl Default for EventRegistry {
    /// Registry of every CRM aggregate.
    fn default() -> Self {
        Self::empty()
            .register::<Organization>()
            .register::<Contract>()
            .register::<ServiceLineItem>()
    }
}
