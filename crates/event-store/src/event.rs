use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{AggregateType, Tenant, metadata};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError};

/// Event types starting with this prefix belong to the log itself, not to a domain.
pub const INTERNAL_EVENT_PREFIX: &str = "$";

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event within its stream.
///
/// The first event of a stream is version 0; each further event increments
/// by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of the first event in a stream.
    pub fn first() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Precondition on a stream's head when appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// No check; the batch is placed after whatever is there.
    Any,
    /// The stream must be empty.
    NoStream,
    /// The stream's last event must be at exactly this version.
    Exact(Version),
}

impl ExpectedVersion {
    /// Expectation matching an aggregate that has applied events up to `version`.
    pub fn from_current(version: Option<Version>) -> Self {
        match version {
            Some(version) => Self::Exact(version),
            None => Self::NoStream,
        }
    }

    /// Returns true if a stream currently at `actual` satisfies this expectation.
    pub fn matches(&self, actual: Option<Version>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStream => actual.is_none(),
            Self::Exact(expected) => actual == Some(*expected),
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::NoStream => f.write_str("no stream"),
            Self::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Returns the version the next appended event must carry.
pub fn next_version(current: Option<Version>) -> Version {
    current.map_or_else(Version::first, |v| v.next())
}

/// Who and what caused an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub tenant: Option<Tenant>,
    pub user_id: Option<String>,
    pub app: Option<String>,
    pub causation_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl EventMetadata {
    pub fn for_tenant(tenant: &Tenant) -> Self {
        Self {
            tenant: Some(tenant.clone()),
            ..Default::default()
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into()).filter(|u: &String| !u.is_empty());
        self
    }

    pub fn app(mut self, app: Option<impl Into<String>>) -> Self {
        self.app = app.map(Into::into).filter(|a: &String| !a.is_empty());
        self
    }

    /// Writes the populated fields into a raw metadata map, leaving other keys alone.
    pub fn write_into(&self, map: &mut HashMap<String, serde_json::Value>) {
        let entries = [
            (metadata::TENANT, self.tenant.as_ref().map(|t| t.to_string())),
            (metadata::USER_ID, self.user_id.clone()),
            (metadata::APP, self.app.clone()),
            (metadata::CAUSATION_ID, self.causation_id.clone()),
            (metadata::CORRELATION_ID, self.correlation_id.clone()),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                map.insert(key.to_string(), serde_json::Value::String(value));
            }
        }
    }
}

/// An event envelope: one immutable fact in exactly one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Globally unique identifier for this event.
    pub event_id: EventId,

    /// Versioned type tag, e.g. `"ContractCreateV1"`.
    pub event_type: String,

    /// The stream this event belongs to.
    pub aggregate_id: AggregateId,

    /// The kind of aggregate owning the stream.
    pub aggregate_type: AggregateType,

    /// Position of this event within its stream.
    pub version: Version,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Tenant, acting user, app source, causation and correlation ids.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Returns true for bookkeeping events written by the log itself.
    pub fn is_internal(&self) -> bool {
        self.event_type.starts_with(INTERNAL_EVENT_PREFIX)
    }

    /// Reads a string metadata entry.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn tenant(&self) -> Option<Tenant> {
        self.metadata_str(metadata::TENANT).map(Tenant::from)
    }

    /// Deserializes the payload into a concrete event data type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<AggregateType>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: AggregateType) -> Self {
        self.aggregate_type = Some(aggregate_type);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Adds the populated fields of an [`EventMetadata`].
    pub fn with_metadata(mut self, metadata: &EventMetadata) -> Self {
        metadata.write_into(&mut self.metadata);
        self
    }

    /// Builds the envelope, failing if a required field is missing.
    pub fn build(self) -> Result<EventEnvelope, EventStoreError> {
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self
                .event_type
                .ok_or(EventStoreError::IncompleteEvent("event_type"))?,
            aggregate_id: self
                .aggregate_id
                .ok_or(EventStoreError::IncompleteEvent("aggregate_id"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or(EventStoreError::IncompleteEvent("aggregate_type"))?,
            version: self
                .version
                .ok_or(EventStoreError::IncompleteEvent("version"))?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.unwrap_or(serde_json::Value::Null),
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract_id() -> AggregateId {
        AggregateId::new(
            &AggregateType::from_static("contract"),
            &Tenant::new("acme"),
            "c-1",
        )
    }

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn versions_start_at_zero() {
        assert_eq!(Version::first().as_i64(), 0);
        assert_eq!(next_version(None), Version::first());
        assert_eq!(next_version(Some(Version::new(4))), Version::new(5));
    }

    #[test]
    fn expected_version_matching() {
        assert!(ExpectedVersion::Any.matches(None));
        assert!(ExpectedVersion::Any.matches(Some(Version::new(3))));
        assert!(ExpectedVersion::NoStream.matches(None));
        assert!(!ExpectedVersion::NoStream.matches(Some(Version::first())));
        assert!(ExpectedVersion::Exact(Version::new(2)).matches(Some(Version::new(2))));
        assert!(!ExpectedVersion::Exact(Version::new(2)).matches(Some(Version::new(3))));
        assert!(!ExpectedVersion::Exact(Version::first()).matches(None));
    }

    #[test]
    fn event_envelope_builder() {
        let payload = serde_json::json!({"name": "Acme renewal"});
        let meta = EventMetadata::for_tenant(&Tenant::new("acme"))
            .user_id("u-1")
            .app(Some("customer-os-api"));

        let envelope = EventEnvelope::builder()
            .event_type("ContractCreateV1")
            .aggregate_id(contract_id())
            .aggregate_type(AggregateType::from_static("contract"))
            .version(Version::first())
            .payload_raw(payload.clone())
            .with_metadata(&meta)
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "ContractCreateV1");
        assert_eq!(envelope.aggregate_id, contract_id());
        assert_eq!(envelope.payload, payload);
        assert_eq!(envelope.tenant(), Some(Tenant::new("acme")));
        assert_eq!(envelope.metadata_str(metadata::USER_ID), Some("u-1"));
        assert_eq!(envelope.metadata_str(metadata::APP), Some("customer-os-api"));
        assert!(!envelope.is_internal());
    }

    #[test]
    fn build_reports_missing_field() {
        let result = EventEnvelope::builder().event_type("X").build();
        assert!(matches!(
            result,
            Err(EventStoreError::IncompleteEvent("aggregate_id"))
        ));
    }

    #[test]
    fn empty_user_and_app_are_not_recorded() {
        let meta = EventMetadata::for_tenant(&Tenant::new("acme"))
            .user_id("")
            .app(Some(""));
        let mut map = HashMap::new();
        meta.write_into(&mut map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key(metadata::TENANT));
    }

    #[test]
    fn internal_events_are_detected() {
        let envelope = EventEnvelope::builder()
            .event_type("$metadata")
            .aggregate_id(contract_id())
            .aggregate_type(AggregateType::from_static("contract"))
            .version(Version::first())
            .build()
            .unwrap();
        assert!(envelope.is_internal());
    }
}
