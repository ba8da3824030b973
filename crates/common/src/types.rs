use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer-level partition key scoping every stream and command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tenant(String);

impl Tenant {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self(tenant.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tenant {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Tenant {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Name of an aggregate kind, e.g. `"contract"`.
///
/// Concrete aggregates declare theirs as constants via [`AggregateType::from_static`];
/// types read back from stored events are owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateType(Cow<'static, str>);

impl AggregateType {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AggregateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one aggregate stream.
///
/// Always formatted as `"<aggregateType>-<tenant>-<objectId>"`, so constructing
/// the same aggregate kind for the same tenant and object twice yields the
/// same stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(String);

impl AggregateId {
    /// Builds the stream id for an object of the given aggregate type.
    pub fn new(aggregate_type: &AggregateType, tenant: &Tenant, object_id: &str) -> Self {
        Self(format!("{aggregate_type}-{tenant}-{object_id}"))
    }

    /// Wraps an already formatted stream id, e.g. one read from a stored event.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strips the `"<aggregateType>-<tenant>-"` prefix.
    ///
    /// Returns the raw id unchanged when it was not built for this type and tenant.
    pub fn object_id(&self, aggregate_type: &AggregateType, tenant: &Tenant) -> &str {
        let prefix = format!("{aggregate_type}-{tenant}-");
        self.0.strip_prefix(prefix.as_str()).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a fresh object id for aggregates created without a caller-supplied id.
pub fn new_object_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: AggregateType = AggregateType::from_static("contract");

    #[test]
    fn aggregate_id_is_deterministic() {
        let tenant = Tenant::new("acme");
        let first = AggregateId::new(&CONTRACT, &tenant, "c-1");
        let second = AggregateId::new(&CONTRACT, &tenant, "c-1");
        assert_eq!(first, second);
        assert_eq!(first.as_str(), "contract-acme-c-1");
    }

    #[test]
    fn object_id_strips_prefix() {
        let tenant = Tenant::new("acme");
        let id = AggregateId::new(&CONTRACT, &tenant, "1234-abcd");
        assert_eq!(id.object_id(&CONTRACT, &tenant), "1234-abcd");
    }

    #[test]
    fn object_id_of_foreign_stream_is_unchanged() {
        let id = AggregateId::from_raw("organization-acme-1");
        assert_eq!(
            id.object_id(&CONTRACT, &Tenant::new("acme")),
            "organization-acme-1"
        );
    }

    #[test]
    fn new_object_ids_are_unique() {
        assert_ne!(new_object_id(), new_object_id());
    }

    #[test]
    fn aggregate_id_serializes_as_plain_string() {
        let id = AggregateId::new(&CONTRACT, &Tenant::new("t1"), "x");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"contract-t1-x\"");
        let back: AggregateId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
