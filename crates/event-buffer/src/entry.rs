//! The parked event model.

use chrono::{DateTime, Utc};
use common::Tenant;
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};

/// An event held back until its expiry or an explicit release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkedEvent {
    /// Caller-assigned idempotency key.
    pub uuid: String,
    pub tenant: Tenant,
    pub event: EventEnvelope,
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ParkedEvent {
    pub fn new(
        uuid: impl Into<String>,
        tenant: Tenant,
        event: EventEnvelope,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            tenant,
            event,
            expiry,
            created_at: Utc::now(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub dispatched: usize,
    pub failed: usize,
}
