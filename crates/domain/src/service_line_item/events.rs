//! Service line item domain events.

use chrono::{DateTime, Utc};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, decode_payload, invalid_event_type};
use crate::error::Result;

use super::{BilledType, SERVICE_LINE_ITEM};

pub const SERVICE_LINE_ITEM_CREATE_V1: &str = "ServiceLineItemCreateV1";
pub const SERVICE_LINE_ITEM_UPDATE_V1: &str = "ServiceLineItemUpdateV1";
pub const SERVICE_LINE_ITEM_CLOSE_V1: &str = "ServiceLineItemCloseV1";
pub const SERVICE_LINE_ITEM_DELETE_V1: &str = "ServiceLineItemDeleteV1";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServiceLineItemEvent {
    Created(ServiceLineItemCreatedData),
    Updated(ServiceLineItemUpdatedData),
    Closed(ServiceLineItemClosedData),
    Deleted(ServiceLineItemDeletedData),
}

impl DomainEvent for ServiceLineItemEvent {
    fn event_type(&self) -> &str {
        match self {
            Self::Created(_) => SERVICE_LINE_ITEM_CREATE_V1,
            Self::Updated(_) => SERVICE_LINE_ITEM_UPDATE_V1,
            Self::Closed(_) => SERVICE_LINE_ITEM_CLOSE_V1,
            Self::Deleted(_) => SERVICE_LINE_ITEM_DELETE_V1,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        match envelope.event_type.as_str() {
            SERVICE_LINE_ITEM_CREATE_V1 => decode_payload(envelope).map(Self::Created),
            SERVICE_LINE_ITEM_UPDATE_V1 => decode_payload(envelope).map(Self::Updated),
            SERVICE_LINE_ITEM_CLOSE_V1 => decode_payload(envelope).map(Self::Closed),
            SERVICE_LINE_ITEM_DELETE_V1 => decode_payload(envelope).map(Self::Deleted),
            _ => Err(invalid_event_type(&SERVICE_LINE_ITEM, envelope)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItemCreatedData {
    pub contract_id: String,
    pub parent_id: String,
    #[serde(default)]
    pub previous_version_id: Option<String>,
    pub name: String,
    pub billed: BilledType,
    pub price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub comments: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItemUpdatedData {
    pub name: String,
    pub billed: BilledType,
    pub price: f64,
    pub quantity: i64,
    #[serde(default)]
    pub comments: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItemClosedData {
    pub ended_at: DateTime<Utc>,
    pub is_canceled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItemDeletedData {
    pub deleted_at: DateTime<Utc>,
}
