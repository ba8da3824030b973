//! Contract domain events.

use chrono::{DateTime, Utc};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, decode_payload, invalid_event_type};
use crate::error::Result;

use super::{CONTRACT, ContractStatus};

pub const CONTRACT_CREATE_V1: &str = "ContractCreateV1";
pub const CONTRACT_UPDATE_V1: &str = "ContractUpdateV1";
pub const CONTRACT_UPDATE_STATUS_V1: &str = "ContractUpdateStatusV1";
pub const CONTRACT_ROLLOUT_RENEWAL_OPPORTUNITY_V1: &str = "ContractRolloutRenewalOpportunityV1";
pub const CONTRACT_DELETE_V1: &str = "ContractDeleteV1";

/// Events that can occur on a contract aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContractEvent {
    Created(ContractCreatedData),
    Updated(ContractUpdatedData),
    StatusUpdated(ContractStatusData),
    RenewalOpportunityRolledOut(RenewalOpportunityData),
    Deleted(ContractDeletedData),
}

impl DomainEvent for ContractEvent {
    fn event_type(&self) -> &str {
        match self {
            ContractEvent::Created(_) => CONTRACT_CREATE_V1,
            ContractEvent::Updated(_) => CONTRACT_UPDATE_V1,
            ContractEvent::StatusUpdated(_) => CONTRACT_UPDATE_STATUS_V1,
            ContractEvent::RenewalOpportunityRolledOut(_) => {
                CONTRACT_ROLLOUT_RENEWAL_OPPORTUNITY_V1
            }
            ContractEvent::Deleted(_) => CONTRACT_DELETE_V1,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        match envelope.event_type.as_str() {
            CONTRACT_CREATE_V1 => decode_payload(envelope).map(Self::Created),
            CONTRACT_UPDATE_V1 => decode_payload(envelope).map(Self::Updated),
            CONTRACT_UPDATE_STATUS_V1 => decode_payload(envelope).map(Self::StatusUpdated),
            CONTRACT_ROLLOUT_RENEWAL_OPPORTUNITY_V1 => {
                decode_payload(envelope).map(Self::RenewalOpportunityRolledOut)
            }
            CONTRACT_DELETE_V1 => decode_payload(envelope).map(Self::Deleted),
            _ => Err(invalid_event_type(&CONTRACT, envelope)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCreatedData {
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub contract_url: String,
    #[serde(default)]
    pub created_by_user_id: String,
    pub service_started_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub length_in_months: i64,
    pub due_days: i64,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
}

/// Full post-update values of the updatable fields plus the mask that was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractUpdatedData {
    pub name: String,
    pub contract_url: String,
    pub service_started_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub length_in_months: i64,
    pub due_days: i64,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub fields_mask: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractStatusData {
    pub status: ContractStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOpportunityData {
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDeletedData {
    pub deleted_at: DateTime<Utc>,
}
