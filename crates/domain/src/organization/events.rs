//! Organization domain events.

use chrono::{DateTime, Utc};
use event_store::EventEnvelope;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, decode_payload, invalid_event_type};
use crate::error::Result;

use super::ORGANIZATION;

pub const ORGANIZATION_CREATE_V1: &str = "OrganizationCreateV1";
pub const ORGANIZATION_UPDATE_V1: &str = "OrganizationUpdateV1";
pub const ORGANIZATION_REQUEST_SCRAPE_BY_WEBSITE_V1: &str = "OrganizationRequestScrapeByWebsiteV1";
pub const ORGANIZATION_LINK_DOMAIN_V1: &str = "OrganizationLinkDomainV1";
pub const ORGANIZATION_UNLINK_DOMAIN_V1: &str = "OrganizationUnlinkDomainV1";
pub const ORGANIZATION_EMAIL_LINK_V1: &str = "OrganizationEmailLinkV1";
pub const ORGANIZATION_HIDE_V1: &str = "OrganizationHideV1";
pub const ORGANIZATION_SHOW_V1: &str = "OrganizationShowV1";

/// Events that can occur on an organization aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrganizationEvent {
    Created(OrganizationCreatedData),
    Updated(OrganizationUpdatedData),
    /// Follow-up asking enrichment to scrape the organization's website.
    ScrapeRequested(ScrapeRequestedData),
    DomainLinked(DomainData),
    DomainUnlinked(DomainData),
    EmailLinked(EmailLinkedData),
    Hidden(VisibilityData),
    Shown(VisibilityData),
}

impl DomainEvent for OrganizationEvent {
    fn event_type(&self) -> &str {
        match self {
            OrganizationEvent::Created(_) => ORGANIZATION_CREATE_V1,
            OrganizationEvent::Updated(_) => ORGANIZATION_UPDATE_V1,
            OrganizationEvent::ScrapeRequested(_) => ORGANIZATION_REQUEST_SCRAPE_BY_WEBSITE_V1,
            OrganizationEvent::DomainLinked(_) => ORGANIZATION_LINK_DOMAIN_V1,
            OrganizationEvent::DomainUnlinked(_) => ORGANIZATION_UNLINK_DOMAIN_V1,
            OrganizationEvent::EmailLinked(_) => ORGANIZATION_EMAIL_LINK_V1,
            OrganizationEvent::Hidden(_) => ORGANIZATION_HIDE_V1,
            OrganizationEvent::Shown(_) => ORGANIZATION_SHOW_V1,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        match envelope.event_type.as_str() {
            ORGANIZATION_CREATE_V1 => decode_payload(envelope).map(Self::Created),
            ORGANIZATION_UPDATE_V1 => decode_payload(envelope).map(Self::Updated),
            ORGANIZATION_REQUEST_SCRAPE_BY_WEBSITE_V1 => {
                decode_payload(envelope).map(Self::ScrapeRequested)
            }
            ORGANIZATION_LINK_DOMAIN_V1 => decode_payload(envelope).map(Self::DomainLinked),
            ORGANIZATION_UNLINK_DOMAIN_V1 => decode_payload(envelope).map(Self::DomainUnlinked),
            ORGANIZATION_EMAIL_LINK_V1 => decode_payload(envelope).map(Self::EmailLinked),
            ORGANIZATION_HIDE_V1 => decode_payload(envelope).map(Self::Hidden),
            ORGANIZATION_SHOW_V1 => decode_payload(envelope).map(Self::Shown),
            _ => Err(invalid_event_type(&ORGANIZATION, envelope)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCreatedData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUpdatedData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequestedData {
    pub website: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainData {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLinkedData {
    pub email_id: String,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityData {
    pub updated_at: DateTime<Utc>,
}
