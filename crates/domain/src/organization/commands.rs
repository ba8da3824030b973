//! Organization commands.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::command::{BaseCommand, Command, TaggedCommand, decode_body, invalid_command_type};
use crate::error::Result;

use super::ORGANIZATION;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganization {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganization {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkDomain {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnlinkDomain {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEmail {
    pub email_id: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrganizationAction {
    Create(CreateOrganization),
    Update(UpdateOrganization),
    LinkDomain(LinkDomain),
    UnlinkDomain(UnlinkDomain),
    LinkEmail(LinkEmail),
    Hide,
    Show,
}

/// A command addressed to one organization.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationCommand {
    pub base: BaseCommand,
    pub action: OrganizationAction,
}

impl OrganizationCommand {
    pub fn new(base: BaseCommand, action: OrganizationAction) -> Self {
        Self { base, action }
    }
}

impl Command for OrganizationCommand {
    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn command_type(&self) -> &'static str {
        match self.action {
            OrganizationAction::Create(_) => "CreateOrganization",
            OrganizationAction::Update(_) => "UpdateOrganization",
            OrganizationAction::LinkDomain(_) => "LinkDomain",
            OrganizationAction::UnlinkDomain(_) => "UnlinkDomain",
            OrganizationAction::LinkEmail(_) => "LinkEmail",
            OrganizationAction::Hide => "HideOrganization",
            OrganizationAction::Show => "ShowOrganization",
        }
    }

    fn creates_stream(&self) -> bool {
        matches!(self.action, OrganizationAction::Create(_))
    }
}

impl TaggedCommand for OrganizationCommand {
    fn from_tagged(kind: &str, base: BaseCommand, body: serde_json::Value) -> Result<Self> {
        let action = match kind {
            "CreateOrganization" => OrganizationAction::Create(decode_body(kind, body)?),
            "UpdateOrganization" => OrganizationAction::Update(decode_body(kind, body)?),
            "LinkDomain" => OrganizationAction::LinkDomain(decode_body(kind, body)?),
            "UnlinkDomain" => OrganizationAction::UnlinkDomain(decode_body(kind, body)?),
            "LinkEmail" => OrganizationAction::LinkEmail(decode_body(kind, body)?),
            "HideOrganization" => OrganizationAction::Hide,
            "ShowOrganization" => OrganizationAction::Show,
            _ => return Err(invalid_command_type(&ORGANIZATION, kind)),
        };
        Ok(Self::new(base, action))
    }
}
