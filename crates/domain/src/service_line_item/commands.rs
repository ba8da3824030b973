//! Service line item commands.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::command::{BaseCommand, Command, TaggedCommand, decode_body, invalid_command_type};
use crate::error::Result;

use super::{BilledType, SERVICE_LINE_ITEM};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceLineItem {
    pub contract_id: String,
    /// Defaults to the item's own id, which makes it the first version.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub previous_version_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub billed: BilledType,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// In-place correction of an item; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceLineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub billed: Option<BilledType>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseServiceLineItem {
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled: bool,
}

/// Update request as issued by callers.
///
/// A retroactive correction rewrites the addressed item. Anything else
/// becomes a new version: a new item under the same parent, linked back to
/// the item it replaces.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItemUpdateRequest {
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_retroactive_correction: bool,
    #[serde(flatten)]
    pub data: UpdateServiceLineItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceLineItemAction {
    Create(CreateServiceLineItem),
    Update(UpdateServiceLineItem),
    Close(CloseServiceLineItem),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceLineItemCommand {
    pub base: BaseCommand,
    pub action: ServiceLineItemAction,
}

impl ServiceLineItemCommand {
    pub fn new(base: BaseCommand, action: ServiceLineItemAction) -> Self {
        Self { base, action }
    }
}

impl Command for ServiceLineItemCommand {
    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn command_type(&self) -> &'static str {
        match self.action {
            ServiceLineItemAction::Create(_) => "CreateServiceLineItem",
            ServiceLineItemAction::Update(_) => "UpdateServiceLineItem",
            ServiceLineItemAction::Close(_) => "CloseServiceLineItem",
            ServiceLineItemAction::Delete => "DeleteServiceLineItem",
        }
    }

    fn creates_stream(&self) -> bool {
        matches!(self.action, ServiceLineItemAction::Create(_))
    }
}

impl TaggedCommand for ServiceLineItemCommand {
    fn from_tagged(kind: &str, base: BaseCommand, body: serde_json::Value) -> Result<Self> {
        let action = match kind {
            "CreateServiceLineItem" => ServiceLineItemAction::Create(decode_body(kind, body)?),
            "UpdateServiceLineItem" => ServiceLineItemAction::Update(decode_body(kind, body)?),
            "CloseServiceLineItem" => ServiceLineItemAction::Close(decode_body(kind, body)?),
            "DeleteServiceLineItem" => ServiceLineItemAction::Delete,
            _ => return Err(invalid_command_type(&SERVICE_LINE_ITEM, kind)),
        };
        Ok(Self::new(base, action))
    }
}
