//! Service line item aggregate and related types.
//!
//! A line item belongs to a contract. Price or quantity changes are modelled
//! as new versions: a fresh item that shares the original's `parent_id`.

mod aggregate;
mod commands;
pub mod events;
mod service;

use common::AggregateType;
use serde::{Deserialize, Serialize};

pub use aggregate::{ServiceLineItem, ServiceLineItemState};
pub use commands::*;
pub use events::ServiceLineItemEvent;
pub use service::ServiceLineItemService;

pub const SERVICE_LINE_ITEM: AggregateType = AggregateType::from_static("service_line_item");

/// How a line item is billed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BilledType {
    Monthly,
    Quarterly,
    Annually,
    Once,
    Usage,
    #[default]
    None,
}

impl BilledType {
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Monthly | Self::Quarterly | Self::Annually)
    }
}
