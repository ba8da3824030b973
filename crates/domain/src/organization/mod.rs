//! Organization aggregate and related types.

mod aggregate;
mod commands;
pub mod events;
mod service;

use common::AggregateType;

pub use aggregate::{LinkedEmail, Organization, OrganizationState};
pub use commands::*;
pub use events::OrganizationEvent;
pub use service::OrganizationService;

pub const ORGANIZATION: AggregateType = AggregateType::from_static("organization");
