//! Identifier types shared by every crate in the workspace.

pub mod metadata;
mod types;

pub use types::{AggregateId, AggregateType, Tenant, new_object_id};
