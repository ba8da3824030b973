//! Domain layer for the event-sourcing system.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - AggregateStore for loading and saving aggregates with optimistic concurrency
//! - Command trait and CommandHandler with bounded retry on conflicts
//! - Organization, Contract and ServiceLineItem aggregates with their services
//! - EventRegistry for validating raw events against those aggregates

pub mod aggregate;
pub mod cancel;
pub mod command;
pub mod contract;
pub mod error;
pub mod organization;
pub mod registry;
pub mod service_line_item;
pub mod store;
pub mod stream;

pub use aggregate::{Aggregate, AggregateBase, DomainEvent};
pub use cancel::Cancellation;
pub use command::{
    BaseCommand, Command, CommandHandler, CommandOutcome, RetryConfig, TaggedCommand,
};
pub use contract::{Contract, ContractService, ContractStatus};
pub use error::{DomainError, ErrorKind, Result};
pub use organization::{Organization, OrganizationService};
pub use registry::EventRegistry;
pub use service_line_item::{BilledType, ServiceLineItem, ServiceLineItemService};
pub use store::AggregateStore;
pub use stream::{RawEvent, Republish, StreamAggregate};
