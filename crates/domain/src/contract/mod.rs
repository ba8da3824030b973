//! Contract aggregate and related types.

mod aggregate;
mod commands;
pub mod events;
mod service;
mod status;

use common::AggregateType;

pub use aggregate::{Contract, ContractState};
pub use commands::*;
pub use events::ContractEvent;
pub use service::ContractService;
pub use status::ContractStatus;

pub const CONTRACT: AggregateType = AggregateType::from_static("contract");
