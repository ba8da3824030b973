pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::{AggregateId, AggregateType, Tenant};
pub use error::{EventStoreError, Result};
pub use event::{
    EventEnvelope, EventEnvelopeBuilder, EventId, EventMetadata, ExpectedVersion, Version,
    next_version,
};
pub use memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreExt, EventStream};
