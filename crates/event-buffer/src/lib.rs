//! Time-delayed event buffer.
//!
//! Events can be parked with an expiry instead of being committed right away.
//! A periodic task, or an explicit release, later replays each parked event
//! into its stream through the regular command pipeline.

pub mod buffer;
pub mod entry;
pub mod error;
pub mod store;

pub use buffer::{EventBuffer, EventBufferConfig};
pub use entry::{DispatchReport, ParkedEvent};
pub use error::{EventBufferError, Result};
pub use store::{InMemoryParkedEventStore, ParkedEventStore};
