//! Append-only event store backing the fulfillment audit trail.
//!
//! Every change to a fulfillment order is persisted as one event envelope.
//! The ordered envelopes of an order are its audit trail; current state is
//! rebuilt by replaying them.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt};
