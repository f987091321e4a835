//! Append-only event store backing every aggregate in the engine.
//!
//! Streams are keyed by [`AggregateId`] and versioned from 1. Appends carry
//! an expected version per stream, and [`EventStore::append_atomic`] commits
//! several streams in one all-or-nothing write.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, StreamAppend};
