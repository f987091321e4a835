//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are immutable facts, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates in an event-sourced system.
///
/// Aggregates are rebuilt by replaying their stream. Command methods inspect
/// the current state and return the events to record; `apply` folds one
/// event into the state.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors its command methods can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None before its first event.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the stream version this state was built from.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate.
    ///
    /// Must be deterministic and infallible: events are facts that have
    /// already been recorded.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
