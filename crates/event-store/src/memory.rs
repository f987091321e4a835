use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, StreamAppend, validate_batch},
};

#[derive(Default)]
struct Streams {
    by_aggregate: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// Global insertion order as (stream, index within stream).
    sequence: Vec<(AggregateId, usize)>,
}

impl Streams {
    fn head(&self, aggregate_id: &AggregateId) -> Version {
        self.by_aggregate
            .get(aggregate_id)
            .and_then(|events| events.last())
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store for tests and single-process deployments.
///
/// A batch is checked and applied under one write lock, which gives the same
/// all-or-nothing behaviour as the PostgreSQL transaction.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<Streams>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.sequence.len()
    }

    /// Makes every subsequent write fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_atomic(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EventStoreError::Database(sqlx::Error::PoolClosed));
        }

        let mut streams = self.streams.write().await;

        // Check every stream before touching any of them.
        for append in &batch {
            let Some(aggregate_id) = append.aggregate_id() else {
                continue;
            };
            let current = streams.head(&aggregate_id);

            if let Some(expected) = append.options.expected_version
                && current != expected
            {
                tracing::debug!(%aggregate_id, %expected, actual = %current, "stream version conflict");
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual: current,
                });
            }

            // Unique (aggregate_id, version) simulation for unchecked appends.
            if let Some(first) = append.events.first()
                && first.version != current.next()
            {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: append.options.expected_version.unwrap_or(current),
                    actual: current,
                });
            }
        }

        let mut versions = Vec::with_capacity(batch.len());
        for append in batch {
            versions.push(append.last_version());
            for event in append.events {
                let aggregate_id = event.aggregate_id;
                let stream = streams.by_aggregate.entry(aggregate_id).or_default();
                stream.push(event);
                let index = stream.len() - 1;
                streams.sequence.push((aggregate_id, index));
            }
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        Ok(streams
            .by_aggregate
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        let events = streams
            .sequence
            .iter()
            .filter_map(|(id, index)| streams.by_aggregate.get(id)?.get(*index))
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let streams = self.streams.read().await;
        Ok(streams
            .by_aggregate
            .get(&aggregate_id)
            .and_then(|events| events.last())
            .map(|e| e.version))
    }
}
