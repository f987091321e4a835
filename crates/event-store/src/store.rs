use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to one stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Expected version of the stream for optimistic concurrency control.
    /// If None, the events only have to continue the stream's numbering.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the stream to be at exactly `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Events destined for one stream within an atomic batch.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn new(events: Vec<EventEnvelope>, options: AppendOptions) -> Self {
        Self { events, options }
    }

    /// The stream this append targets. None for an empty append.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }

    /// Version of the stream after this append succeeds.
    pub fn last_version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

/// Storage backend for event streams.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends to several streams in a single all-or-nothing write.
    ///
    /// Every stream's expected version is checked before anything is written;
    /// one conflicting stream rejects the whole batch with
    /// `ConcurrencyConflict`. Returns the new version of each stream, in
    /// batch order.
    async fn append_atomic(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>>;

    /// Retrieves all events for one stream in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves every event of one type in insertion order.
    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Gets the current version of a stream, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let versions = self
            .append_atomic(vec![StreamAppend::new(events, options)])
            .await?;
        versions
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("no version returned".to_string()))
    }
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn append_atomic(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        (**self).append_atomic(batch).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        (**self).get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        (**self).get_events_by_type(event_type).await
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        (**self).get_aggregate_version(aggregate_id).await
    }
}

/// Convenience methods available on every event store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks if a stream has any events.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks the shape of a batch before any backend touches storage.
///
/// Each stream must be non-empty, belong to one aggregate and type, number
/// its events consecutively, and start right after its expected version.
/// No aggregate may appear in two streams of the same batch.
pub fn validate_batch(batch: &[StreamAppend]) -> Result<()> {
    if batch.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append an empty batch".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(batch.len());
    for stream in batch {
        let Some(first) = stream.events.first() else {
            return Err(EventStoreError::InvalidAppend(
                "Cannot append empty event list".to_string(),
            ));
        };

        if !seen.insert(first.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "Aggregate {} appears twice in one batch",
                first.aggregate_id
            )));
        }

        if let Some(expected) = stream.options.expected_version
            && first.version != expected.next()
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "First event version {} does not follow expected version {}",
                first.version, expected
            )));
        }

        let mut version = first.version;
        for event in stream.events.iter().skip(1) {
            if event.aggregate_id != first.aggregate_id
                || event.aggregate_type != first.aggregate_type
            {
                return Err(EventStoreError::InvalidAppend(
                    "All events in a stream must belong to the same aggregate".to_string(),
                ));
            }
            version = version.next();
            if event.version != version {
                return Err(EventStoreError::InvalidAppend(format!(
                    "Event versions must be sequential. Expected {}, got {}",
                    version, event.version
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Product")
            .event_type("StockReserved")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn accepts_disjoint_streams() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let batch = vec![
            StreamAppend::new(vec![event(a, 1), event(a, 2)], AppendOptions::expect_new()),
            StreamAppend::new(
                vec![event(b, 4)],
                AppendOptions::expect_version(Version::new(3)),
            ),
        ];
        assert!(validate_batch(&batch).is_ok());
    }

    #[test]
    fn rejects_same_aggregate_twice() {
        let a = AggregateId::new();
        let batch = vec![
            StreamAppend::new(vec![event(a, 1)], AppendOptions::new()),
            StreamAppend::new(vec![event(a, 2)], AppendOptions::new()),
        ];
        assert!(matches!(
            validate_batch(&batch),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn rejects_gaps_and_misaligned_expectations() {
        let a = AggregateId::new();
        let gap = vec![StreamAppend::new(
            vec![event(a, 1), event(a, 3)],
            AppendOptions::new(),
        )];
        assert!(validate_batch(&gap).is_err());

        let misaligned = vec![StreamAppend::new(
            vec![event(a, 5)],
            AppendOptions::expect_version(Version::new(2)),
        )];
        assert!(validate_batch(&misaligned).is_err());
    }

    #[test]
    fn rejects_empty_batches_and_streams() {
        assert!(validate_batch(&[]).is_err());
        assert!(validate_batch(&[StreamAppend::new(vec![], AppendOptions::new())]).is_err());
    }
}
