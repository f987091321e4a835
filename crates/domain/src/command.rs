//! Command handling infrastructure.

use std::collections::HashMap;
use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, StreamAppend, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Loads and mutates one aggregate type against an event store.
///
/// `execute` covers commands that touch a single stream. Commands spanning
/// several aggregates stage their events in a [`UnitOfWork`] instead.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate from its stream.
    ///
    /// An unknown id yields the default (empty) aggregate.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if its stream is empty.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Loads an aggregate that must already exist.
    pub async fn require(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Executes a single-stream command and persists the resulting events.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let events = command_fn(&aggregate)?;

        let mut uow = UnitOfWork::new();
        uow.stage(aggregate_id, &mut aggregate, events.clone())?;
        uow.commit(&self.store).await?;

        Ok(CommandResult {
            new_version: aggregate.version(),
            aggregate,
            events,
        })
    }
}

/// Events staged against several aggregates, committed in one atomic append.
///
/// Each staged stream expects the version its aggregate was loaded at, so
/// any concurrent writer to any of the streams fails the whole commit.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    streams: Vec<StreamAppend>,
    metadata: HashMap<String, serde_json::Value>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a metadata entry to every event committed by this unit.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Records `events` for `aggregate` and applies them to it in place.
    ///
    /// Empty event lists are ignored. Staging the same aggregate again extends
    /// its stream, still guarded by the version it was first staged at.
    pub fn stage<A>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError>
    where
        A: Aggregate,
    {
        if events.is_empty() {
            return Ok(());
        }

        let expected = aggregate.version();
        let mut version = expected;
        let mut envelopes = Vec::with_capacity(events.len());

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(&event)?;
            for (key, value) in &self.metadata {
                builder = builder.metadata(key.clone(), value.clone());
            }
            envelopes.push(builder.build()?);
            aggregate.apply(event);
        }
        aggregate.set_version(version);

        match self
            .streams
            .iter_mut()
            .find(|stream| stream.aggregate_id() == Some(aggregate_id))
        {
            Some(stream) => stream.events.extend(envelopes),
            None => self.streams.push(StreamAppend::new(
                envelopes,
                AppendOptions::expect_version(expected),
            )),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Number of streams staged so far.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Commits every staged stream atomically. An empty unit is a no-op.
    pub async fn commit<S>(self, store: &S) -> Result<(), DomainError>
    where
        S: EventStore + ?Sized,
    {
        if self.streams.is_empty() {
            return Ok(());
        }
        store.append_atomic(self.streams).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { id: AggregateId },
        Added { amount: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Added { .. } => "TallyAdded",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Tally {
        id: Option<AggregateId>,
        total: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("tally is closed")]
    struct TallyClosed;

    impl From<TallyClosed> for DomainError {
        fn from(e: TallyClosed) -> Self {
            DomainError::Serialization(serde_json::Error::io(std::io::Error::other(
                e.to_string(),
            )))
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = TallyClosed;

        fn aggregate_type() -> &'static str {
            "Tally"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TallyEvent::Opened { id } => self.id = Some(id),
                TallyEvent::Added { amount } => self.total += amount,
            }
        }
    }

    fn open(id: AggregateId) -> impl FnOnce(&Tally) -> Result<Vec<TallyEvent>, TallyClosed> {
        move |_| Ok(vec![TallyEvent::Opened { id }])
    }

    #[tokio::test]
    async fn execute_creates_and_updates() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        let created = handler.execute(id, open(id)).await.unwrap();
        assert_eq!(created.new_version, Version::first());

        let updated = handler
            .execute(id, |_| Ok(vec![TallyEvent::Added { amount: 5 }]))
            .await
            .unwrap();
        assert_eq!(updated.new_version, Version::new(2));
        assert_eq!(updated.aggregate.total, 5);

        let reloaded = handler.load_existing(id).await.unwrap().unwrap();
        assert_eq!(reloaded.total, 5);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn execute_propagates_command_rejection() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let result = handler
            .execute(AggregateId::new(), |_| Err(TallyClosed))
            .await;
        assert!(matches!(result, Err(DomainError::Serialization(_))));
    }

    #[tokio::test]
    async fn require_reports_missing_aggregate() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();
        let result = handler.require(id).await;
        assert!(matches!(
            result,
            Err(DomainError::AggregateNotFound { aggregate_type: "Tally", aggregate_id }) if aggregate_id == id
        ));
    }

    #[tokio::test]
    async fn empty_command_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn unit_of_work_commits_streams_together() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let (a, b) = (AggregateId::new(), AggregateId::new());
        handler.execute(b, open(b)).await.unwrap();

        let mut tally_a = Tally::default();
        let mut tally_b = handler.load(b).await.unwrap();
        let mut uow = UnitOfWork::new().with_metadata("cause", serde_json::json!("test"));
        uow.stage(a, &mut tally_a, vec![TallyEvent::Opened { id: a }])
            .unwrap();
        uow.stage(b, &mut tally_b, vec![TallyEvent::Added { amount: 3 }])
            .unwrap();
        assert_eq!(uow.stream_count(), 2);
        uow.commit(&store).await.unwrap();

        assert_eq!(handler.load(b).await.unwrap().total, 3);
        let events = store.get_events_for_aggregate(a).await.unwrap();
        assert_eq!(events[0].metadata["cause"], serde_json::json!("test"));
    }

    #[tokio::test]
    async fn staging_one_aggregate_twice_extends_its_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        let mut tally = Tally::default();
        let mut uow = UnitOfWork::new();
        uow.stage(id, &mut tally, vec![TallyEvent::Opened { id }])
            .unwrap();
        uow.stage(id, &mut tally, vec![TallyEvent::Added { amount: 2 }])
            .unwrap();
        assert_eq!(uow.stream_count(), 1);
        uow.commit(&store).await.unwrap();

        let reloaded = handler.require(id).await.unwrap();
        assert_eq!(reloaded.total, 2);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn unit_of_work_with_stale_stream_commits_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let (a, b) = (AggregateId::new(), AggregateId::new());
        handler.execute(b, open(b)).await.unwrap();

        let mut stale_b = handler.load(b).await.unwrap();
        handler
            .execute(b, |_| Ok(vec![TallyEvent::Added { amount: 1 }]))
            .await
            .unwrap();

        let mut tally_a = Tally::default();
        let mut uow = UnitOfWork::new();
        uow.stage(a, &mut tally_a, vec![TallyEvent::Opened { id: a }])
            .unwrap();
        uow.stage(b, &mut stale_b, vec![TallyEvent::Added { amount: 10 }])
            .unwrap();
        let result = uow.commit(&store).await;

        assert!(matches!(
            result,
            Err(DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }))
        ));
        assert!(handler.load_existing(a).await.unwrap().is_none());
        assert_eq!(handler.load(b).await.unwrap().total, 1);
    }
}
