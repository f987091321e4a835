use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{EventStore, StreamAppend, validate_batch},
};

const UNIQUE_VERSION_CONSTRAINT: &str = "unique_aggregate_version";

/// PostgreSQL-backed event store.
///
/// A batch runs in one transaction. The `(aggregate_id, version)` unique
/// constraint turns a lost race into `ConcurrencyConflict` and rolls the
/// whole batch back.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: AggregateId,
    ) -> Result<Version> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        Ok(Version::new(current.unwrap_or(0)))
    }

    async fn insert_stream(
        tx: &mut Transaction<'_, Postgres>,
        append: &StreamAppend,
    ) -> Result<()> {
        for event in &append.events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some(UNIQUE_VERSION_CONSTRAINT)
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id: event.aggregate_id,
                        expected: append
                            .options
                            .expected_version
                            .unwrap_or(Version::new(event.version.as_i64() - 1)),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append_atomic(&self, batch: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_batch(&batch)?;

        let mut tx = self.pool.begin().await?;

        for append in &batch {
            let Some(aggregate_id) = append.aggregate_id() else {
                continue;
            };
            if let Some(expected) = append.options.expected_version {
                let actual = Self::current_version(&mut tx, aggregate_id).await?;
                if actual != expected {
                    tracing::debug!(%aggregate_id, %expected, %actual, "stream version conflict");
                    // Dropping the transaction rolls it back.
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected,
                        actual,
                    });
                }
            }
        }

        let mut versions = Vec::with_capacity(batch.len());
        for append in &batch {
            Self::insert_stream(&mut tx, append).await?;
            versions.push(append.last_version());
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE event_type = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
