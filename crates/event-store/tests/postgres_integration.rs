//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventStore, EventStoreError, EventStoreExt,
    PostgresEventStore, StreamAppend, Version,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    version: i64,
    event_type: &str,
) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type(aggregate_type)
        .event_type(event_type)
        .version(Version::new(version))
        .payload_raw(serde_json::json!({"test": true}))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a Docker daemon for testcontainers"]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = create_test_event(aggregate_id, "Product", 1, "ProductListed");
    let version = store
        .append(vec![event], AppendOptions::expect_new())
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "ProductListed");
    assert!(store.aggregate_exists(aggregate_id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a Docker daemon for testcontainers"]
async fn stale_expected_version_conflicts() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            vec![create_test_event(aggregate_id, "Product", 1, "ProductListed")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            vec![create_test_event(aggregate_id, "Product", 1, "ProductListed")],
            AppendOptions::expect_new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
}

#[tokio::test]
#[ignore = "requires a Docker daemon for testcontainers"]
async fn atomic_batch_rolls_back_on_conflict() {
    let store = get_test_store().await;
    let order = AggregateId::new();
    let product = AggregateId::new();

    store
        .append(
            vec![
                create_test_event(product, "Product", 1, "ProductListed"),
                create_test_event(product, "Product", 2, "StockReserved"),
            ],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append_atomic(vec![
            StreamAppend::new(
                vec![create_test_event(order, "Order", 1, "OrderPlaced")],
                AppendOptions::expect_new(),
            ),
            StreamAppend::new(
                vec![create_test_event(product, "Product", 2, "StockReserved")],
                AppendOptions::expect_version(Version::first()),
            ),
        ])
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
    assert!(
        store
            .get_events_for_aggregate(order)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[ignore = "requires a Docker daemon for testcontainers"]
async fn concurrent_new_stream_appends_have_one_winner() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let attempts = (0..8).map(|_| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .append(
                    vec![create_test_event(aggregate_id, "Order", 1, "OrderPlaced")],
                    AppendOptions::expect_new(),
                )
                .await
        })
    });

    let results = futures_util::future::join_all(attempts).await;
    let successes = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(
        store.get_aggregate_version(aggregate_id).await.unwrap(),
        Some(Version::first())
    );
}

#[tokio::test]
#[ignore = "requires a Docker daemon for testcontainers"]
async fn events_by_type_follow_insertion_order() {
    let store = get_test_store().await;
    let a = AggregateId::new();
    let b = AggregateId::new();

    for (id, version) in [(a, 1), (b, 1), (a, 2)] {
        store
            .append(
                vec![create_test_event(id, "Product", version, "StockReserved")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
    }

    let events = store.get_events_by_type("StockReserved").await.unwrap();
    let order: Vec<_> = events.iter().map(|e| (e.aggregate_id, e.version)).collect();
    assert_eq!(
        order,
        vec![
            (a, Version::new(1)),
            (b, Version::new(1)),
            (a, Version::new(2)),
        ]
    );
}
