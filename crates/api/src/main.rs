//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use checkout::{HttpPaymentGateway, PaymentGateway, SignatureVerifier, UnconfiguredGateway};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match config.gateway() {
        Some(gateway_config) => {
            tracing::info!(base_url = %gateway_config.base_url, "payment gateway configured");
            Arc::new(
                HttpPaymentGateway::new(gateway_config).expect("failed to build gateway client"),
            )
        }
        None => {
            tracing::warn!("payment gateway not configured, checkout will use direct orders");
            Arc::new(UnconfiguredGateway)
        }
    }
}

async fn serve<S: EventStore + Clone + 'static>(
    config: &Config,
    event_store: S,
    metrics_handle: PrometheusHandle,
) {
    let verifier = SignatureVerifier::new(
        config.gateway_key_secret.clone(),
        config.gateway_webhook_secret.clone(),
    );
    let state = api::create_state(event_store, build_gateway(config), verifier);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the event store and run the server
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url.reveal())
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL event store");
            serve(&config, store, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            serve(&config, InMemoryEventStore::new(), metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
