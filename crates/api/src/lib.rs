//! HTTP API for the marketplace order and commission engine.
//!
//! Provides REST endpoints for checkout, payment verification, fulfillment
//! and commissions, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CatalogService, CheckoutService, CommissionService, FulfillmentService, PaymentGateway,
    SignatureVerifier,
};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub checkout: CheckoutService<S>,
    pub fulfillment: FulfillmentService<S>,
    pub commissions: CommissionService<S>,
    pub catalog: CatalogService<S>,
}

/// Wires every service onto one event store and payment gateway.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        checkout: CheckoutService::new(event_store.clone(), gateway, verifier),
        fulfillment: FulfillmentService::new(event_store.clone()),
        commissions: CommissionService::new(event_store.clone()),
        catalog: CatalogService::new(event_store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route(
            "/orders/initiate-payment",
            post(routes::orders::initiate_payment::<S>),
        )
        .route(
            "/orders/verify-payment",
            post(routes::orders::verify_payment::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).patch(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/{id}/download/{product_id}",
            get(routes::orders::download::<S>),
        )
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .route("/commissions", post(routes::commissions::create::<S>))
        .route("/commissions/{id}", get(routes::commissions::get::<S>))
        .route(
            "/commissions/{id}/initiate-payment",
            post(routes::commissions::initiate_payment::<S>),
        )
        .route(
            "/commissions/{id}/verify-payment",
            post(routes::commissions::verify_payment::<S>),
        )
        .route(
            "/commissions/{id}/status",
            put(routes::commissions::update_status::<S>),
        )
        .route(
            "/commissions/{id}/delivery",
            put(routes::commissions::attach_delivery::<S>),
        )
        .route(
            "/commissions/{id}/events",
            get(routes::commissions::events::<S>),
        )
        .route("/payments/webhook", post(routes::payments::webhook::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/products/{id}/restock",
            post(routes::products::restock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
