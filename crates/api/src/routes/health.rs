//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// `unavailable` means checkout is running in direct-order mode.
    pub gateway: &'static str,
}

/// GET /health — returns system health and payment gateway availability.
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let gateway = if state.checkout.gateway_available() {
        "available"
    } else {
        "unavailable"
    };
    Json(HealthResponse {
        status: "ok",
        gateway,
    })
}
