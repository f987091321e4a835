//! Gateway webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{Settlement, WebhookOutcome};
use domain::Aggregate;
use event_store::EventStore;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_id: Option<String>,
}

impl From<WebhookOutcome> for WebhookResponse {
    fn from(outcome: WebhookOutcome) -> Self {
        let (status, order_id, commission_id) = match outcome {
            WebhookOutcome::Captured(Settlement::Order(order)) => {
                ("captured", order.id().map(|id| id.to_string()), None)
            }
            WebhookOutcome::Captured(Settlement::Commission(commission)) => {
                ("captured", None, commission.id().map(|id| id.to_string()))
            }
            WebhookOutcome::Failed => ("failed", None, None),
            WebhookOutcome::Ignored => ("ignored", None, None),
        };
        Self {
            status,
            order_id,
            commission_id,
        }
    }
}

/// POST /payments/webhook — gateway-signed payment notifications.
///
/// Authenticated by the body signature alone; there is no caller identity.
#[tracing::instrument(skip_all)]
pub async fn webhook<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let outcome = state.checkout.handle_webhook(&body, signature).await?;
    Ok(Json(WebhookResponse::from(outcome)))
}
