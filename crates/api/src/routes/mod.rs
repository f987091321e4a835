//! Route handlers, grouped by resource.

pub mod commissions;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use common::AggregateId;
use event_store::EventEnvelope;
use serde::Serialize;

use crate::error::ApiError;

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

impl From<EventEnvelope> for EventEnvelopeResponse {
    fn from(mut e: EventEnvelope) -> Self {
        redact_asset_urls(&mut e.payload);
        Self {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        }
    }
}

/// Strips `lines[].asset_url` from an event payload; assets are only
/// handed out by the download endpoint.
fn redact_asset_urls(payload: &mut serde_json::Value) {
    let Some(lines) = payload
        .pointer_mut("/data/lines")
        .and_then(|l| l.as_array_mut())
    else {
        return;
    };
    for line in lines.iter_mut().filter_map(|l| l.as_object_mut()) {
        line.remove("asset_url");
    }
}

/// Malformed ids cannot name anything, so they answer like a missing resource.
pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse().map_err(|_| ApiError::NotFound)
}

/// Unwraps a JSON body, reporting rejections in the API's error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn line_asset_urls_are_redacted() {
        let mut payload = json!({
            "type": "OrderPlaced",
            "data": {
                "order_id": "o-1",
                "lines": [
                    {"name": "Brushes", "asset_url": "https://cdn.example/brushes.zip"},
                    {"name": "Print"}
                ]
            }
        });
        redact_asset_urls(&mut payload);
        assert_eq!(payload["data"]["lines"][0], json!({"name": "Brushes"}));
        assert_eq!(payload["data"]["lines"][1], json!({"name": "Print"}));
        assert_eq!(payload["data"]["order_id"], "o-1");

        let mut other = json!({
            "type": "DeliveryAttached",
            "data": {"delivery_url": "https://cdn.example/piece.png"}
        });
        redact_asset_urls(&mut other);
        assert_eq!(other["data"]["delivery_url"], "https://cdn.example/piece.png");
    }
}
