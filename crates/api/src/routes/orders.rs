//! Checkout, payment verification and fulfillment endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{Cart, CheckoutError, PaymentInitiation, PaymentVerification};
use domain::{Aggregate, CURRENCY, FulfillmentStatus, LineItem, Order, ShippingAddress};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{EventEnvelopeResponse, json_body, parse_aggregate_id};
use crate::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub items: Vec<LineItemResponse>,
    pub shipping_address: Option<ShippingAddress>,
    pub total_paise: i64,
    pub currency: &'static str,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub fulfillment_status: String,
    pub unlocked_downloads: Vec<String>,
    pub created_at: Option<String>,
}

/// A line as shown to clients; the asset url is only served via download.
#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: String,
    pub name: String,
    pub vendor_id: String,
    pub kind: String,
    pub quantity: u32,
    pub unit_price_paise: i64,
    pub options: BTreeMap<String, String>,
}

impl From<&LineItem> for LineItemResponse {
    fn from(line: &LineItem) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            name: line.name.clone(),
            vendor_id: line.vendor_id.to_string(),
            kind: line.kind.to_string(),
            quantity: line.quantity,
            unit_price_paise: line.unit_price.paise(),
            options: line.options.clone(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let gateway = order.gateway();
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            buyer_id: order.buyer_id().map(|b| b.to_string()).unwrap_or_default(),
            items: order.lines().iter().map(LineItemResponse::from).collect(),
            shipping_address: order.shipping_address().cloned(),
            total_paise: order.total().paise(),
            currency: CURRENCY,
            payment_status: order.payment_status().to_string(),
            payment_method: order.payment_method().map(|m| m.to_string()),
            gateway_order_id: gateway.map(|g| g.gateway_order_id.clone()),
            gateway_payment_id: gateway.map(|g| g.gateway_payment_id.clone()),
            fulfillment_status: order.fulfillment_status().to_string(),
            unlocked_downloads: order.unlocked_downloads().map(|p| p.to_string()).collect(),
            created_at: order.placed_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
}

// -- Handlers --

/// POST /orders/initiate-payment — price a cart and open a gateway order.
///
/// Answers 503 with `{"fallback": "direct_checkout"}` while the gateway is
/// down; the client then places the order through `POST /orders`.
#[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
pub async fn initiate_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    payload: Result<Json<Cart>, JsonRejection>,
) -> Result<Response, ApiError> {
    let cart = json_body(payload)?;
    match state.checkout.initiate_payment(&requester, &cart).await? {
        PaymentInitiation::Gateway(params) => Ok((StatusCode::OK, Json(params)).into_response()),
        PaymentInitiation::DirectCheckout => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "fallback": "direct_checkout" })),
        )
            .into_response()),
    }
}

/// POST /orders — direct checkout while the gateway is unavailable.
#[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    payload: Result<Json<Cart>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cart = json_body(payload)?;
    let order = state.checkout.create_order(&requester, &cart).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// POST /orders/verify-payment — settle a signed gateway capture.
#[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
pub async fn verify_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    payload: Result<Json<PaymentVerification>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let verification = json_body(payload)?;
    let order = state
        .checkout
        .verify_payment(&requester, &verification)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/:id
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state.fulfillment.get_order(&requester, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/:id — move the fulfillment status.
#[tracing::instrument(skip(state, requester, payload))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let req = json_body(payload)?;
    let to: FulfillmentStatus = req.status.parse().map_err(CheckoutError::from)?;
    let order = state
        .fulfillment
        .update_status(&requester, order_id, to, req.reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/:id/download/:product_id
#[tracing::instrument(skip(state, requester))]
pub async fn download<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let product_id = parse_aggregate_id(&product_id)?;
    let download_url = state
        .fulfillment
        .download_url(&requester, order_id, product_id)
        .await?;
    Ok(Json(DownloadResponse { download_url }))
}

/// GET /orders/:id/events — the order's audit trail.
#[tracing::instrument(skip(state, requester))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let envelopes = state
        .fulfillment
        .order_history(&requester, order_id)
        .await?;
    Ok(Json(
        envelopes
            .into_iter()
            .map(EventEnvelopeResponse::from)
            .collect(),
    ))
}
