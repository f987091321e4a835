//! Commission request, payment and delivery endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{
    CheckoutError, CommissionPaymentStart, CommissionRequest, GatewayCheckout, PaymentVerification,
};
use domain::{Aggregate, CURRENCY, Commission, CommissionStatus, DeliveryFile};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{EventEnvelopeResponse, json_body, parse_aggregate_id};
use crate::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct DeliveryRequest {
    pub files: Vec<DeliveryFile>,
}

#[derive(Serialize)]
pub struct CommissionResponse {
    pub id: String,
    pub customer_id: String,
    pub vendor_id: String,
    pub service_id: String,
    pub description: String,
    pub budget_paise: i64,
    pub currency: &'static str,
    pub deadline: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub escrow: domain::EscrowState,
    pub files: Vec<DeliveryFile>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: Option<String>,
}

impl From<&Commission> for CommissionResponse {
    fn from(c: &Commission) -> Self {
        let gateway = c.gateway();
        Self {
            id: c.id().map(|id| id.to_string()).unwrap_or_default(),
            customer_id: c.customer_id().map(|u| u.to_string()).unwrap_or_default(),
            vendor_id: c.vendor_id().map(|u| u.to_string()).unwrap_or_default(),
            service_id: c.service_id().map(|s| s.to_string()).unwrap_or_default(),
            description: c.description().to_string(),
            budget_paise: c.budget().paise(),
            currency: CURRENCY,
            deadline: c.deadline().map(|d| d.to_rfc3339()),
            status: c.status().to_string(),
            payment_status: c.payment_status().to_string(),
            payment_method: c.payment_method().map(|m| m.to_string()),
            escrow: c.escrow(),
            files: c.files().to_vec(),
            gateway_order_id: gateway.map(|g| g.gateway_order_id.clone()),
            gateway_payment_id: gateway.map(|g| g.gateway_payment_id.clone()),
            created_at: c.requested_at().map(|t| t.to_rfc3339()),
        }
    }
}

/// How a commission payment proceeds: through the gateway widget, or
/// already settled directly because the gateway is down.
#[derive(Serialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum CommissionPaymentResponse {
    Gateway(GatewayCheckout),
    Direct { commission: CommissionResponse },
}

/// POST /commissions — request a bespoke service.
#[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    payload: Result<Json<CommissionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommissionResponse>), ApiError> {
    let request = json_body(payload)?;
    let commission = state.commissions.request(&requester, request).await?;
    Ok((StatusCode::CREATED, Json(CommissionResponse::from(&commission))))
}

/// GET /commissions/:id
#[tracing::instrument(skip(state, requester))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let commission = state.commissions.get(&requester, commission_id).await?;
    Ok(Json(CommissionResponse::from(&commission)))
}

/// POST /commissions/:id/initiate-payment — customer pays an accepted commission.
#[tracing::instrument(skip(state, requester))]
pub async fn initiate_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Json<CommissionPaymentResponse>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let response = match state
        .checkout
        .initiate_commission_payment(&requester, commission_id)
        .await?
    {
        CommissionPaymentStart::Gateway(params) => CommissionPaymentResponse::Gateway(params),
        CommissionPaymentStart::PaidDirectly(commission) => CommissionPaymentResponse::Direct {
            commission: CommissionResponse::from(&commission),
        },
    };
    Ok(Json(response))
}

/// POST /commissions/:id/verify-payment
#[tracing::instrument(skip(state, requester, payload))]
pub async fn verify_payment<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
    payload: Result<Json<PaymentVerification>, JsonRejection>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let verification = json_body(payload)?;
    let commission = state
        .checkout
        .verify_commission_payment(&requester, commission_id, &verification)
        .await?;
    Ok(Json(CommissionResponse::from(&commission)))
}

/// PUT /commissions/:id/status
#[tracing::instrument(skip(state, requester, payload))]
pub async fn update_status<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let req = json_body(payload)?;
    let to: CommissionStatus = req.status.parse().map_err(CheckoutError::from)?;
    let commission = state
        .commissions
        .update_status(&requester, commission_id, to, req.reason)
        .await?;
    Ok(Json(CommissionResponse::from(&commission)))
}

/// PUT /commissions/:id/delivery — vendor attaches the delivered files.
#[tracing::instrument(skip(state, requester, payload))]
pub async fn attach_delivery<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
    payload: Result<Json<DeliveryRequest>, JsonRejection>,
) -> Result<Json<CommissionResponse>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let req = json_body(payload)?;
    let commission = state
        .commissions
        .attach_delivery(&requester, commission_id, req.files)
        .await?;
    Ok(Json(CommissionResponse::from(&commission)))
}

/// GET /commissions/:id/events
#[tracing::instrument(skip(state, requester))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let commission_id = parse_aggregate_id(&id)?;
    let envelopes = state.commissions.history(&requester, commission_id).await?;
    Ok(Json(
        envelopes
            .into_iter()
            .map(EventEnvelopeResponse::from)
            .collect(),
    ))
}
