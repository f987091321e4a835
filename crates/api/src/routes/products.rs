//! Catalog reads plus the listing and restock calls checkout relies on.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::ListProduct;
use domain::{Aggregate, CURRENCY, Product};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{json_body, parse_aggregate_id};
use crate::AppState;
use crate::auth::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// Public product view. The digital asset url is never exposed here.
#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub vendor_id: String,
    pub name: String,
    pub kind: Option<String>,
    pub price_paise: i64,
    pub currency: &'static str,
    pub stock: u32,
    pub active: bool,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id().map(|id| id.to_string()).unwrap_or_default(),
            vendor_id: p.vendor_id().map(|v| v.to_string()).unwrap_or_default(),
            name: p.name().to_string(),
            kind: p.kind().map(|k| k.to_string()),
            price_paise: p.price().paise(),
            currency: CURRENCY,
            stock: p.stock(),
            active: p.is_active(),
        }
    }
}

/// GET /products/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_aggregate_id(&id)?;
    let product = state.catalog.get(product_id).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products — a vendor lists a product.
#[tracing::instrument(skip_all, fields(user_id = %requester.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    payload: Result<Json<ListProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let listing = json_body(payload)?;
    let product = state.catalog.list_product(&requester, listing).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

/// POST /products/:id/restock
#[tracing::instrument(skip(state, requester, payload))]
pub async fn restock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = parse_aggregate_id(&id)?;
    let req = json_body(payload)?;
    let product = state
        .catalog
        .restock(&requester, product_id, req.quantity)
        .await?;
    Ok(Json(ProductResponse::from(&product)))
}
