//! Product domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, UserId};

use super::ProductKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    ProductListed(ProductListedData),
    StockRestocked(StockRestockedData),
    PriceChanged(PriceChangedData),
    ProductDeactivated(ProductDeactivatedData),

    /// Stock was taken by a confirmed order.
    StockReserved(StockReservedData),

    /// Stock returned by a cancelled order.
    StockReleased(StockReleasedData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductListed(_) => "ProductListed",
            ProductEvent::StockRestocked(_) => "StockRestocked",
            ProductEvent::PriceChanged(_) => "PriceChanged",
            ProductEvent::ProductDeactivated(_) => "ProductDeactivated",
            ProductEvent::StockReserved(_) => "StockReserved",
            ProductEvent::StockReleased(_) => "StockReleased",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListedData {
    pub product_id: AggregateId,
    pub vendor_id: UserId,
    pub name: String,
    pub kind: ProductKind,
    pub price: Money,
    /// Initial stock; always 0 for digital goods and services.
    pub stock: u32,
    pub asset_url: Option<String>,
    pub listed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRestockedData {
    pub quantity: u32,
    pub restocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangedData {
    pub old_price: Money,
    pub new_price: Money,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDeactivatedData {
    pub deactivated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    pub order_id: AggregateId,
    pub quantity: u32,
    /// Stock left after the reservation.
    pub remaining: u32,
    pub reserved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReleasedData {
    pub order_id: AggregateId,
    pub quantity: u32,
    pub released_at: DateTime<Utc>,
}

impl ProductEvent {
    pub fn stock_reserved(order_id: AggregateId, quantity: u32, remaining: u32) -> Self {
        ProductEvent::StockReserved(StockReservedData {
            order_id,
            quantity,
            remaining,
            reserved_at: Utc::now(),
        })
    }

    pub fn stock_released(order_id: AggregateId, quantity: u32) -> Self {
        ProductEvent::StockReleased(StockReleasedData {
            order_id,
            quantity,
            released_at: Utc::now(),
        })
    }
}
