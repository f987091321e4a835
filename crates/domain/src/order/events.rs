//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{GatewayReference, Money, PaymentMethod, UserId};

use super::{FulfillmentStatus, LineItem, ShippingAddress};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was taken with its priced line items.
    OrderPlaced(OrderPlacedData),

    /// Payment for the order was collected.
    PaymentConfirmed(PaymentConfirmedData),

    /// Digital line items became downloadable.
    DownloadsUnlocked(DownloadsUnlockedData),

    /// Fulfillment moved one step forward.
    FulfillmentAdvanced(FulfillmentAdvancedData),

    /// Order was cancelled (terminal).
    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentConfirmed(_) => "PaymentConfirmed",
            OrderEvent::DownloadsUnlocked(_) => "DownloadsUnlocked",
            OrderEvent::FulfillmentAdvanced(_) => "FulfillmentAdvanced",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub buyer_id: UserId,
    pub lines: Vec<LineItem>,

    /// Present iff at least one line is physical.
    pub shipping_address: Option<ShippingAddress>,

    /// Sum of line subtotals, computed when the order was placed.
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

/// Data for PaymentConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmedData {
    pub method: PaymentMethod,

    /// None for direct checkout.
    pub gateway: Option<GatewayReference>,
    pub confirmed_at: DateTime<Utc>,
}

/// Data for DownloadsUnlocked event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsUnlockedData {
    pub product_ids: Vec<AggregateId>,
    pub unlocked_at: DateTime<Utc>,
}

/// Data for FulfillmentAdvanced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentAdvancedData {
    pub from: FulfillmentStatus,
    pub to: FulfillmentStatus,

    /// None when the system moved the order, e.g. digital auto-completion.
    pub changed_by: Option<UserId>,
    pub changed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    /// Status the order was cancelled from.
    pub from: FulfillmentStatus,
    pub cancelled_by: Option<UserId>,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn payment_confirmed(method: PaymentMethod, gateway: Option<GatewayReference>) -> Self {
        OrderEvent::PaymentConfirmed(PaymentConfirmedData {
            method,
            gateway,
            confirmed_at: Utc::now(),
        })
    }

    pub fn downloads_unlocked(product_ids: Vec<AggregateId>) -> Self {
        OrderEvent::DownloadsUnlocked(DownloadsUnlockedData {
            product_ids,
            unlocked_at: Utc::now(),
        })
    }

    pub fn fulfillment_advanced(
        from: FulfillmentStatus,
        to: FulfillmentStatus,
        changed_by: Option<UserId>,
    ) -> Self {
        OrderEvent::FulfillmentAdvanced(FulfillmentAdvancedData {
            from,
            to,
            changed_by,
            changed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(
        from: FulfillmentStatus,
        cancelled_by: Option<UserId>,
        reason: Option<String>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            from,
            cancelled_by,
            reason,
            cancelled_at: Utc::now(),
        })
    }
}
