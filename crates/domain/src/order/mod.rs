//! Order aggregate and related types.

mod aggregate;
mod events;
mod line_item;
mod state;

pub use aggregate::{Order, PlaceOrder};
pub use events::{
    DownloadsUnlockedData, FulfillmentAdvancedData, OrderCancelledData, OrderEvent,
    OrderPlacedData, PaymentConfirmedData,
};
pub use line_item::{LineItem, ShippingAddress};
pub use state::FulfillmentStatus;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has not been placed")]
    NotPlaced,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity {
        product_id: AggregateId,
        quantity: u32,
    },

    #[error("A complete shipping address (street, city, phone) is required for physical items")]
    MissingAddress,

    #[error("Order total is too large")]
    TotalOverflow,

    #[error("Order has not been paid")]
    NotPaid,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    },

    #[error("Unknown fulfillment status: {status}")]
    UnknownStatus { status: String },
}
