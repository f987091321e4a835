//! Payment intents: the server-side record of one gateway checkout attempt.
//!
//! An intent is opened when a gateway order is created and holds the trusted
//! amount and purchase contents. Verification reads everything from here,
//! never from what the client sends back.

mod aggregate;
mod events;

pub use aggregate::{OpenIntent, PaymentIntent};
pub use events::{IntentCapturedData, IntentFailedData, IntentOpenedData, PaymentIntentEvent};

use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::order::{LineItem, ShippingAddress};

const INTENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a8e_4b3d_4e7a_9c5f_0d2b_8a71_e3c4);
const ORDER_NAMESPACE: Uuid = Uuid::from_u128(0x2d94_b7e1_53a6_4c08_8f1e_7a3c_c905_61bd);

/// Stream id of the intent for a gateway order.
pub fn intent_id_for(gateway_order_id: &str) -> AggregateId {
    AggregateId::derived(&INTENT_NAMESPACE, gateway_order_id)
}

/// Stream id of the order a gateway checkout materialises into.
///
/// Derived rather than random so concurrent verifications of one gateway
/// order write to the same order stream.
pub fn order_id_for(gateway_order_id: &str) -> AggregateId {
    AggregateId::derived(&ORDER_NAMESPACE, gateway_order_id)
}

/// What the payment is for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentPurpose {
    /// A cart checkout, priced when the intent was opened.
    Order {
        lines: Vec<LineItem>,
        shipping_address: Option<ShippingAddress>,
    },
    /// The budget of an accepted commission.
    Commission { commission_id: AggregateId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[default]
    Open,
    Captured,
    Failed,
}

#[derive(Debug, Error)]
pub enum PaymentIntentError {
    #[error("Payment intent already opened")]
    AlreadyOpened,

    #[error("Payment intent not found")]
    NotOpened,

    #[error("Payment amount must be greater than 0")]
    InvalidAmount,
}
