//! Payment gateway adapter.
//!
//! The gateway creates payment orders that the client pays out-of-band. The
//! engine never trusts the client about the outcome: captures come back
//! signed and are checked by [`crate::SignatureVerifier`].

mod http;
mod memory;
mod unconfigured;

pub use http::{HttpGatewayConfig, HttpPaymentGateway};
pub use memory::InMemoryPaymentGateway;
pub use unconfigured::UnconfiguredGateway;

use std::collections::BTreeMap;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A request to open a gateway order.
#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayOrder {
    pub amount: Money,
    pub currency: String,
    /// Our reference for the attempt, echoed back by the gateway.
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// A gateway order the client can pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway is unconfigured, cooling down, or failed on its side.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway refused the request itself.
    #[error("Payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Payment gateway transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// True when checkout should fall back to direct orders.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Http(_))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Whether checkout should go through the gateway right now.
    fn is_available(&self) -> bool;

    /// Public key id handed to clients to open the payment widget.
    fn key_id(&self) -> Option<&str>;

    async fn create_order(&self, request: CreateGatewayOrder)
    -> Result<GatewayOrder, GatewayError>;
}
