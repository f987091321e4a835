//! Commission aggregate: bespoke work paid up front and held until delivery.

mod aggregate;
mod events;
mod state;

pub use aggregate::{Commission, RequestCommission};
pub use events::{
    CommissionAcceptedData, CommissionCancelledData, CommissionCompletedData, CommissionEvent,
    CommissionPaidData, CommissionRejectedData, CommissionRequestedData, DeliveryAttachedData,
    PaymentInitiatedData, WorkStartedData,
};
pub use state::{CommissionStatus, EscrowState};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One delivered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFile {
    pub url: String,
    pub name: String,
}

/// The capacity in which a user acts on a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommissionParty {
    Customer,
    Vendor,
    Admin,
}

impl CommissionParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionParty::Customer => "customer",
            CommissionParty::Vendor => "vendor",
            CommissionParty::Admin => "admin",
        }
    }
}

impl std::fmt::Display for CommissionParty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during commission operations.
#[derive(Debug, Error)]
pub enum CommissionError {
    #[error("Commission already requested")]
    AlreadyRequested,

    #[error("Commission has not been requested")]
    NotRequested,

    #[error("Invalid commission request: {0}")]
    InvalidRequest(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: CommissionStatus,
        to: CommissionStatus,
    },

    #[error("{0}")]
    IllegalPaymentState(String),

    #[error("A {party} may not {action} this commission")]
    NotPermitted {
        party: CommissionParty,
        action: &'static str,
    },

    #[error("Invalid delivery: {0}")]
    InvalidDelivery(String),

    #[error("Unknown commission status: {status}")]
    UnknownStatus { status: String },
}
