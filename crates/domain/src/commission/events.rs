//! Commission domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{GatewayReference, Money, PaymentMethod, UserId};

use super::{CommissionStatus, DeliveryFile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CommissionEvent {
    CommissionRequested(CommissionRequestedData),
    CommissionAccepted(CommissionAcceptedData),
    CommissionRejected(CommissionRejectedData),
    CommissionCancelled(CommissionCancelledData),

    /// A gateway order was opened for the budget.
    PaymentInitiated(PaymentInitiatedData),

    /// Budget collected; escrow is now held.
    CommissionPaid(CommissionPaidData),

    WorkStarted(WorkStartedData),

    /// Files handed over. Moves in-progress work to delivered.
    DeliveryAttached(DeliveryAttachedData),

    /// Signed off; escrow released to the vendor.
    CommissionCompleted(CommissionCompletedData),
}

impl DomainEvent for CommissionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CommissionEvent::CommissionRequested(_) => "CommissionRequested",
            CommissionEvent::CommissionAccepted(_) => "CommissionAccepted",
            CommissionEvent::CommissionRejected(_) => "CommissionRejected",
            CommissionEvent::CommissionCancelled(_) => "CommissionCancelled",
            CommissionEvent::PaymentInitiated(_) => "PaymentInitiated",
            CommissionEvent::CommissionPaid(_) => "CommissionPaid",
            CommissionEvent::WorkStarted(_) => "WorkStarted",
            CommissionEvent::DeliveryAttached(_) => "DeliveryAttached",
            CommissionEvent::CommissionCompleted(_) => "CommissionCompleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRequestedData {
    pub commission_id: AggregateId,
    pub customer_id: UserId,
    pub vendor_id: UserId,
    pub service_id: AggregateId,
    pub description: String,
    /// Amount charged; fixed at request time.
    pub budget: Money,
    pub deadline: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionAcceptedData {
    pub accepted_by: UserId,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRejectedData {
    pub rejected_by: UserId,
    pub reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionCancelledData {
    pub from: CommissionStatus,
    pub cancelled_by: UserId,
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiatedData {
    pub gateway_order_id: String,
    pub amount: Money,
    pub initiated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionPaidData {
    pub method: PaymentMethod,
    pub gateway: Option<GatewayReference>,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkStartedData {
    pub started_by: UserId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttachedData {
    pub files: Vec<DeliveryFile>,
    pub delivered_by: UserId,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionCompletedData {
    pub completed_by: UserId,
    /// Escrowed amount released to the vendor.
    pub released: Money,
    pub completed_at: DateTime<Utc>,
}
