//! Payment intent events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, UserId};

use super::IntentPurpose;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentIntentEvent {
    IntentOpened(IntentOpenedData),
    IntentCaptured(IntentCapturedData),
    IntentFailed(IntentFailedData),
}

impl DomainEvent for PaymentIntentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentIntentEvent::IntentOpened(_) => "IntentOpened",
            PaymentIntentEvent::IntentCaptured(_) => "IntentCaptured",
            PaymentIntentEvent::IntentFailed(_) => "IntentFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentOpenedData {
    pub intent_id: AggregateId,
    pub gateway_order_id: String,
    pub payer_id: UserId,
    pub amount: Money,
    pub purpose: IntentPurpose,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCapturedData {
    pub gateway_payment_id: String,
    /// The order or commission the payment settled.
    pub target_id: AggregateId,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}
