//! Payment intent aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, UserId};

use super::events::{IntentCapturedData, IntentFailedData, IntentOpenedData};
use super::{IntentPurpose, IntentStatus, PaymentIntentError, PaymentIntentEvent};

#[derive(Debug, Clone)]
pub struct OpenIntent {
    pub gateway_order_id: String,
    pub payer_id: UserId,
    pub amount: Money,
    pub purpose: IntentPurpose,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentIntent {
    id: Option<AggregateId>,
    version: Version,
    gateway_order_id: String,
    payer_id: Option<UserId>,
    amount: Money,
    purpose: Option<IntentPurpose>,
    status: IntentStatus,
    gateway_payment_id: Option<String>,
    target_id: Option<AggregateId>,
    opened_at: Option<DateTime<Utc>>,
}

impl Aggregate for PaymentIntent {
    type Event = PaymentIntentEvent;
    type Error = PaymentIntentError;

    fn aggregate_type() -> &'static str {
        "PaymentIntent"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PaymentIntentEvent::IntentOpened(data) => {
                self.id = Some(data.intent_id);
                self.gateway_order_id = data.gateway_order_id;
                self.payer_id = Some(data.payer_id);
                self.amount = data.amount;
                self.purpose = Some(data.purpose);
                self.opened_at = Some(data.opened_at);
                self.status = IntentStatus::Open;
            }
            PaymentIntentEvent::IntentCaptured(data) => {
                self.status = IntentStatus::Captured;
                self.gateway_payment_id = Some(data.gateway_payment_id);
                self.target_id = Some(data.target_id);
            }
            PaymentIntentEvent::IntentFailed(_) => self.status = IntentStatus::Failed,
        }
    }
}

// Query methods
impl PaymentIntent {
    pub fn gateway_order_id(&self) -> &str {
        &self.gateway_order_id
    }

    pub fn payer_id(&self) -> Option<UserId> {
        self.payer_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn purpose(&self) -> Option<&IntentPurpose> {
        self.purpose.as_ref()
    }

    pub fn status(&self) -> IntentStatus {
        self.status
    }

    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.gateway_payment_id.as_deref()
    }

    pub fn target_id(&self) -> Option<AggregateId> {
        self.target_id
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn is_captured(&self) -> bool {
        self.status == IntentStatus::Captured
    }
}

// Command methods (return events)
impl PaymentIntent {
    pub fn open(
        &self,
        intent_id: AggregateId,
        command: OpenIntent,
    ) -> Result<Vec<PaymentIntentEvent>, PaymentIntentError> {
        if self.id.is_some() {
            return Err(PaymentIntentError::AlreadyOpened);
        }
        if !command.amount.is_positive() {
            return Err(PaymentIntentError::InvalidAmount);
        }
        Ok(vec![PaymentIntentEvent::IntentOpened(IntentOpenedData {
            intent_id,
            gateway_order_id: command.gateway_order_id,
            payer_id: command.payer_id,
            amount: command.amount,
            purpose: command.purpose,
            opened_at: Utc::now(),
        })])
    }

    /// Records the verified capture. Capturing twice records nothing.
    ///
    /// A failed intent can still be captured: gateways retry, and a verified
    /// capture is the authoritative outcome.
    pub fn capture(
        &self,
        gateway_payment_id: String,
        target_id: AggregateId,
    ) -> Result<Vec<PaymentIntentEvent>, PaymentIntentError> {
        if self.id.is_none() {
            return Err(PaymentIntentError::NotOpened);
        }
        if self.is_captured() {
            return Ok(vec![]);
        }
        Ok(vec![PaymentIntentEvent::IntentCaptured(IntentCapturedData {
            gateway_payment_id,
            target_id,
            captured_at: Utc::now(),
        })])
    }

    /// Marks an open intent failed. Captured and already-failed intents are
    /// left alone.
    pub fn fail(&self, reason: String) -> Result<Vec<PaymentIntentEvent>, PaymentIntentError> {
        if self.id.is_none() {
            return Err(PaymentIntentError::NotOpened);
        }
        if self.status != IntentStatus::Open {
            return Ok(vec![]);
        }
        Ok(vec![PaymentIntentEvent::IntentFailed(IntentFailedData {
            reason,
            failed_at: Utc::now(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment_intent::intent_id_for;

    fn opened() -> PaymentIntent {
        let mut intent = PaymentIntent::default();
        let events = intent
            .open(
                intent_id_for("order_1"),
                OpenIntent {
                    gateway_order_id: "order_1".to_string(),
                    payer_id: UserId::new(),
                    amount: Money::from_rupees(500),
                    purpose: IntentPurpose::Commission {
                        commission_id: AggregateId::new(),
                    },
                },
            )
            .unwrap();
        intent.apply_events(events);
        intent
    }

    #[test]
    fn capture_is_idempotent() {
        let mut intent = opened();
        let target = AggregateId::new();
        let events = intent.capture("pay_1".to_string(), target).unwrap();
        intent.apply_events(events);
        assert!(intent.is_captured());
        assert_eq!(intent.target_id(), Some(target));
        assert!(
            intent
                .capture("pay_1".to_string(), target)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn failure_then_capture() {
        let mut intent = opened();
        let events = intent.fail("card declined".to_string()).unwrap();
        intent.apply_events(events);
        assert_eq!(intent.status(), IntentStatus::Failed);
        assert!(intent.fail("again".to_string()).unwrap().is_empty());

        let events = intent
            .capture("pay_2".to_string(), AggregateId::new())
            .unwrap();
        intent.apply_events(events);
        assert!(intent.is_captured());
    }

    #[test]
    fn zero_amount_rejected() {
        let result = PaymentIntent::default().open(
            AggregateId::new(),
            OpenIntent {
                gateway_order_id: "order_0".to_string(),
                payer_id: UserId::new(),
                amount: Money::zero(),
                purpose: IntentPurpose::Commission {
                    commission_id: AggregateId::new(),
                },
            },
        );
        assert!(matches!(result, Err(PaymentIntentError::InvalidAmount)));
    }
}
