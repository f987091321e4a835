//! Gateway webhook payloads.

use domain::{CURRENCY, Money};
use serde::Deserialize;

use crate::error::{CheckoutError, Result};

/// The subset of a gateway webhook the engine acts on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    /// Captured amount in paise.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// The amount a gateway reports as captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAmount {
    pub amount: Money,
    pub currency: String,
}

impl CapturedAmount {
    /// True when this is exactly `expected` in the settlement currency.
    pub fn matches(&self, expected: Money) -> bool {
        self.amount == expected && self.currency.eq_ignore_ascii_case(CURRENCY)
    }
}

/// What a webhook asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    Captured {
        gateway_order_id: String,
        gateway_payment_id: String,
        /// Absent when the payload omits the amount.
        captured: Option<CapturedAmount>,
    },
    Failed {
        gateway_order_id: String,
        reason: String,
    },
    Ignore {
        event: String,
    },
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| CheckoutError::Validation(format!("malformed webhook body: {e}")))
    }

    fn payment(&self) -> Result<(String, PaymentEntity)> {
        let entity = self
            .payload
            .payment
            .as_ref()
            .map(|wrapper| wrapper.entity.clone())
            .ok_or_else(|| {
                CheckoutError::Validation(format!("{} webhook without a payment", self.event))
            })?;
        let order_id = entity.order_id.clone().ok_or_else(|| {
            CheckoutError::Validation(format!("payment {} has no gateway order", entity.id))
        })?;
        Ok((order_id, entity))
    }

    pub fn action(&self) -> Result<WebhookAction> {
        match self.event.as_str() {
            "payment.captured" => {
                let (gateway_order_id, entity) = self.payment()?;
                let captured = entity.amount.map(|paise| CapturedAmount {
                    amount: Money::from_paise(paise),
                    currency: entity.currency.unwrap_or_else(|| CURRENCY.to_string()),
                });
                Ok(WebhookAction::Captured {
                    gateway_order_id,
                    gateway_payment_id: entity.id,
                    captured,
                })
            }
            "payment.failed" => {
                let (gateway_order_id, entity) = self.payment()?;
                Ok(WebhookAction::Failed {
                    gateway_order_id,
                    reason: entity
                        .error_description
                        .unwrap_or_else(|| "payment failed".to_string()),
                })
            }
            other => Ok(WebhookAction::Ignore {
                event: other.to_string(),
            }),
        }
    }
}
