//! Checkout error types.

use domain::{
    AccessDenied, CommissionError, DomainError, OrderError, PaymentIntentError, ProductError,
};
use event_store::EventStoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by checkout, payment and fulfillment operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("A complete shipping address (street, city, phone) is required for physical items")]
    MissingAddress,

    #[error("{0}")]
    OutOfStock(String),

    #[error("{0}")]
    IllegalPaymentState(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("payment verification failed")]
    InvalidSignature,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    /// The gateway cannot take payments; callers fall back to direct checkout.
    #[error("Payment gateway unavailable")]
    GatewayUnavailable,

    /// Direct checkout was attempted while the gateway is up.
    #[error("Payment gateway is available; use initiate-payment")]
    GatewayAvailable,

    /// Optimistic-concurrency retries ran out.
    #[error("The request conflicted with concurrent updates; try again")]
    Conflict,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Domain error: {0}")]
    Domain(DomainError),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;

impl From<AccessDenied> for CheckoutError {
    fn from(e: AccessDenied) -> Self {
        match e {
            AccessDenied::Forbidden => CheckoutError::Forbidden,
            AccessDenied::NotFound => CheckoutError::NotFound("resource".to_string()),
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Order(e) => e.into(),
            DomainError::Product(e) => e.into(),
            DomainError::Commission(e) => e.into(),
            DomainError::PaymentIntent(e) => e.into(),
            DomainError::AggregateNotFound { aggregate_type, .. } => {
                CheckoutError::NotFound(aggregate_type.to_string())
            }
            DomainError::EventStore(e) => CheckoutError::EventStore(e),
            other => CheckoutError::Domain(other),
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::MissingAddress => CheckoutError::MissingAddress,
            OrderError::InvalidTransition { .. } => CheckoutError::InvalidTransition(e.to_string()),
            OrderError::NotPaid => CheckoutError::IllegalPaymentState(e.to_string()),
            OrderError::NotPlaced => CheckoutError::NotFound("Order".to_string()),
            OrderError::NoItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::TotalOverflow
            | OrderError::UnknownStatus { .. } => CheckoutError::Validation(e.to_string()),
            OrderError::AlreadyPlaced => CheckoutError::Domain(e.into()),
        }
    }
}

impl From<PaymentIntentError> for CheckoutError {
    fn from(e: PaymentIntentError) -> Self {
        match e {
            PaymentIntentError::NotOpened => CheckoutError::NotFound("Payment intent".to_string()),
            PaymentIntentError::InvalidAmount => CheckoutError::Validation(e.to_string()),
            PaymentIntentError::AlreadyOpened => CheckoutError::Domain(e.into()),
        }
    }
}

impl From<ProductError> for CheckoutError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::OutOfStock { .. } => CheckoutError::OutOfStock(e.to_string()),
            _ => CheckoutError::Validation(e.to_string()),
        }
    }
}

impl From<CommissionError> for CheckoutError {
    fn from(e: CommissionError) -> Self {
        match e {
            CommissionError::InvalidTransition { .. } => {
                CheckoutError::InvalidTransition(e.to_string())
            }
            CommissionError::IllegalPaymentState(message) => {
                CheckoutError::IllegalPaymentState(message)
            }
            CommissionError::NotPermitted { .. } => CheckoutError::Forbidden,
            CommissionError::NotRequested => CheckoutError::NotFound("Commission".to_string()),
            CommissionError::InvalidRequest(_)
            | CommissionError::InvalidDelivery(_)
            | CommissionError::UnknownStatus { .. } => CheckoutError::Validation(e.to_string()),
            CommissionError::AlreadyRequested => CheckoutError::Domain(e.into()),
        }
    }
}

impl CheckoutError {
    /// True for a lost optimistic-concurrency race that is worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CheckoutError::EventStore(e) if e.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use common::AggregateId;

    use super::*;

    #[test]
    fn stock_shortage_is_out_of_stock() {
        let e: CheckoutError = DomainError::Product(ProductError::OutOfStock {
            name: "Print".to_string(),
            requested: 2,
            available: 1,
        })
        .into();
        assert!(matches!(e, CheckoutError::OutOfStock(ref m) if m.contains("Print")));
    }

    #[test]
    fn missing_aggregate_is_not_found() {
        let e: CheckoutError = DomainError::AggregateNotFound {
            aggregate_type: "Order",
            aggregate_id: AggregateId::new(),
        }
        .into();
        assert!(matches!(e, CheckoutError::NotFound(_)));
    }

    #[test]
    fn store_conflicts_are_retryable() {
        let e: CheckoutError = DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: event_store::Version::initial(),
            actual: event_store::Version::first(),
        })
        .into();
        assert!(e.is_conflict());
    }
}
