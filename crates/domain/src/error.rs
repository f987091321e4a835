//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::catalog::ProductError;
use crate::commission::CommissionError;
use crate::order::OrderError;
use crate::payment_intent::PaymentIntentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Commission(#[from] CommissionError),

    #[error(transparent)]
    PaymentIntent(#[from] PaymentIntentError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true when the failure was a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
