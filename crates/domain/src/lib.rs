//! Domain layer for the marketplace transaction engine.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler and UnitOfWork for single- and multi-stream commands
//! - Product, Order, Commission and PaymentIntent aggregates
//! - Access rules for orders, downloads and commissions

pub mod access;
pub mod aggregate;
pub mod catalog;
pub mod command;
pub mod commission;
pub mod error;
pub mod order;
pub mod payment_intent;
pub mod value_objects;

pub use access::{
    AccessDenied, Requester, Role, UnknownRole, authorize_commission_access, authorize_download,
    authorize_fulfillment_update, authorize_order_access,
};
pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{NewListing, Product, ProductError, ProductEvent, ProductKind};
pub use command::{CommandHandler, CommandResult, UnitOfWork};
pub use commission::{
    Commission, CommissionError, CommissionEvent, CommissionParty, CommissionStatus, DeliveryFile,
    EscrowState, RequestCommission,
};
pub use error::DomainError;
pub use order::{
    FulfillmentStatus, LineItem, Order, OrderError, OrderEvent, PlaceOrder, ShippingAddress,
};
pub use payment_intent::{
    IntentPurpose, IntentStatus, OpenIntent, PaymentIntent, PaymentIntentError,
    PaymentIntentEvent, intent_id_for, order_id_for,
};
pub use value_objects::{CURRENCY, GatewayReference, Money, PaymentMethod, PaymentStatus, UserId};
