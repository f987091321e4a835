//! Checkout, payment and fulfillment services for the marketplace.
//!
//! This crate provides:
//! - Cart pricing from catalog records
//! - Stock reservation staged into the order commit
//! - The payment gateway adapter and signature verification
//! - Services for checkout, fulfillment, commissions and catalog upkeep

pub mod cart;
pub mod catalog;
pub mod commissions;
pub mod error;
pub mod fulfillment;
pub mod gateway;
pub mod inventory;
pub mod orchestrator;
mod retry;
pub mod secret;
pub mod signature;
pub mod webhook;

pub use cart::{Cart, CartLine, PricedCart, price_cart};
pub use catalog::{CatalogService, ListProduct};
pub use commissions::{CommissionRequest, CommissionService};
pub use error::{CheckoutError, Result};
pub use fulfillment::FulfillmentService;
pub use gateway::{
    CreateGatewayOrder, GatewayError, GatewayOrder, HttpGatewayConfig, HttpPaymentGateway,
    InMemoryPaymentGateway, PaymentGateway, UnconfiguredGateway,
};
pub use inventory::InventoryReservation;
pub use orchestrator::{
    CheckoutService, CommissionPaymentStart, GatewayCheckout, PaymentInitiation,
    PaymentVerification, Settlement, WebhookOutcome,
};
pub use retry::MAX_COMMIT_ATTEMPTS;
pub use secret::Secret;
pub use signature::SignatureVerifier;
