//! Cart validation and server-side pricing.

use std::collections::BTreeMap;

use common::AggregateId;
use domain::{CommandHandler, LineItem, Money, Product, ShippingAddress};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// One cart entry as submitted by the client.
///
/// Clients may send prices too; they are not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: AggregateId,
    pub quantity: u32,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// A checkout request: what to buy and where to ship it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

/// A cart priced from current catalog records.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<LineItem>,
    /// Kept only when a line is physical.
    pub shipping_address: Option<ShippingAddress>,
    pub total: Money,
}

impl PricedCart {
    pub fn has_physical_items(&self) -> bool {
        self.lines.iter().any(LineItem::is_physical)
    }
}

/// Merges repeated lines for one product, summing their quantities.
/// The first line's options win.
pub fn merge_lines(lines: &[CartLine]) -> Result<Vec<CartLine>> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(|| {
                    CheckoutError::Validation(format!(
                        "quantity for product {} is too large",
                        line.product_id
                    ))
                })?;
            }
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}

/// Validates a cart against the catalog and prices it.
///
/// Every product must exist, be active and purchasable, and physical goods
/// must have enough stock at this moment. Prices come from the catalog.
pub async fn price_cart<S>(products: &CommandHandler<S, Product>, cart: &Cart) -> Result<PricedCart>
where
    S: EventStore,
{
    if cart.lines.is_empty() {
        return Err(CheckoutError::Validation("cart is empty".to_string()));
    }

    let mut lines = Vec::with_capacity(cart.lines.len());
    for entry in merge_lines(&cart.lines)? {
        if entry.quantity == 0 {
            return Err(CheckoutError::Validation(format!(
                "quantity for product {} must be greater than 0",
                entry.product_id
            )));
        }
        let product = products
            .load_existing(entry.product_id)
            .await?
            .ok_or_else(|| {
                CheckoutError::Validation(format!("product {} does not exist", entry.product_id))
            })?;
        product
            .check_purchasable(entry.quantity)
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let (Some(vendor_id), Some(kind)) = (product.vendor_id(), product.kind()) else {
            return Err(CheckoutError::Validation(format!(
                "product {} is not listed",
                entry.product_id
            )));
        };
        lines.push(LineItem {
            product_id: entry.product_id,
            name: product.name().to_string(),
            vendor_id,
            kind,
            quantity: entry.quantity,
            unit_price: product.price(),
            options: entry.options,
            asset_url: product.asset_url().map(str::to_string),
        });
    }

    let has_physical = lines.iter().any(LineItem::is_physical);
    let shipping_address = match &cart.shipping_address {
        Some(address) if has_physical && address.is_complete() => Some(address.clone()),
        _ if has_physical => return Err(CheckoutError::MissingAddress),
        _ => None,
    };

    let total = lines
        .iter()
        .try_fold(Money::zero(), |sum, line| {
            line.subtotal().and_then(|subtotal| sum.checked_add(subtotal))
        })
        .ok_or_else(|| CheckoutError::Validation("order total is too large".to_string()))?;

    Ok(PricedCart {
        lines,
        shipping_address,
        total,
    })
}
