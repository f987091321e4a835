//! Order line items and shipping details.

use std::collections::BTreeMap;

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::catalog::ProductKind;
use crate::value_objects::{Money, UserId};

/// One product entry of an order, priced when the order was taken.
///
/// Everything here is copied from the catalog at checkout; later catalog
/// edits never reach an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: AggregateId,
    pub name: String,
    pub vendor_id: UserId,
    pub kind: ProductKind,
    pub quantity: u32,
    pub unit_price: Money,

    /// Buyer-selected variants such as size or colour.
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Download location, digital goods only. Never shown on order views.
    #[serde(default)]
    pub asset_url: Option<String>,
}

impl LineItem {
    /// Unit price times quantity, or None on overflow.
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }

    pub fn is_physical(&self) -> bool {
        self.kind == ProductKind::Physical
    }

    pub fn is_digital(&self) -> bool {
        self.kind == ProductKind::Digital
    }
}

/// Where physical goods are shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub phone: String,
}

impl ShippingAddress {
    /// True when no field is blank.
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.city, &self.phone]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_multiplies_captured_price() {
        let line = LineItem {
            product_id: AggregateId::new(),
            name: "Poster".to_string(),
            vendor_id: UserId::new(),
            kind: ProductKind::Physical,
            quantity: 3,
            unit_price: Money::from_rupees(250),
            options: BTreeMap::new(),
            asset_url: None,
        };
        assert_eq!(line.subtotal(), Some(Money::from_rupees(750)));
    }

    #[test]
    fn blank_address_fields_are_incomplete() {
        let address = ShippingAddress {
            street: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            phone: "   ".to_string(),
        };
        assert!(!address.is_complete());
    }
}
