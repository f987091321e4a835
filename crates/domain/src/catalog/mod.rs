//! Catalog products: the fields checkout reads, plus the stock counter.

mod aggregate;
mod events;

pub use aggregate::{NewListing, Product};
pub use events::{
    PriceChangedData, ProductDeactivatedData, ProductEvent, ProductListedData, StockReleasedData,
    StockReservedData, StockRestockedData,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What kind of good a product is, which decides how it is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Shipped goods with a finite stock count.
    Physical,
    /// Downloadable asset, unlimited supply.
    Digital,
    /// Bespoke work; bought through a commission, never carted.
    Service,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Physical => "physical",
            ProductKind::Digital => "digital",
            ProductKind::Service => "service",
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by product commands.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product already listed")]
    AlreadyListed,

    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("{name} is a {kind} product and has no stock")]
    NotStocked { name: String, kind: ProductKind },

    #[error("{name} is no longer available")]
    Inactive { name: String },

    #[error("{name} is a service and must be commissioned")]
    NotPurchasable { name: String },

    #[error("{name} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("{name} cannot hold {added} more units on top of {stock}")]
    StockOverflow { name: String, stock: u32, added: u32 },
}
