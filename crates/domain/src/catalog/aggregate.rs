//! Product aggregate.

use chrono::Utc;
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, UserId};

use super::events::{
    PriceChangedData, ProductDeactivatedData, ProductListedData, StockRestockedData,
};
use super::{ProductError, ProductEvent, ProductKind};

/// Input for listing a new product.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub vendor_id: UserId,
    pub name: String,
    pub kind: ProductKind,
    pub price: Money,
    pub stock: u32,
    pub asset_url: Option<String>,
}

/// A catalog product as the engine sees it.
///
/// The stock counter is the one hot shared resource of checkout: every
/// reservation is an event on this stream, so concurrent reservations
/// serialize on the stream version.
#[derive(Debug, Clone, Default)]
pub struct Product {
    id: Option<AggregateId>,
    version: Version,
    vendor_id: Option<UserId>,
    name: String,
    kind: Option<ProductKind>,
    price: Money,
    active: bool,
    stock: u32,
    asset_url: Option<String>,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
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
            ProductEvent::ProductListed(data) => self.apply_listed(data),
            ProductEvent::StockRestocked(data) => {
                self.stock = self.stock.saturating_add(data.quantity)
            }
            ProductEvent::PriceChanged(data) => self.price = data.new_price,
            ProductEvent::ProductDeactivated(_) => self.active = false,
            ProductEvent::StockReserved(data) => self.stock = data.remaining,
            ProductEvent::StockReleased(data) => {
                self.stock = self.stock.saturating_add(data.quantity)
            }
        }
    }
}

// Query methods
impl Product {
    pub fn vendor_id(&self) -> Option<UserId> {
        self.vendor_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<ProductKind> {
        self.kind
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn asset_url(&self) -> Option<&str> {
        self.asset_url.as_deref()
    }

    pub fn is_physical(&self) -> bool {
        self.kind == Some(ProductKind::Physical)
    }

    /// Checks that `quantity` of this product can go into a cart.
    ///
    /// Services are commissioned, inactive products are gone, and physical
    /// goods need enough stock. This read is advisory; the authoritative
    /// check is [`Product::reserve`] at confirmation time.
    pub fn check_purchasable(&self, quantity: u32) -> Result<(), ProductError> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        if !self.active {
            return Err(ProductError::Inactive {
                name: self.name.clone(),
            });
        }
        match self.kind {
            Some(ProductKind::Service) | None => Err(ProductError::NotPurchasable {
                name: self.name.clone(),
            }),
            Some(ProductKind::Physical) if self.stock < quantity => Err(ProductError::OutOfStock {
                name: self.name.clone(),
                requested: quantity,
                available: self.stock,
            }),
            _ => Ok(()),
        }
    }
}

// Command methods (return events)
impl Product {
    pub fn list(
        &self,
        product_id: AggregateId,
        listing: NewListing,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        if self.id.is_some() {
            return Err(ProductError::AlreadyListed);
        }
        if listing.name.trim().is_empty() {
            return Err(ProductError::InvalidListing("name is required".to_string()));
        }
        if !listing.price.is_positive() {
            return Err(ProductError::InvalidListing(
                "price must be greater than 0".to_string(),
            ));
        }
        let asset_url = listing.asset_url.filter(|url| !url.trim().is_empty());
        if listing.kind == ProductKind::Digital && asset_url.is_none() {
            return Err(ProductError::InvalidListing(
                "digital products need an asset url".to_string(),
            ));
        }
        let stock = match listing.kind {
            ProductKind::Physical => listing.stock,
            ProductKind::Digital | ProductKind::Service => 0,
        };

        Ok(vec![ProductEvent::ProductListed(ProductListedData {
            product_id,
            vendor_id: listing.vendor_id,
            name: listing.name.trim().to_string(),
            kind: listing.kind,
            price: listing.price,
            stock,
            asset_url,
            listed_at: Utc::now(),
        })])
    }

    pub fn restock(&self, quantity: u32) -> Result<Vec<ProductEvent>, ProductError> {
        self.require_physical()?;
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        self.stock_after_adding(quantity)?;
        Ok(vec![ProductEvent::StockRestocked(StockRestockedData {
            quantity,
            restocked_at: Utc::now(),
        })])
    }

    pub fn change_price(&self, new_price: Money) -> Result<Vec<ProductEvent>, ProductError> {
        if !new_price.is_positive() {
            return Err(ProductError::InvalidListing(
                "price must be greater than 0".to_string(),
            ));
        }
        if new_price == self.price {
            return Ok(vec![]);
        }
        Ok(vec![ProductEvent::PriceChanged(PriceChangedData {
            old_price: self.price,
            new_price,
            changed_at: Utc::now(),
        })])
    }

    pub fn deactivate(&self) -> Result<Vec<ProductEvent>, ProductError> {
        if !self.active {
            return Ok(vec![]);
        }
        Ok(vec![ProductEvent::ProductDeactivated(
            ProductDeactivatedData {
                deactivated_at: Utc::now(),
            },
        )])
    }

    /// Takes `quantity` units for `order_id`, never letting stock go negative.
    ///
    /// Digital goods have unlimited supply and record nothing.
    pub fn reserve(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.check_purchasable(quantity)?;
        if !self.is_physical() {
            return Ok(vec![]);
        }
        let remaining = self
            .stock
            .checked_sub(quantity)
            .ok_or_else(|| ProductError::OutOfStock {
                name: self.name.clone(),
                requested: quantity,
                available: self.stock,
            })?;
        Ok(vec![ProductEvent::stock_reserved(
            order_id, quantity, remaining,
        )])
    }

    /// Returns stock taken by a cancelled order. Inactive products still
    /// take their stock back.
    pub fn release(
        &self,
        order_id: AggregateId,
        quantity: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.require_physical()?;
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        self.stock_after_adding(quantity)?;
        Ok(vec![ProductEvent::stock_released(order_id, quantity)])
    }

    fn stock_after_adding(&self, quantity: u32) -> Result<u32, ProductError> {
        self.stock
            .checked_add(quantity)
            .ok_or_else(|| ProductError::StockOverflow {
                name: self.name.clone(),
                stock: self.stock,
                added: quantity,
            })
    }

    fn require_physical(&self) -> Result<(), ProductError> {
        match self.kind {
            Some(ProductKind::Physical) => Ok(()),
            Some(kind) => Err(ProductError::NotStocked {
                name: self.name.clone(),
                kind,
            }),
            None => Err(ProductError::InvalidListing(
                "product is not listed".to_string(),
            )),
        }
    }
}

// Apply event helpers
impl Product {
    fn apply_listed(&mut self, data: ProductListedData) {
        self.id = Some(data.product_id);
        self.vendor_id = Some(data.vendor_id);
        self.name = data.name;
        self.kind = Some(data.kind);
        self.price = data.price;
        self.stock = data.stock;
        self.asset_url = data.asset_url;
        self.active = true;
    }
}
