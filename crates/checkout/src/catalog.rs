//! The slice of catalog management checkout depends on: listing products
//! and restocking physical goods.

use common::AggregateId;
use domain::{CommandHandler, Money, NewListing, Product, ProductKind, Requester, Role};
use event_store::EventStore;
use serde::Deserialize;

use crate::error::{CheckoutError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ListProduct {
    pub name: String,
    pub kind: ProductKind,
    #[serde(rename = "price_paise")]
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub asset_url: Option<String>,
}

pub struct CatalogService<S>
where
    S: EventStore,
{
    products: CommandHandler<S, Product>,
}

impl<S> CatalogService<S>
where
    S: EventStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            products: CommandHandler::new(store),
        }
    }

    pub async fn get(&self, product_id: AggregateId) -> Result<Product> {
        self.products
            .load_existing(product_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound("Product".to_string()))
    }

    /// Lists a product owned by the requesting vendor.
    #[tracing::instrument(skip_all, fields(vendor_id = %requester.user_id, kind = %listing.kind))]
    pub async fn list_product(&self, requester: &Requester, listing: ListProduct) -> Result<Product> {
        if requester.role == Role::Customer {
            return Err(CheckoutError::Forbidden);
        }
        let product_id = AggregateId::new();
        let listing = NewListing {
            vendor_id: requester.user_id,
            name: listing.name,
            kind: listing.kind,
            price: listing.price,
            stock: listing.stock,
            asset_url: listing.asset_url,
        };
        let result = self
            .products
            .execute(product_id, |p| p.list(product_id, listing))
            .await?;
        tracing::info!(product_id = %product_id, "product listed");
        Ok(result.aggregate)
    }

    /// Adds stock to a physical product; owning vendor or admin.
    #[tracing::instrument(skip_all, fields(product_id = %product_id, quantity = quantity))]
    pub async fn restock(
        &self,
        requester: &Requester,
        product_id: AggregateId,
        quantity: u32,
    ) -> Result<Product> {
        let product = self.get(product_id).await?;
        if !requester.is_admin() && product.vendor_id() != Some(requester.user_id) {
            return Err(CheckoutError::Forbidden);
        }
        let result = self
            .products
            .execute(product_id, |p| p.restock(quantity))
            .await?;
        Ok(result.aggregate)
    }
}
