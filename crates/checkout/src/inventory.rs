//! Stock reservation and release for physical line items.
//!
//! Reservations are staged into the caller's [`UnitOfWork`] so the stock
//! events commit together with the order events. Each product is loaded
//! fresh and its stream is guarded by the version it was read at; a
//! concurrent reservation fails the whole commit and the caller re-reads.

use std::collections::BTreeMap;

use common::AggregateId;
use domain::{CommandHandler, LineItem, Product, UnitOfWork};
use event_store::EventStore;

use crate::error::{CheckoutError, Result};

/// Sums physical quantities per product so each stream is staged once.
fn physical_quantities<'a>(
    lines: impl IntoIterator<Item = &'a LineItem>,
) -> BTreeMap<AggregateId, u32> {
    let mut quantities = BTreeMap::new();
    for line in lines.into_iter().filter(|line| line.is_physical()) {
        let entry = quantities.entry(line.product_id).or_insert(0u32);
        *entry = entry.saturating_add(line.quantity);
    }
    quantities
}

#[derive(Clone)]
pub struct InventoryReservation<S>
where
    S: EventStore,
{
    products: CommandHandler<S, Product>,
}

impl<S> InventoryReservation<S>
where
    S: EventStore,
{
    pub fn new(products: CommandHandler<S, Product>) -> Self {
        Self { products }
    }

    /// Stages stock decrements for every physical line of `order_id`.
    ///
    /// Fails with [`CheckoutError::OutOfStock`] when any product is short,
    /// in which case nothing must be committed.
    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    pub async fn stage_reservations<'a>(
        &self,
        uow: &mut UnitOfWork,
        order_id: AggregateId,
        lines: impl IntoIterator<Item = &'a LineItem>,
    ) -> Result<()> {
        for (product_id, quantity) in physical_quantities(lines) {
            let mut product = self.products.require(product_id).await?;
            let events = product.reserve(order_id, quantity).map_err(CheckoutError::from)?;
            tracing::debug!(
                product_id = %product_id,
                quantity,
                available = product.stock(),
                "stock reservation staged"
            );
            uow.stage(product_id, &mut product, events)?;
        }
        Ok(())
    }

    /// Stages the return of stock for every physical line of a cancelled order.
    #[tracing::instrument(skip_all, fields(order_id = %order_id))]
    pub async fn stage_releases<'a>(
        &self,
        uow: &mut UnitOfWork,
        order_id: AggregateId,
        lines: impl IntoIterator<Item = &'a LineItem>,
    ) -> Result<()> {
        for (product_id, quantity) in physical_quantities(lines) {
            let mut product = self.products.require(product_id).await?;
            let events = product.release(order_id, quantity)?;
            uow.stage(product_id, &mut product, events)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::{Money, NewListing, ProductKind, UserId};
    use event_store::InMemoryEventStore;

    use super::*;

    async fn listed(
        products: &CommandHandler<InMemoryEventStore, Product>,
        kind: ProductKind,
        stock: u32,
    ) -> LineItem {
        let product_id = AggregateId::new();
        let vendor_id = UserId::new();
        products
            .execute(product_id, |p| {
                p.list(
                    product_id,
                    NewListing {
                        vendor_id,
                        name: "Print".to_string(),
                        kind,
                        price: Money::from_rupees(500),
                        stock,
                        asset_url: Some("https://cdn.example/print.zip".to_string()),
                    },
                )
            })
            .await
            .unwrap();
        LineItem {
            product_id,
            name: "Print".to_string(),
            vendor_id,
            kind,
            quantity: 1,
            unit_price: Money::from_rupees(500),
            options: BTreeMap::new(),
            asset_url: None,
        }
    }

    #[tokio::test]
    async fn reserves_only_physical_lines() {
        let store = InMemoryEventStore::new();
        let products = CommandHandler::new(store.clone());
        let physical = listed(&products, ProductKind::Physical, 3).await;
        let digital = listed(&products, ProductKind::Digital, 0).await;
        let inventory = InventoryReservation::new(products.clone());

        let mut uow = UnitOfWork::new();
        inventory
            .stage_reservations(&mut uow, AggregateId::new(), [&physical, &digital])
            .await
            .unwrap();
        assert_eq!(uow.stream_count(), 1);
        uow.commit(&store).await.unwrap();

        assert_eq!(products.require(physical.product_id).await.unwrap().stock(), 2);
    }

    #[tokio::test]
    async fn repeated_product_lines_reserve_the_sum() {
        let store = InMemoryEventStore::new();
        let products = CommandHandler::new(store.clone());
        let line = listed(&products, ProductKind::Physical, 2).await;
        let inventory = InventoryReservation::new(products.clone());

        let mut uow = UnitOfWork::new();
        let result = inventory
            .stage_reservations(&mut uow, AggregateId::new(), [&line, &line, &line])
            .await;
        assert!(matches!(result, Err(CheckoutError::OutOfStock(_))));
    }

    #[tokio::test]
    async fn release_returns_stock() {
        let store = InMemoryEventStore::new();
        let products = CommandHandler::new(store.clone());
        let line = listed(&products, ProductKind::Physical, 1).await;
        let inventory = InventoryReservation::new(products.clone());
        let order_id = AggregateId::new();

        let mut uow = UnitOfWork::new();
        inventory
            .stage_reservations(&mut uow, order_id, [&line])
            .await
            .unwrap();
        uow.commit(&store).await.unwrap();
        assert_eq!(products.require(line.product_id).await.unwrap().stock(), 0);

        let mut uow = UnitOfWork::new();
        inventory
            .stage_releases(&mut uow, order_id, [&line])
            .await
            .unwrap();
        uow.commit(&store).await.unwrap();
        assert_eq!(products.require(line.product_id).await.unwrap().stock(), 1);
    }
}
