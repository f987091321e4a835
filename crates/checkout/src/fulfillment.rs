//! Order reads, fulfillment updates and digital downloads.

use common::AggregateId;
use domain::{
    CommandHandler, FulfillmentStatus, Order, Product, Requester, UnitOfWork, authorize_download,
    authorize_fulfillment_update, authorize_order_access,
};
use event_store::{EventEnvelope, EventStore};

use crate::error::{CheckoutError, Result};
use crate::inventory::InventoryReservation;
use crate::retry::after_failure;

pub struct FulfillmentService<S>
where
    S: EventStore,
{
    orders: CommandHandler<S, Order>,
    inventory: InventoryReservation<S>,
}

impl<S> FulfillmentService<S>
where
    S: EventStore + Clone,
{
    pub fn new(store: S) -> Self {
        let products: CommandHandler<S, Product> = CommandHandler::new(store.clone());
        Self {
            orders: CommandHandler::new(store),
            inventory: InventoryReservation::new(products),
        }
    }

    async fn find(&self, order_id: AggregateId) -> Result<Order> {
        self.orders
            .load_existing(order_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound("Order".to_string()))
    }

    /// Returns an order visible to the buyer or an admin.
    #[tracing::instrument(skip_all, fields(order_id = %order_id, user_id = %requester.user_id))]
    pub async fn get_order(&self, requester: &Requester, order_id: AggregateId) -> Result<Order> {
        let order = self.find(order_id).await?;
        authorize_order_access(&order, requester)?;
        Ok(order)
    }

    /// Moves an order's fulfillment status.
    ///
    /// Cancelling before shipment returns reserved stock in the same commit.
    #[tracing::instrument(skip_all, fields(order_id = %order_id, to = %to, user_id = %requester.user_id))]
    pub async fn update_status(
        &self,
        requester: &Requester,
        order_id: AggregateId,
        to: FulfillmentStatus,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_update_status(requester, order_id, to, reason.clone())
                .await
            {
                Ok(order) => {
                    tracing::info!(status = %order.fulfillment_status(), "order status updated");
                    return Ok(order);
                }
                Err(e) => after_failure(e, attempt, "update_order_status").await?,
            }
        }
    }

    async fn try_update_status(
        &self,
        requester: &Requester,
        order_id: AggregateId,
        to: FulfillmentStatus,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut order = self.find(order_id).await?;
        authorize_fulfillment_update(&order, requester)?;

        let from = order.fulfillment_status();
        let events = order.update_status(to, requester.user_id, reason)?;
        let mut uow = UnitOfWork::new();
        uow.stage(order_id, &mut order, events)?;
        if to == FulfillmentStatus::Cancelled && from.returns_stock_on_cancel() {
            self.inventory
                .stage_releases(&mut uow, order_id, order.lines())
                .await?;
        }
        uow.commit(self.orders.store()).await?;
        Ok(order)
    }

    /// Resolves the download location of a paid digital line.
    #[tracing::instrument(skip_all, fields(order_id = %order_id, product_id = %product_id))]
    pub async fn download_url(
        &self,
        requester: &Requester,
        order_id: AggregateId,
        product_id: AggregateId,
    ) -> Result<String> {
        let order = self.find(order_id).await?;
        let url = authorize_download(&order, product_id, requester)?;
        Ok(url.to_string())
    }

    /// The order's full event stream, under the same visibility as the order.
    pub async fn order_history(
        &self,
        requester: &Requester,
        order_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let order = self.find(order_id).await?;
        authorize_order_access(&order, requester)?;
        Ok(self
            .orders
            .store()
            .get_events_for_aggregate(order_id)
            .await?)
    }
}
