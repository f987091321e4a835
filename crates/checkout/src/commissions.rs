//! Commission requests, status changes and delivery.
//!
//! Payment of a commission goes through [`crate::CheckoutService`]; this
//! service covers everything else in the commission lifecycle.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    CommandHandler, Commission, CommissionError, CommissionEvent, CommissionParty,
    CommissionStatus, DeliveryFile, Money, Product, ProductKind, RequestCommission, Requester,
    UnitOfWork, authorize_commission_access,
};
use event_store::{EventEnvelope, EventStore};
use serde::Deserialize;

use crate::error::{CheckoutError, Result};
use crate::retry::after_failure;

/// A customer's commission request for a vendor's service listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CommissionRequest {
    pub service_id: AggregateId,
    pub description: String,
    #[serde(rename = "budget_paise")]
    pub budget: Money,
    pub deadline: DateTime<Utc>,
}

pub struct CommissionService<S>
where
    S: EventStore,
{
    products: CommandHandler<S, Product>,
    commissions: CommandHandler<S, Commission>,
}

impl<S> CommissionService<S>
where
    S: EventStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            products: CommandHandler::new(store.clone()),
            commissions: CommandHandler::new(store),
        }
    }

    /// Opens a commission on an active service listing.
    ///
    /// Vendor and base price come from the listing, not from the request.
    #[tracing::instrument(skip_all, fields(service_id = %request.service_id, customer_id = %requester.user_id))]
    pub async fn request(
        &self,
        requester: &Requester,
        request: CommissionRequest,
    ) -> Result<Commission> {
        let service = self
            .products
            .load_existing(request.service_id)
            .await?
            .ok_or_else(|| {
                CheckoutError::Validation(format!("service {} does not exist", request.service_id))
            })?;
        if service.kind() != Some(ProductKind::Service) {
            return Err(CheckoutError::Validation(format!(
                "{} is not a commissionable service",
                service.name()
            )));
        }
        if !service.is_active() {
            return Err(CheckoutError::Validation(format!(
                "{} is no longer available",
                service.name()
            )));
        }
        let vendor_id = service
            .vendor_id()
            .ok_or_else(|| CheckoutError::Validation("service has no vendor".to_string()))?;

        let commission_id = AggregateId::new();
        let command = RequestCommission {
            customer_id: requester.user_id,
            vendor_id,
            service_id: request.service_id,
            base_price: service.price(),
            description: request.description,
            budget: request.budget,
            deadline: request.deadline,
        };
        let result = self
            .commissions
            .execute(commission_id, |c| c.request(commission_id, command))
            .await?;
        metrics::counter!("commission_transitions_total", "status" => CommissionStatus::Pending.as_str())
            .increment(1);
        tracing::info!(commission_id = %commission_id, budget = %request.budget, "commission requested");
        Ok(result.aggregate)
    }

    async fn find(&self, commission_id: AggregateId) -> Result<Commission> {
        self.commissions
            .load_existing(commission_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound("Commission".to_string()))
    }

    pub async fn get(&self, requester: &Requester, commission_id: AggregateId) -> Result<Commission> {
        let commission = self.find(commission_id).await?;
        authorize_commission_access(&commission, requester)?;
        Ok(commission)
    }

    /// Applies a status change on behalf of the requester's party.
    #[tracing::instrument(skip_all, fields(commission_id = %commission_id, to = %to))]
    pub async fn update_status(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
        to: CommissionStatus,
        reason: Option<String>,
    ) -> Result<Commission> {
        let commission = self
            .apply(requester, commission_id, "update_commission_status", |c, party| {
                c.update_status(to, party, requester.user_id, reason.clone())
            })
            .await?;
        metrics::counter!("commission_transitions_total", "status" => to.as_str()).increment(1);
        tracing::info!(status = %commission.status(), "commission status updated");
        Ok(commission)
    }

    /// Attaches delivered files; vendor only.
    #[tracing::instrument(skip_all, fields(commission_id = %commission_id, files = files.len()))]
    pub async fn attach_delivery(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
        files: Vec<DeliveryFile>,
    ) -> Result<Commission> {
        let commission = self
            .apply(requester, commission_id, "attach_delivery", |c, party| {
                c.attach_delivery(files.clone(), party, requester.user_id)
            })
            .await?;
        metrics::counter!("commission_transitions_total", "status" => CommissionStatus::Delivered.as_str())
            .increment(1);
        Ok(commission)
    }

    pub async fn history(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get(requester, commission_id).await?;
        Ok(self
            .commissions
            .store()
            .get_events_for_aggregate(commission_id)
            .await?)
    }

    /// Loads, authorizes and runs a command, re-reading on lost races.
    async fn apply<F>(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
        operation: &'static str,
        command: F,
    ) -> Result<Commission>
    where
        F: Fn(
                &Commission,
                CommissionParty,
            ) -> std::result::Result<Vec<CommissionEvent>, CommissionError>
            + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result: Result<Commission> = async {
                let mut commission = self.find(commission_id).await?;
                let party = authorize_commission_access(&commission, requester)?;
                let events = command(&commission, party)?;
                let mut uow = UnitOfWork::new();
                uow.stage(commission_id, &mut commission, events)?;
                uow.commit(self.commissions.store()).await?;
                Ok(commission)
            }
            .await;
            match result {
                Ok(commission) => return Ok(commission),
                Err(e) => after_failure(e, attempt, operation).await?,
            }
        }
    }
}
