//! Commission aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{GatewayReference, Money, PaymentMethod, PaymentStatus, UserId};

use super::events::{
    CommissionAcceptedData, CommissionCancelledData, CommissionCompletedData, CommissionPaidData,
    CommissionRejectedData, CommissionRequestedData, DeliveryAttachedData, PaymentInitiatedData,
    WorkStartedData,
};
use super::{
    CommissionError, CommissionEvent, CommissionParty, CommissionStatus, DeliveryFile, EscrowState,
};

/// A customer's request for bespoke work on a vendor's service listing.
#[derive(Debug, Clone)]
pub struct RequestCommission {
    pub customer_id: UserId,
    pub vendor_id: UserId,
    pub service_id: AggregateId,
    /// The service's listed price; the budget may not go below it.
    pub base_price: Money,
    pub description: String,
    pub budget: Money,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Commission {
    id: Option<AggregateId>,
    version: Version,
    customer_id: Option<UserId>,
    vendor_id: Option<UserId>,
    service_id: Option<AggregateId>,
    description: String,
    budget: Money,
    deadline: Option<DateTime<Utc>>,
    status: CommissionStatus,
    payment_status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
    escrow: EscrowState,
    files: Vec<DeliveryFile>,
    pending_gateway_order: Option<String>,
    gateway: Option<GatewayReference>,
    requested_at: Option<DateTime<Utc>>,
}

impl Aggregate for Commission {
    type Event = CommissionEvent;
    type Error = CommissionError;

    fn aggregate_type() -> &'static str {
        "Commission"
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
            CommissionEvent::CommissionRequested(data) => self.apply_requested(data),
            CommissionEvent::CommissionAccepted(_) => self.status = CommissionStatus::Accepted,
            CommissionEvent::CommissionRejected(_) => self.status = CommissionStatus::Rejected,
            CommissionEvent::CommissionCancelled(_) => self.status = CommissionStatus::Cancelled,
            CommissionEvent::PaymentInitiated(data) => {
                self.pending_gateway_order = Some(data.gateway_order_id);
            }
            CommissionEvent::CommissionPaid(data) => self.apply_paid(data),
            CommissionEvent::WorkStarted(_) => self.status = CommissionStatus::InProgress,
            CommissionEvent::DeliveryAttached(data) => {
                self.files.extend(data.files);
                if self.status == CommissionStatus::InProgress {
                    self.status = CommissionStatus::Delivered;
                }
            }
            CommissionEvent::CommissionCompleted(_) => {
                self.status = CommissionStatus::Completed;
                self.escrow = EscrowState::Released;
            }
        }
    }
}

// Query methods
impl Commission {
    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn vendor_id(&self) -> Option<UserId> {
        self.vendor_id
    }

    pub fn service_id(&self) -> Option<AggregateId> {
        self.service_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn budget(&self) -> Money {
        self.budget
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn status(&self) -> CommissionStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn escrow(&self) -> EscrowState {
        self.escrow
    }

    pub fn files(&self) -> &[DeliveryFile] {
        &self.files
    }

    /// Gateway order opened by the latest payment initiation, if any.
    pub fn pending_gateway_order(&self) -> Option<&str> {
        self.pending_gateway_order.as_deref()
    }

    pub fn gateway(&self) -> Option<&GatewayReference> {
        self.gateway.as_ref()
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Resolves the capacity in which `user_id` may act, if any.
    pub fn party_of(&self, user_id: UserId, is_admin: bool) -> Option<CommissionParty> {
        if self.customer_id == Some(user_id) {
            Some(CommissionParty::Customer)
        } else if self.vendor_id == Some(user_id) {
            Some(CommissionParty::Vendor)
        } else if is_admin {
            Some(CommissionParty::Admin)
        } else {
            None
        }
    }
}

// Command methods (return events)
impl Commission {
    pub fn request(
        &self,
        commission_id: AggregateId,
        command: RequestCommission,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        if self.id.is_some() {
            return Err(CommissionError::AlreadyRequested);
        }
        let description = command.description.trim();
        if description.is_empty() {
            return Err(CommissionError::InvalidRequest(
                "description is required".to_string(),
            ));
        }
        if command.customer_id == command.vendor_id {
            return Err(CommissionError::InvalidRequest(
                "vendors cannot commission their own services".to_string(),
            ));
        }
        if command.budget < command.base_price || !command.budget.is_positive() {
            return Err(CommissionError::InvalidRequest(format!(
                "budget {} is below the service price {}",
                command.budget, command.base_price
            )));
        }
        let now = Utc::now();
        if command.deadline <= now {
            return Err(CommissionError::InvalidRequest(
                "deadline must be in the future".to_string(),
            ));
        }

        Ok(vec![CommissionEvent::CommissionRequested(
            CommissionRequestedData {
                commission_id,
                customer_id: command.customer_id,
                vendor_id: command.vendor_id,
                service_id: command.service_id,
                description: description.to_string(),
                budget: command.budget,
                deadline: command.deadline,
                requested_at: now,
            },
        )])
    }

    /// Applies a status change requested through the status endpoint.
    ///
    /// `Delivered` is only reachable by attaching files, and nothing moves
    /// back to `Pending`.
    pub fn update_status(
        &self,
        to: CommissionStatus,
        party: CommissionParty,
        by: UserId,
        reason: Option<String>,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        match to {
            CommissionStatus::Accepted => self.accept(party, by),
            CommissionStatus::Rejected => self.reject(party, by, reason),
            CommissionStatus::InProgress => self.start_work(party, by),
            CommissionStatus::Completed => self.complete(party, by),
            CommissionStatus::Cancelled => self.cancel(party, by, reason),
            CommissionStatus::Pending | CommissionStatus::Delivered => {
                Err(CommissionError::InvalidTransition {
                    from: self.status,
                    to,
                })
            }
        }
    }

    pub fn accept(
        &self,
        party: CommissionParty,
        by: UserId,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_vendor_side(party, "accept")?;
        self.require_transition(CommissionStatus::Accepted)?;
        Ok(vec![CommissionEvent::CommissionAccepted(
            CommissionAcceptedData {
                accepted_by: by,
                accepted_at: Utc::now(),
            },
        )])
    }

    pub fn reject(
        &self,
        party: CommissionParty,
        by: UserId,
        reason: Option<String>,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_vendor_side(party, "reject")?;
        self.require_transition(CommissionStatus::Rejected)?;
        Ok(vec![CommissionEvent::CommissionRejected(
            CommissionRejectedData {
                rejected_by: by,
                reason,
                rejected_at: Utc::now(),
            },
        )])
    }

    /// Any party may call a commission off before work starts.
    pub fn cancel(
        &self,
        _party: CommissionParty,
        by: UserId,
        reason: Option<String>,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_requested()?;
        self.require_transition(CommissionStatus::Cancelled)?;
        Ok(vec![CommissionEvent::CommissionCancelled(
            CommissionCancelledData {
                from: self.status,
                cancelled_by: by,
                reason,
                cancelled_at: Utc::now(),
            },
        )])
    }

    pub fn start_work(
        &self,
        party: CommissionParty,
        by: UserId,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_vendor_side(party, "start work on")?;
        self.require_transition(CommissionStatus::InProgress)?;
        if !self.is_paid() {
            return Err(CommissionError::IllegalPaymentState(
                "work cannot start before the commission is paid".to_string(),
            ));
        }
        Ok(vec![CommissionEvent::WorkStarted(WorkStartedData {
            started_by: by,
            started_at: Utc::now(),
        })])
    }

    /// Signs the commission off, releasing the escrowed budget.
    pub fn complete(
        &self,
        _party: CommissionParty,
        by: UserId,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_requested()?;
        self.require_transition(CommissionStatus::Completed)?;
        Ok(vec![CommissionEvent::CommissionCompleted(
            CommissionCompletedData {
                completed_by: by,
                released: self.budget,
                completed_at: Utc::now(),
            },
        )])
    }

    /// Checks that payment may start: accepted and not yet paid.
    pub fn check_payable(&self) -> Result<(), CommissionError> {
        self.require_requested()?;
        if self.is_paid() {
            return Err(CommissionError::IllegalPaymentState(
                "commission is already paid".to_string(),
            ));
        }
        if self.status != CommissionStatus::Accepted {
            return Err(CommissionError::IllegalPaymentState(format!(
                "commission is {} and cannot be paid until accepted",
                self.status
            )));
        }
        Ok(())
    }

    pub fn initiate_payment(
        &self,
        gateway_order_id: String,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.check_payable()?;
        Ok(vec![CommissionEvent::PaymentInitiated(PaymentInitiatedData {
            gateway_order_id,
            amount: self.budget,
            initiated_at: Utc::now(),
        })])
    }

    /// Records the budget as collected and held in escrow.
    ///
    /// Gateway payments must match the gateway order this commission opened.
    /// An already-paid commission records nothing.
    pub fn confirm_payment(
        &self,
        method: PaymentMethod,
        gateway: Option<GatewayReference>,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_requested()?;
        if self.is_paid() {
            return Ok(vec![]);
        }
        self.check_payable()?;
        if method == PaymentMethod::Gateway {
            let issued = self.pending_gateway_order.as_deref();
            let presented = gateway.as_ref().map(|g| g.gateway_order_id.as_str());
            if issued.is_none() || issued != presented {
                return Err(CommissionError::IllegalPaymentState(
                    "payment does not match an initiated gateway order".to_string(),
                ));
            }
        }
        Ok(vec![CommissionEvent::CommissionPaid(CommissionPaidData {
            method,
            gateway,
            amount: self.budget,
            paid_at: Utc::now(),
        })])
    }

    /// Hands over files. In-progress work becomes delivered; later
    /// deliveries append.
    pub fn attach_delivery(
        &self,
        files: Vec<DeliveryFile>,
        party: CommissionParty,
        by: UserId,
    ) -> Result<Vec<CommissionEvent>, CommissionError> {
        self.require_requested()?;
        if party != CommissionParty::Vendor {
            return Err(CommissionError::NotPermitted {
                party,
                action: "deliver",
            });
        }
        if files.is_empty() {
            return Err(CommissionError::InvalidDelivery(
                "at least one file is required".to_string(),
            ));
        }
        if files
            .iter()
            .any(|file| file.url.trim().is_empty() || file.name.trim().is_empty())
        {
            return Err(CommissionError::InvalidDelivery(
                "every file needs a url and a name".to_string(),
            ));
        }
        if self.status != CommissionStatus::InProgress && !self.status.has_delivery() {
            return Err(CommissionError::InvalidTransition {
                from: self.status,
                to: CommissionStatus::Delivered,
            });
        }
        Ok(vec![CommissionEvent::DeliveryAttached(
            DeliveryAttachedData {
                files,
                delivered_by: by,
                delivered_at: Utc::now(),
            },
        )])
    }

    fn require_requested(&self) -> Result<(), CommissionError> {
        match self.id {
            Some(_) => Ok(()),
            None => Err(CommissionError::NotRequested),
        }
    }

    fn require_transition(&self, to: CommissionStatus) -> Result<(), CommissionError> {
        self.require_requested()?;
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(CommissionError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }

    fn require_vendor_side(
        &self,
        party: CommissionParty,
        action: &'static str,
    ) -> Result<(), CommissionError> {
        match party {
            CommissionParty::Vendor | CommissionParty::Admin => Ok(()),
            CommissionParty::Customer => Err(CommissionError::NotPermitted { party, action }),
        }
    }
}

// Apply event helpers
impl Commission {
    fn apply_requested(&mut self, data: CommissionRequestedData) {
        self.id = Some(data.commission_id);
        self.customer_id = Some(data.customer_id);
        self.vendor_id = Some(data.vendor_id);
        self.service_id = Some(data.service_id);
        self.description = data.description;
        self.budget = data.budget;
        self.deadline = Some(data.deadline);
        self.requested_at = Some(data.requested_at);
        self.status = CommissionStatus::Pending;
        self.payment_status = PaymentStatus::Pending;
    }

    fn apply_paid(&mut self, data: CommissionPaidData) {
        self.payment_status = PaymentStatus::Paid;
        self.payment_method = Some(data.method);
        self.gateway = data.gateway;
        self.escrow = EscrowState::Held;
    }
}
