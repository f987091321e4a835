//! Checkout orchestration: from a cart or an accepted commission to a paid
//! transaction.
//!
//! Two paths lead to a paid order. With the gateway up, `initiate_payment`
//! opens a gateway order and a payment intent; the order only comes into
//! existence when a signed capture is verified. With the gateway down,
//! `create_order` places and pays the order directly. Either way the
//! order, its payment and its stock reservations are one atomic commit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use common::AggregateId;
use domain::{
    Aggregate, CURRENCY, CommandHandler, Commission, CommissionParty, GatewayReference,
    IntentPurpose, Money, OpenIntent, Order, PaymentIntent, PaymentMethod, PlaceOrder, Product,
    Requester, UnitOfWork, UserId, authorize_commission_access, intent_id_for, order_id_for,
};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, PricedCart, price_cart};
use crate::error::{CheckoutError, Result};
use crate::gateway::{CreateGatewayOrder, GatewayOrder, PaymentGateway};
use crate::inventory::InventoryReservation;
use crate::retry::after_failure;
use crate::signature::SignatureVerifier;
use crate::webhook::{CapturedAmount, WebhookAction, WebhookEvent};

/// What the client needs to open the gateway's payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayCheckout {
    pub gateway_order_id: String,
    #[serde(rename = "amount_paise")]
    pub amount: Money,
    pub currency: String,
    pub key_id: Option<String>,
}

/// Outcome of starting a cart payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInitiation {
    Gateway(GatewayCheckout),
    /// The gateway is unavailable; the client should place a direct order.
    DirectCheckout,
}

/// Outcome of starting a commission payment.
#[derive(Debug)]
pub enum CommissionPaymentStart {
    Gateway(GatewayCheckout),
    /// The gateway is unavailable and the budget was recorded as paid.
    PaidDirectly(Commission),
}

/// A signed capture as returned by the gateway to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
    /// The checkout payload some clients replay. Never trusted.
    #[serde(default)]
    pub original_payload: Option<serde_json::Value>,
}

/// The record a verified capture settled.
#[derive(Debug)]
pub enum Settlement {
    Order(Order),
    Commission(Commission),
}

#[derive(Debug)]
pub enum WebhookOutcome {
    Captured(Settlement),
    Failed,
    Ignored,
}

/// Which intent purpose a verification endpoint accepts.
#[derive(Debug, Clone, Copy)]
enum Expected {
    Order,
    Commission(AggregateId),
    Any,
}

impl Expected {
    fn matches(&self, purpose: &IntentPurpose) -> bool {
        match (self, purpose) {
            (Expected::Any, _) | (Expected::Order, IntentPurpose::Order { .. }) => true,
            (Expected::Commission(id), IntentPurpose::Commission { commission_id }) => {
                id == commission_id
            }
            _ => false,
        }
    }
}

/// Checkout, payment verification and commission payment.
pub struct CheckoutService<S>
where
    S: EventStore,
{
    products: CommandHandler<S, Product>,
    orders: CommandHandler<S, Order>,
    intents: CommandHandler<S, PaymentIntent>,
    commissions: CommandHandler<S, Commission>,
    inventory: InventoryReservation<S>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
}

impl<S> CheckoutService<S>
where
    S: EventStore + Clone,
{
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>, verifier: SignatureVerifier) -> Self {
        let products = CommandHandler::new(store.clone());
        Self {
            inventory: InventoryReservation::new(products.clone()),
            products,
            orders: CommandHandler::new(store.clone()),
            intents: CommandHandler::new(store.clone()),
            commissions: CommandHandler::new(store),
            gateway,
            verifier,
        }
    }

    pub fn gateway_available(&self) -> bool {
        self.gateway.is_available()
    }

    /// Prices a cart and opens a gateway order for it.
    ///
    /// Returns [`PaymentInitiation::DirectCheckout`] when the gateway is
    /// down. Nothing is reserved and no order exists until verification.
    #[tracing::instrument(skip_all, fields(buyer_id = %requester.user_id, lines = cart.lines.len()))]
    pub async fn initiate_payment(
        &self,
        requester: &Requester,
        cart: &Cart,
    ) -> Result<PaymentInitiation> {
        let priced = price_cart(&self.products, cart).await?;
        metrics::counter!("checkout_initiated_total", "purpose" => "order").increment(1);

        let mut notes = BTreeMap::new();
        notes.insert("purpose".to_string(), "order".to_string());
        notes.insert("buyer_id".to_string(), requester.user_id.to_string());
        let Some(gateway_order) = self.create_gateway_order(priced.total, notes).await? else {
            return Ok(PaymentInitiation::DirectCheckout);
        };

        let PricedCart {
            lines,
            shipping_address,
            total,
        } = priced;
        let intent_id = intent_id_for(&gateway_order.id);
        let open = OpenIntent {
            gateway_order_id: gateway_order.id.clone(),
            payer_id: requester.user_id,
            amount: total,
            purpose: IntentPurpose::Order {
                lines,
                shipping_address,
            },
        };
        self.intents
            .execute(intent_id, |intent| intent.open(intent_id, open))
            .await?;

        tracing::info!(gateway_order_id = %gateway_order.id, amount = %total, "payment intent opened");
        Ok(PaymentInitiation::Gateway(self.connection(gateway_order)))
    }

    /// Places a paid order without the gateway.
    ///
    /// Only allowed while the gateway is unavailable, so the payment step
    /// cannot be skipped.
    #[tracing::instrument(skip_all, fields(buyer_id = %requester.user_id, lines = cart.lines.len()))]
    pub async fn create_order(&self, requester: &Requester, cart: &Cart) -> Result<Order> {
        if self.gateway.is_available() {
            return Err(CheckoutError::GatewayAvailable);
        }
        let priced = price_cart(&self.products, cart).await?;

        let started = Instant::now();
        let order_id = AggregateId::new();
        let mut attempt = 0;
        let order = loop {
            attempt += 1;
            match self
                .try_place_direct(order_id, requester.user_id, &priced)
                .await
            {
                Ok(order) => break order,
                Err(e) => after_failure(e, attempt, "create_order").await?,
            }
        };
        metrics::histogram!("checkout_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("orders_placed_total", "method" => PaymentMethod::Direct.as_str())
            .increment(1);
        tracing::info!(order_id = %order_id, total = %order.total(), "direct order placed");
        Ok(order)
    }

    /// Verifies a client-returned capture and materialises its order.
    #[tracing::instrument(skip_all, fields(gateway_order_id = %verification.gateway_order_id))]
    pub async fn verify_payment(
        &self,
        payer: &Requester,
        verification: &PaymentVerification,
    ) -> Result<Order> {
        match self.verify(payer, verification, Expected::Order).await? {
            Settlement::Order(order) => {
                if let Some(payload) = &verification.original_payload {
                    check_replayed_payload(&order, payload);
                }
                Ok(order)
            }
            Settlement::Commission(_) => Err(CheckoutError::NotFound("Order".to_string())),
        }
    }

    /// Verifies a client-returned capture for one commission.
    #[tracing::instrument(skip_all, fields(commission_id = %commission_id, gateway_order_id = %verification.gateway_order_id))]
    pub async fn verify_commission_payment(
        &self,
        payer: &Requester,
        commission_id: AggregateId,
        verification: &PaymentVerification,
    ) -> Result<Commission> {
        match self
            .verify(payer, verification, Expected::Commission(commission_id))
            .await?
        {
            Settlement::Commission(commission) => Ok(commission),
            Settlement::Order(_) => Err(CheckoutError::NotFound("Commission".to_string())),
        }
    }

    /// Starts paying an accepted commission's budget.
    ///
    /// With the gateway down the budget is recorded as paid directly.
    #[tracing::instrument(skip_all, fields(commission_id = %commission_id, user_id = %requester.user_id))]
    pub async fn initiate_commission_payment(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
    ) -> Result<CommissionPaymentStart> {
        let commission = self.payable_commission(requester, commission_id).await?;
        metrics::counter!("checkout_initiated_total", "purpose" => "commission").increment(1);

        let mut notes = BTreeMap::new();
        notes.insert("purpose".to_string(), "commission".to_string());
        notes.insert("commission_id".to_string(), commission_id.to_string());
        let Some(gateway_order) = self.create_gateway_order(commission.budget(), notes).await?
        else {
            let result = self
                .commissions
                .execute(commission_id, |c| {
                    c.confirm_payment(PaymentMethod::Direct, None)
                })
                .await?;
            metrics::counter!("commission_transitions_total", "status" => "paid").increment(1);
            tracing::info!(commission_id = %commission_id, "commission paid directly");
            return Ok(CommissionPaymentStart::PaidDirectly(result.aggregate));
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_open_commission_intent(requester.user_id, commission_id, &gateway_order)
                .await
            {
                Ok(()) => break,
                Err(e) => after_failure(e, attempt, "initiate_commission_payment").await?,
            }
        }
        tracing::info!(gateway_order_id = %gateway_order.id, "commission payment intent opened");
        Ok(CommissionPaymentStart::Gateway(self.connection(gateway_order)))
    }

    /// Handles a gateway webhook, authenticated by its body signature.
    ///
    /// Captures go through the same settlement as client verification;
    /// failures mark the intent failed. Webhooks for gateway orders this
    /// engine never opened are ignored.
    #[tracing::instrument(skip_all, fields(bytes = body.len()))]
    pub async fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        if !self.verifier.verify_webhook(body, signature) {
            metrics::counter!("payment_signature_failures_total", "source" => "webhook")
                .increment(1);
            tracing::warn!(target: "security", "webhook signature mismatch");
            return Err(CheckoutError::InvalidSignature);
        }

        let event = WebhookEvent::parse(body)?;
        match event.action()? {
            WebhookAction::Captured {
                gateway_order_id,
                gateway_payment_id,
                captured,
            } => match self
                .settle_capture(
                    None,
                    &gateway_order_id,
                    &gateway_payment_id,
                    captured.as_ref(),
                    Expected::Any,
                )
                .await
            {
                Ok(settlement) => Ok(WebhookOutcome::Captured(settlement)),
                Err(CheckoutError::NotFound(_)) => {
                    tracing::warn!(gateway_order_id = %gateway_order_id, "capture webhook for unknown gateway order");
                    Ok(WebhookOutcome::Ignored)
                }
                Err(e) => Err(e),
            },
            WebhookAction::Failed {
                gateway_order_id,
                reason,
            } => {
                let intent_id = intent_id_for(&gateway_order_id);
                if self.intents.load_existing(intent_id).await?.is_none() {
                    tracing::warn!(gateway_order_id = %gateway_order_id, "failure webhook for unknown gateway order");
                    return Ok(WebhookOutcome::Ignored);
                }
                self.intents
                    .execute(intent_id, |intent| intent.fail(reason))
                    .await?;
                metrics::counter!("payments_verified_total", "outcome" => "failed").increment(1);
                tracing::info!(gateway_order_id = %gateway_order_id, "payment failed");
                Ok(WebhookOutcome::Failed)
            }
            WebhookAction::Ignore { event } => {
                tracing::debug!(event = %event, "webhook ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }
}

// Internal steps
impl<S> CheckoutService<S>
where
    S: EventStore + Clone,
{
    /// Creates a gateway order, or returns None when checkout must fall back
    /// to the direct path.
    async fn create_gateway_order(
        &self,
        amount: Money,
        notes: BTreeMap<String, String>,
    ) -> Result<Option<GatewayOrder>> {
        if !self.gateway.is_available() {
            metrics::counter!("checkout_fallback_total", "reason" => "unavailable").increment(1);
            tracing::info!("payment gateway unavailable, falling back to direct checkout");
            return Ok(None);
        }
        let request = CreateGatewayOrder {
            amount,
            currency: CURRENCY.to_string(),
            receipt: format!("rcpt_{}", AggregateId::new().as_uuid().simple()),
            notes,
        };
        match self.gateway.create_order(request).await {
            Ok(order) => Ok(Some(order)),
            Err(e) if e.is_unavailable() => {
                metrics::counter!("checkout_fallback_total", "reason" => "create_failed")
                    .increment(1);
                tracing::warn!(error = %e, "gateway order creation failed, falling back to direct checkout");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn connection(&self, order: GatewayOrder) -> GatewayCheckout {
        GatewayCheckout {
            gateway_order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.gateway.key_id().map(str::to_string),
        }
    }

    async fn try_place_direct(
        &self,
        order_id: AggregateId,
        buyer_id: UserId,
        priced: &PricedCart,
    ) -> Result<Order> {
        let mut order = Order::default();
        let mut uow = UnitOfWork::new().with_metadata("payment_method", serde_json::json!("direct"));

        let placed = order.place(
            order_id,
            PlaceOrder {
                buyer_id,
                lines: priced.lines.clone(),
                shipping_address: priced.shipping_address.clone(),
            },
        )?;
        uow.stage(order_id, &mut order, placed)?;
        let paid = order.confirm_payment(PaymentMethod::Direct, None)?;
        uow.stage(order_id, &mut order, paid)?;
        self.inventory
            .stage_reservations(&mut uow, order_id, &priced.lines)
            .await?;

        uow.commit(self.orders.store()).await?;
        Ok(order)
    }

    async fn payable_commission(
        &self,
        requester: &Requester,
        commission_id: AggregateId,
    ) -> Result<Commission> {
        let commission = self
            .commissions
            .load_existing(commission_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound("Commission".to_string()))?;
        if authorize_commission_access(&commission, requester)? != CommissionParty::Customer {
            return Err(CheckoutError::Forbidden);
        }
        commission.check_payable()?;
        Ok(commission)
    }

    /// Opens the intent and records the pending gateway order on the
    /// commission in one commit.
    async fn try_open_commission_intent(
        &self,
        payer_id: UserId,
        commission_id: AggregateId,
        gateway_order: &GatewayOrder,
    ) -> Result<()> {
        let mut commission = self.commissions.require(commission_id).await?;
        let mut uow = UnitOfWork::new();
        let initiated = commission.initiate_payment(gateway_order.id.clone())?;
        uow.stage(commission_id, &mut commission, initiated)?;

        let intent_id = intent_id_for(&gateway_order.id);
        let mut intent = PaymentIntent::default();
        let opened = intent.open(
            intent_id,
            OpenIntent {
                gateway_order_id: gateway_order.id.clone(),
                payer_id,
                amount: commission.budget(),
                purpose: IntentPurpose::Commission { commission_id },
            },
        )?;
        uow.stage(intent_id, &mut intent, opened)?;
        uow.commit(self.commissions.store()).await?;
        Ok(())
    }

    async fn verify(
        &self,
        payer: &Requester,
        verification: &PaymentVerification,
        expected: Expected,
    ) -> Result<Settlement> {
        if !self.verifier.verify_payment(
            &verification.gateway_order_id,
            &verification.gateway_payment_id,
            &verification.signature,
        ) {
            metrics::counter!("payment_signature_failures_total", "source" => "client")
                .increment(1);
            tracing::warn!(
                target: "security",
                gateway_order_id = %verification.gateway_order_id,
                gateway_payment_id = %verification.gateway_payment_id,
                user_id = %payer.user_id,
                "payment signature mismatch"
            );
            return Err(CheckoutError::InvalidSignature);
        }
        self.settle_capture(
            Some(payer),
            &verification.gateway_order_id,
            &verification.gateway_payment_id,
            None,
            expected,
        )
        .await
    }

    /// Applies a verified capture, retrying lost races.
    ///
    /// A concurrent settlement of the same gateway order writes to the same
    /// streams, so the loser re-reads, finds the intent captured and returns
    /// the record the winner created.
    async fn settle_capture(
        &self,
        payer: Option<&Requester>,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        reported: Option<&CapturedAmount>,
        expected: Expected,
    ) -> Result<Settlement> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .try_settle_capture(payer, gateway_order_id, gateway_payment_id, reported, expected)
                .await
            {
                Ok((settlement, duplicate)) => {
                    let outcome = if duplicate { "duplicate" } else { "captured" };
                    metrics::counter!("payments_verified_total", "outcome" => outcome)
                        .increment(1);
                    if !duplicate {
                        metrics::histogram!("checkout_commit_duration_seconds")
                            .record(started.elapsed().as_secs_f64());
                    }
                    tracing::info!(gateway_order_id, outcome, "payment settled");
                    return Ok(settlement);
                }
                Err(CheckoutError::OutOfStock(message)) => {
                    tracing::warn!(
                        gateway_order_id,
                        reason = %message,
                        "captured payment cannot be fulfilled, stock ran out"
                    );
                    return Err(CheckoutError::OutOfStock(message));
                }
                Err(e) => after_failure(e, attempt, "settle_capture").await?,
            }
        }
    }

    /// Returns the settled record and whether it had already been settled.
    ///
    /// A reported capture amount must equal the amount held on the intent.
    async fn try_settle_capture(
        &self,
        payer: Option<&Requester>,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        reported: Option<&CapturedAmount>,
        expected: Expected,
    ) -> Result<(Settlement, bool)> {
        let intent_id = intent_id_for(gateway_order_id);
        let mut intent = self
            .intents
            .load_existing(intent_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound("Payment intent".to_string()))?;
        let payer_id = intent
            .payer_id()
            .ok_or_else(|| CheckoutError::NotFound("Payment intent".to_string()))?;
        if let Some(payer) = payer {
            if payer.user_id != payer_id {
                tracing::warn!(
                    target: "security",
                    gateway_order_id,
                    user_id = %payer.user_id,
                    "payment verification by someone other than the payer"
                );
                return Err(CheckoutError::NotFound("Payment intent".to_string()));
            }
        }
        if let Some(reported) = reported {
            if !reported.matches(intent.amount()) {
                metrics::counter!("payments_verified_total", "outcome" => "amount_mismatch")
                    .increment(1);
                tracing::warn!(
                    target: "security",
                    gateway_order_id,
                    expected = %intent.amount(),
                    captured = %reported.amount,
                    currency = %reported.currency,
                    "captured amount does not match the payment intent"
                );
                return Err(CheckoutError::Validation(
                    "captured amount does not match the payment".to_string(),
                ));
            }
        }
        let purpose = intent
            .purpose()
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound("Payment intent".to_string()))?;
        if !expected.matches(&purpose) {
            return Err(CheckoutError::NotFound("Payment intent".to_string()));
        }

        let gateway = GatewayReference {
            gateway_order_id: gateway_order_id.to_string(),
            gateway_payment_id: gateway_payment_id.to_string(),
        };
        let mut uow = UnitOfWork::new()
            .with_metadata("gateway_order_id", serde_json::json!(gateway_order_id))
            .with_metadata("gateway_payment_id", serde_json::json!(gateway_payment_id));

        match purpose {
            IntentPurpose::Order {
                lines,
                shipping_address,
            } => {
                let order_id = order_id_for(gateway_order_id);
                let mut order = self.orders.load(order_id).await?;
                if intent.is_captured() || order.is_paid() {
                    let order = self.orders.require(order_id).await?;
                    return Ok((Settlement::Order(order), true));
                }

                if order.id().is_none() {
                    let placed = order.place(
                        order_id,
                        PlaceOrder {
                            buyer_id: payer_id,
                            lines,
                            shipping_address,
                        },
                    )?;
                    uow.stage(order_id, &mut order, placed)?;
                }
                let paid = order.confirm_payment(PaymentMethod::Gateway, Some(gateway))?;
                uow.stage(order_id, &mut order, paid)?;
                self.inventory
                    .stage_reservations(&mut uow, order_id, order.lines())
                    .await?;
                let captured = intent.capture(gateway_payment_id.to_string(), order_id)?;
                uow.stage(intent_id, &mut intent, captured)?;

                uow.commit(self.orders.store()).await?;
                metrics::counter!("orders_placed_total", "method" => PaymentMethod::Gateway.as_str())
                    .increment(1);
                Ok((Settlement::Order(order), false))
            }
            IntentPurpose::Commission { commission_id } => {
                let mut commission = self.commissions.require(commission_id).await?;
                if intent.is_captured() || commission.is_paid() {
                    return Ok((Settlement::Commission(commission), true));
                }

                let paid = commission.confirm_payment(PaymentMethod::Gateway, Some(gateway))?;
                uow.stage(commission_id, &mut commission, paid)?;
                let captured = intent.capture(gateway_payment_id.to_string(), commission_id)?;
                uow.stage(intent_id, &mut intent, captured)?;

                uow.commit(self.commissions.store()).await?;
                metrics::counter!("commission_transitions_total", "status" => "paid").increment(1);
                Ok((Settlement::Commission(commission), false))
            }
        }
    }
}

/// Logs a replayed checkout payload that disagrees with what was paid for.
///
/// The order is always built from the payment intent; this only surfaces
/// tampering or a stale client.
fn check_replayed_payload(order: &Order, payload: &serde_json::Value) {
    let Ok(cart) = serde_json::from_value::<Cart>(payload.clone()) else {
        tracing::warn!(target: "security", order_id = ?order.id(), "unreadable replayed checkout payload ignored");
        return;
    };
    let replayed = crate::cart::merge_lines(&cart.lines).map(|lines| {
        lines
            .into_iter()
            .map(|line| (line.product_id, line.quantity))
            .collect::<BTreeMap<_, _>>()
    });
    let paid: BTreeMap<_, _> = order
        .lines()
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();
    if replayed.as_ref().ok() != Some(&paid) {
        tracing::warn!(
            target: "security",
            order_id = ?order.id(),
            "replayed checkout payload differs from the paid intent and was ignored"
        );
    }
}
