//! Order aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{GatewayReference, Money, PaymentMethod, PaymentStatus, UserId};

use super::{
    FulfillmentStatus, LineItem, OrderError, OrderEvent, ShippingAddress,
    events::{OrderPlacedData, PaymentConfirmedData},
};

/// The priced contents of a checkout, ready to become an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub buyer_id: UserId,
    pub lines: Vec<LineItem>,
    pub shipping_address: Option<ShippingAddress>,
}

/// Order aggregate root.
///
/// An order records one checkout from placement through fulfillment. Its line
/// prices are frozen at placement and the payment flag flips exactly once.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    buyer_id: Option<UserId>,
    lines: Vec<LineItem>,
    shipping_address: Option<ShippingAddress>,
    total: Money,
    payment_status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
    gateway: Option<GatewayReference>,
    fulfillment: FulfillmentStatus,
    unlocked: BTreeSet<AggregateId>,
    placed_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderPlaced(data) => self.apply_placed(data),
            OrderEvent::PaymentConfirmed(data) => self.apply_payment_confirmed(data),
            OrderEvent::DownloadsUnlocked(data) => self.unlocked.extend(data.product_ids),
            OrderEvent::FulfillmentAdvanced(data) => self.fulfillment = data.to,
            OrderEvent::OrderCancelled(_) => self.fulfillment = FulfillmentStatus::Cancelled,
        }
    }
}

// Query methods
impl Order {
    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn line(&self, product_id: AggregateId) -> Option<&LineItem> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn gateway(&self) -> Option<&GatewayReference> {
        self.gateway.as_ref()
    }

    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_unlocked(&self, product_id: AggregateId) -> bool {
        self.unlocked.contains(&product_id)
    }

    pub fn unlocked_downloads(&self) -> impl Iterator<Item = &AggregateId> {
        self.unlocked.iter()
    }

    pub fn has_physical_items(&self) -> bool {
        self.lines.iter().any(LineItem::is_physical)
    }

    /// True when `vendor_id` sells at least one of the order's lines.
    pub fn involves_vendor(&self, vendor_id: UserId) -> bool {
        self.lines.iter().any(|line| line.vendor_id == vendor_id)
    }
}

// Command methods (return events)
impl Order {
    /// Places an order from priced lines.
    ///
    /// The total is derived here from the captured unit prices. The shipping
    /// address is required for physical goods and dropped otherwise.
    pub fn place(
        &self,
        order_id: AggregateId,
        command: PlaceOrder,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if command.lines.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(line) = command.lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        let has_physical = command.lines.iter().any(LineItem::is_physical);
        let shipping_address = match command.shipping_address {
            Some(address) if has_physical && address.is_complete() => Some(address),
            _ if has_physical => return Err(OrderError::MissingAddress),
            _ => None,
        };

        let total = command
            .lines
            .iter()
            .try_fold(Money::zero(), |sum, line| {
                line.subtotal().and_then(|subtotal| sum.checked_add(subtotal))
            })
            .ok_or(OrderError::TotalOverflow)?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            buyer_id: command.buyer_id,
            lines: command.lines,
            shipping_address,
            total,
            placed_at: Utc::now(),
        })])
    }

    /// Marks the order paid and runs the payment side effects.
    ///
    /// Digital lines are unlocked, and an order with only digital lines is
    /// completed on the spot. Confirming an already-paid order records
    /// nothing.
    pub fn confirm_payment(
        &self,
        method: PaymentMethod,
        gateway: Option<GatewayReference>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        if self.is_paid() {
            return Ok(vec![]);
        }

        let mut events = vec![OrderEvent::payment_confirmed(method, gateway)];

        let digital: Vec<AggregateId> = self
            .lines
            .iter()
            .filter(|line| line.is_digital())
            .map(|line| line.product_id)
            .collect();
        if !digital.is_empty() {
            events.push(OrderEvent::downloads_unlocked(digital));
        }

        if !self.has_physical_items() && self.fulfillment == FulfillmentStatus::Pending {
            events.push(OrderEvent::fulfillment_advanced(
                self.fulfillment,
                FulfillmentStatus::Completed,
                None,
            ));
        }

        Ok(events)
    }

    /// Moves fulfillment to `to` on behalf of `changed_by`.
    ///
    /// Only the next status in line or `Cancelled` is accepted.
    pub fn update_status(
        &self,
        to: FulfillmentStatus,
        changed_by: UserId,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        if !self.is_paid() {
            return Err(OrderError::NotPaid);
        }

        let from = self.fulfillment;
        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from, to });
        }

        let event = if to == FulfillmentStatus::Cancelled {
            OrderEvent::order_cancelled(from, Some(changed_by), reason)
        } else {
            OrderEvent::fulfillment_advanced(from, to, Some(changed_by))
        };
        Ok(vec![event])
    }
}

// Apply event helpers
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.buyer_id = Some(data.buyer_id);
        self.lines = data.lines;
        self.shipping_address = data.shipping_address;
        self.total = data.total;
        self.placed_at = Some(data.placed_at);
        self.payment_status = PaymentStatus::Pending;
        self.fulfillment = FulfillmentStatus::Pending;
    }

    fn apply_payment_confirmed(&mut self, data: PaymentConfirmedData) {
        self.payment_status = PaymentStatus::Paid;
        self.payment_method = Some(data.method);
        self.gateway = data.gateway;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::catalog::ProductKind;

    fn line(kind: ProductKind, quantity: u32, rupees: i64) -> LineItem {
        LineItem {
            product_id: AggregateId::new(),
            name: format!("{kind} item"),
            vendor_id: UserId::new(),
            kind,
            quantity,
            unit_price: Money::from_rupees(rupees),
            options: BTreeMap::new(),
            asset_url: (kind == ProductKind::Digital).then(|| "https://cdn.example/a".to_string()),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "4 Park Street".to_string(),
            city: "Kolkata".to_string(),
            phone: "+91 98300 00000".to_string(),
        }
    }

    fn placed(lines: Vec<LineItem>) -> Order {
        let mut order = Order::default();
        let shipping_address = Some(address());
        let events = order
            .place(
                AggregateId::new(),
                PlaceOrder {
                    buyer_id: UserId::new(),
                    lines,
                    shipping_address,
                },
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    fn paid(lines: Vec<LineItem>) -> Order {
        let mut order = placed(lines);
        let events = order.confirm_payment(PaymentMethod::Direct, None).unwrap();
        order.apply_events(events);
        order
    }

    #[test]
    fn test_place_computes_total() {
        let order = placed(vec![
            line(ProductKind::Physical, 2, 500),
            line(ProductKind::Digital, 1, 99),
        ]);
        assert_eq!(order.total(), Money::from_rupees(1099));
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert!(order.shipping_address().is_some());
    }

    #[test]
    fn test_place_requires_address_for_physical() {
        let result = Order::default().place(
            AggregateId::new(),
            PlaceOrder {
                buyer_id: UserId::new(),
                lines: vec![line(ProductKind::Physical, 1, 10)],
                shipping_address: None,
            },
        );
        assert!(matches!(result, Err(OrderError::MissingAddress)));
    }

    #[test]
    fn test_place_drops_address_without_physical() {
        let order = placed(vec![line(ProductKind::Digital, 1, 10)]);
        assert!(order.shipping_address().is_none());
    }

    #[test]
    fn test_place_rejects_empty_and_zero_quantity() {
        let empty = Order::default().place(
            AggregateId::new(),
            PlaceOrder {
                buyer_id: UserId::new(),
                lines: vec![],
                shipping_address: None,
            },
        );
        assert!(matches!(empty, Err(OrderError::NoItems)));

        let zero = Order::default().place(
            AggregateId::new(),
            PlaceOrder {
                buyer_id: UserId::new(),
                lines: vec![line(ProductKind::Digital, 0, 10)],
                shipping_address: None,
            },
        );
        assert!(matches!(zero, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_place_detects_overflow() {
        let mut huge = line(ProductKind::Digital, u32::MAX, 0);
        huge.unit_price = Money::from_paise(i64::MAX / 2);
        let result = Order::default().place(
            AggregateId::new(),
            PlaceOrder {
                buyer_id: UserId::new(),
                lines: vec![huge],
                shipping_address: None,
            },
        );
        assert!(matches!(result, Err(OrderError::TotalOverflow)));
    }

    #[test]
    fn test_confirm_payment_is_idempotent() {
        let order = paid(vec![line(ProductKind::Physical, 1, 10)]);
        assert!(order.is_paid());
        assert!(
            order
                .confirm_payment(PaymentMethod::Direct, None)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_pure_digital_order_completes_on_payment() {
        let digital = line(ProductKind::Digital, 1, 99);
        let product_id = digital.product_id;
        let order = paid(vec![digital]);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Completed);
        assert!(order.is_unlocked(product_id));
    }

    #[test]
    fn test_mixed_order_unlocks_but_stays_pending() {
        let digital = line(ProductKind::Digital, 1, 99);
        let physical = line(ProductKind::Physical, 1, 500);
        let (digital_id, physical_id) = (digital.product_id, physical.product_id);
        let order = paid(vec![digital, physical]);
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Pending);
        assert!(order.is_unlocked(digital_id));
        assert!(!order.is_unlocked(physical_id));
    }

    #[test]
    fn test_status_walks_forward() {
        let mut order = paid(vec![line(ProductKind::Physical, 1, 10)]);
        let admin = UserId::new();
        for to in [
            FulfillmentStatus::Processing,
            FulfillmentStatus::Shipped,
            FulfillmentStatus::Completed,
        ] {
            let events = order.update_status(to, admin, None).unwrap();
            order.apply_events(events);
            assert_eq!(order.fulfillment_status(), to);
        }
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut order = paid(vec![line(ProductKind::Physical, 1, 10)]);
        let admin = UserId::new();
        for to in [FulfillmentStatus::Processing, FulfillmentStatus::Shipped] {
            let events = order.update_status(to, admin, None).unwrap();
            order.apply_events(events);
        }
        assert!(matches!(
            order.update_status(FulfillmentStatus::Pending, admin, None),
            Err(OrderError::InvalidTransition {
                from: FulfillmentStatus::Shipped,
                to: FulfillmentStatus::Pending
            })
        ));

        let events = order
            .update_status(FulfillmentStatus::Completed, admin, None)
            .unwrap();
        order.apply_events(events);
        assert!(matches!(
            order.update_status(FulfillmentStatus::Cancelled, admin, None),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_same_status_update_is_invalid() {
        let order = paid(vec![line(ProductKind::Physical, 1, 10)]);
        assert!(matches!(
            order.update_status(FulfillmentStatus::Pending, UserId::new(), None),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_records_origin() {
        let order = paid(vec![line(ProductKind::Physical, 1, 10)]);
        let events = order
            .update_status(
                FulfillmentStatus::Cancelled,
                UserId::new(),
                Some("buyer asked".to_string()),
            )
            .unwrap();
        assert!(matches!(
            &events[0],
            OrderEvent::OrderCancelled(data) if data.from == FulfillmentStatus::Pending
        ));
    }
}
