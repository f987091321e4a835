//! Who may see orders and commissions, and who may download what.
//!
//! Every check fails closed. "Not yours" and "does not exist" are distinct
//! errors here but are meant to look the same to callers.

use common::AggregateId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::Aggregate as _;
use crate::commission::{Commission, CommissionParty};
use crate::order::Order;
use crate::value_objects::UserId;

/// Marketplace role asserted by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Vendor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,
}

/// Only the buyer or an admin may view an order.
pub fn authorize_order_access(order: &Order, requester: &Requester) -> Result<(), AccessDenied> {
    if order.id().is_none() {
        return Err(AccessDenied::NotFound);
    }
    if requester.is_admin() || order.buyer_id() == Some(requester.user_id) {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden)
    }
}

/// Returns the asset url when every download condition holds.
///
/// The requester must be the buyer, the product a digital line of the order,
/// and the order paid with that line unlocked.
pub fn authorize_download<'a>(
    order: &'a Order,
    product_id: AggregateId,
    requester: &Requester,
) -> Result<&'a str, AccessDenied> {
    if order.id().is_none() {
        return Err(AccessDenied::NotFound);
    }
    if order.buyer_id() != Some(requester.user_id) {
        return Err(AccessDenied::Forbidden);
    }
    let line = order.line(product_id).ok_or(AccessDenied::Forbidden)?;
    if !line.is_digital() || !order.is_paid() || !order.is_unlocked(product_id) {
        return Err(AccessDenied::Forbidden);
    }
    line.asset_url.as_deref().ok_or(AccessDenied::Forbidden)
}

/// Resolves the requester's party on a commission: customer, vendor or admin.
pub fn authorize_commission_access(
    commission: &Commission,
    requester: &Requester,
) -> Result<CommissionParty, AccessDenied> {
    if commission.id().is_none() {
        return Err(AccessDenied::NotFound);
    }
    commission
        .party_of(requester.user_id, requester.is_admin())
        .ok_or(AccessDenied::Forbidden)
}

/// Admins and vendors selling one of the order's lines may move fulfillment.
pub fn authorize_fulfillment_update(
    order: &Order,
    requester: &Requester,
) -> Result<(), AccessDenied> {
    if order.id().is_none() {
        return Err(AccessDenied::NotFound);
    }
    let allowed = match requester.role {
        Role::Admin => true,
        Role::Vendor => order.involves_vendor(requester.user_id),
        Role::Customer => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(AccessDenied::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::aggregate::Aggregate;
    use crate::catalog::ProductKind;
    use crate::order::{LineItem, PlaceOrder};
    use crate::value_objects::{Money, PaymentMethod};

    struct Purchase {
        order: Order,
        buyer: Requester,
        vendor: UserId,
        digital_id: AggregateId,
        physical_id: AggregateId,
    }

    fn line(kind: ProductKind, vendor_id: UserId) -> LineItem {
        LineItem {
            product_id: AggregateId::new(),
            name: kind.to_string(),
            vendor_id,
            kind,
            quantity: 1,
            unit_price: Money::from_rupees(100),
            options: BTreeMap::new(),
            asset_url: (kind == ProductKind::Digital)
                .then(|| "https://cdn.example/asset.zip".to_string()),
        }
    }

    fn purchase(paid: bool) -> Purchase {
        let buyer = Requester::new(UserId::new(), Role::Customer);
        let vendor = UserId::new();
        let digital = line(ProductKind::Digital, vendor);
        let physical = line(ProductKind::Physical, vendor);
        let (digital_id, physical_id) = (digital.product_id, physical.product_id);

        let mut order = Order::default();
        let events = order
            .place(
                AggregateId::new(),
                PlaceOrder {
                    buyer_id: buyer.user_id,
                    lines: vec![digital, physical],
                    shipping_address: Some(crate::order::ShippingAddress {
                        street: "1 Residency Road".to_string(),
                        city: "Bengaluru".to_string(),
                        phone: "080 0000 0000".to_string(),
                    }),
                },
            )
            .unwrap();
        order.apply_events(events);
        if paid {
            let events = order.confirm_payment(PaymentMethod::Direct, None).unwrap();
            order.apply_events(events);
        }
        Purchase {
            order,
            buyer,
            vendor,
            digital_id,
            physical_id,
        }
    }

    #[test]
    fn buyer_downloads_paid_digital_line() {
        let p = purchase(true);
        assert_eq!(
            authorize_download(&p.order, p.digital_id, &p.buyer),
            Ok("https://cdn.example/asset.zip")
        );
    }

    #[test]
    fn download_fails_closed() {
        let p = purchase(true);
        let stranger = Requester::new(UserId::new(), Role::Customer);
        let admin = Requester::new(UserId::new(), Role::Admin);

        assert_eq!(
            authorize_download(&p.order, p.digital_id, &stranger),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize_download(&p.order, p.digital_id, &admin),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize_download(&p.order, p.physical_id, &p.buyer),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize_download(&p.order, AggregateId::new(), &p.buyer),
            Err(AccessDenied::Forbidden)
        );

        let unpaid = purchase(false);
        assert_eq!(
            authorize_download(&unpaid.order, unpaid.digital_id, &unpaid.buyer),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn order_visible_to_buyer_and_admin_only() {
        let p = purchase(true);
        assert!(authorize_order_access(&p.order, &p.buyer).is_ok());
        assert!(
            authorize_order_access(&p.order, &Requester::new(UserId::new(), Role::Admin)).is_ok()
        );
        assert_eq!(
            authorize_order_access(&p.order, &Requester::new(p.vendor, Role::Vendor)),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize_order_access(&Order::default(), &p.buyer),
            Err(AccessDenied::NotFound)
        );
    }

    #[test]
    fn fulfillment_updates_by_owning_vendor_or_admin() {
        let p = purchase(true);
        assert!(authorize_fulfillment_update(&p.order, &Requester::new(p.vendor, Role::Vendor)).is_ok());
        assert_eq!(
            authorize_fulfillment_update(&p.order, &Requester::new(UserId::new(), Role::Vendor)),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize_fulfillment_update(&p.order, &p.buyer),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn role_parses() {
        assert_eq!("vendor".parse::<Role>(), Ok(Role::Vendor));
        assert!("root".parse::<Role>().is_err());
    }
}
