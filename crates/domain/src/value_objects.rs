//! Value objects shared across the marketplace aggregates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single settlement currency of the marketplace.
pub const CURRENCY: &str = "INR";

/// Identifier of a marketplace user (buyer, vendor, or admin).
///
/// Users live in the external auth system; the engine only stores references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Money amount in paise (1/100 rupee), avoiding floating point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn from_paise(paise: i64) -> Self {
        Self(paise)
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn paise(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies by a quantity, returning None on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    /// Adds another amount, returning None on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", abs / 100, abs % 100)
    }
}

/// Whether money has been collected for an order or commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a payment was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// No gateway was reachable; the order was accepted as paid.
    Direct,
    /// Captured by the payment gateway and signature-verified.
    Gateway,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Direct => "direct",
            PaymentMethod::Gateway => "gateway",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway identifiers recorded when a payment is captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReference {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_uses_rupees() {
        assert_eq!(Money::from_rupees(500).to_string(), "₹500.00");
        assert_eq!(Money::from_paise(12345).to_string(), "₹123.45");
        assert_eq!(Money::from_paise(-5).to_string(), "-₹0.05");
    }

    #[test]
    fn money_arithmetic_detects_overflow() {
        let price = Money::from_rupees(500);
        assert_eq!(price.checked_multiply(3), Some(Money::from_rupees(1500)));
        assert_eq!(Money::from_paise(i64::MAX).checked_multiply(2), None);
        assert_eq!(
            price.checked_add(Money::from_paise(1)),
            Some(Money::from_paise(50001))
        );
    }

    #[test]
    fn money_serializes_as_integer_paise() {
        let json = serde_json::to_string(&Money::from_rupees(2)).unwrap();
        assert_eq!(json, "200");
    }

    #[test]
    fn user_id_parses() {
        let id = UserId::new();
        assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
    }
}
