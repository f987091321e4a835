//! Order fulfillment state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Where an order is in its fulfillment lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Completed
///    │            │             │
///    └────────────┴─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// Paid, not yet picked up by the vendor.
    #[default]
    Pending,

    /// Vendor is preparing the order.
    Processing,

    /// Handed to a carrier.
    Shipped,

    /// Delivered (terminal state).
    Completed,

    /// Cancelled (terminal state).
    Cancelled,
}

impl FulfillmentStatus {
    /// The single forward step from this status, if any.
    pub fn next(&self) -> Option<FulfillmentStatus> {
        match self {
            FulfillmentStatus::Pending => Some(FulfillmentStatus::Processing),
            FulfillmentStatus::Processing => Some(FulfillmentStatus::Shipped),
            FulfillmentStatus::Shipped => Some(FulfillmentStatus::Completed),
            FulfillmentStatus::Completed | FulfillmentStatus::Cancelled => None,
        }
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            FulfillmentStatus::Pending | FulfillmentStatus::Processing | FulfillmentStatus::Shipped
        )
    }

    /// Returns true if `to` is a legal next status. Same-status moves are not.
    pub fn can_transition_to(&self, to: FulfillmentStatus) -> bool {
        match to {
            FulfillmentStatus::Cancelled => self.can_cancel(),
            to => self.next() == Some(to),
        }
    }

    /// Returns true if cancelling from this status hands stock back.
    ///
    /// Shipped goods have left the warehouse, so their stock stays taken.
    pub fn returns_stock_on_cancel(&self) -> bool {
        matches!(
            self,
            FulfillmentStatus::Pending | FulfillmentStatus::Processing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FulfillmentStatus::Completed | FulfillmentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::Processing => "processing",
            FulfillmentStatus::Shipped => "shipped",
            FulfillmentStatus::Completed => "completed",
            FulfillmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FulfillmentStatus::Pending),
            "processing" => Ok(FulfillmentStatus::Processing),
            "shipped" => Ok(FulfillmentStatus::Shipped),
            "completed" => Ok(FulfillmentStatus::Completed),
            "cancelled" => Ok(FulfillmentStatus::Cancelled),
            other => Err(OrderError::UnknownStatus {
                status: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FulfillmentStatus::*;

    const ALL: [FulfillmentStatus; 5] = [Pending, Processing, Shipped, Completed, Cancelled];

    #[test]
    fn test_only_adjacent_forward_moves() {
        let legal = [
            (Pending, Processing),
            (Processing, Shipped),
            (Shipped, Completed),
            (Pending, Cancelled),
            (Processing, Cancelled),
            (Shipped, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Shipped.is_terminal());
        assert!(Completed.next().is_none());
    }

    #[test]
    fn test_stock_returns_before_shipping() {
        assert!(Pending.returns_stock_on_cancel());
        assert!(Processing.returns_stock_on_cancel());
        assert!(!Shipped.returns_stock_on_cancel());
    }

    #[test]
    fn test_parse_and_display() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<FulfillmentStatus>().unwrap(), status);
        }
        assert!(matches!(
            "lost".parse::<FulfillmentStatus>(),
            Err(OrderError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Shipped).unwrap(), "\"shipped\"");
    }
}
