//! Commission state machine.

use serde::{Deserialize, Serialize};

use super::CommissionError;

/// The state of a commission in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Accepted ──► InProgress ──► Delivered ──► Completed
///    │  │         │
///    │  └─────────┴──► Cancelled
///    └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Waiting for the vendor to respond.
    #[default]
    Pending,
    Accepted,
    /// Declined by the vendor (terminal state).
    Rejected,
    InProgress,
    /// Files delivered, waiting for sign-off.
    Delivered,
    /// Signed off, escrow released (terminal state).
    Completed,
    /// Called off before work started (terminal state).
    Cancelled,
}

impl CommissionStatus {
    /// Returns true if `to` is an edge of the commission graph.
    pub fn can_transition_to(&self, to: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, to),
            (Pending, Accepted)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Accepted, InProgress)
                | (Accepted, Cancelled)
                | (InProgress, Delivered)
                | (Delivered, Completed)
        )
    }

    /// Returns true once work has been handed over.
    pub fn has_delivery(&self) -> bool {
        matches!(self, CommissionStatus::Delivered | CommissionStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommissionStatus::Rejected | CommissionStatus::Completed | CommissionStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Accepted => "accepted",
            CommissionStatus::Rejected => "rejected",
            CommissionStatus::InProgress => "in_progress",
            CommissionStatus::Delivered => "delivered",
            CommissionStatus::Completed => "completed",
            CommissionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CommissionStatus {
    type Err = CommissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "accepted" => Ok(CommissionStatus::Accepted),
            "rejected" => Ok(CommissionStatus::Rejected),
            "in_progress" => Ok(CommissionStatus::InProgress),
            "delivered" => Ok(CommissionStatus::Delivered),
            "completed" => Ok(CommissionStatus::Completed),
            "cancelled" => Ok(CommissionStatus::Cancelled),
            other => Err(CommissionError::UnknownStatus {
                status: other.to_string(),
            }),
        }
    }
}

/// Where the commission's money sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscrowState {
    /// Nothing collected yet.
    #[default]
    None,
    /// Paid by the customer, withheld from the vendor.
    Held,
    /// Released to the vendor on completion.
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;
    use CommissionStatus::*;

    #[test]
    fn test_commission_graph() {
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Accepted.can_transition_to(Cancelled));
        assert!(Delivered.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Rejected.can_transition_to(Accepted));
    }

    #[test]
    fn test_parse_round_trip() {
        assert_eq!("in_progress".parse::<CommissionStatus>().unwrap(), InProgress);
        assert_eq!(InProgress.to_string(), "in_progress");
        assert!("paused".parse::<CommissionStatus>().is_err());
    }
}
