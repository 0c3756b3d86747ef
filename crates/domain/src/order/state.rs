//! Order status machine.

use serde::{Deserialize, Serialize};

/// The status of a placed order.
///
/// State transitions:
/// ```text
/// Created ──► Confirmed
///    │            │
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order was placed and its stock reserved.
    #[default]
    Created,

    /// Order was confirmed by the back office.
    Confirmed,

    /// Order was cancelled and its stock re-credited (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Statuses from which an order may be confirmed.
    pub const CONFIRMABLE: &'static [OrderStatus] = &[OrderStatus::Created];

    /// Statuses from which an order may be cancelled.
    pub const CANCELLABLE: &'static [OrderStatus] = &[OrderStatus::Created, OrderStatus::Confirmed];

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }

    /// Verb describing a transition into this status, used in error messages.
    pub fn verb(&self) -> &'static str {
        match self {
            OrderStatus::Created => "reopen",
            OrderStatus::Confirmed => "confirm",
            OrderStatus::Cancelled => "cancel",
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(OrderStatus::Created),
            "Confirmed" => Ok(OrderStatus::Confirmed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_created() {
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn test_can_cancel_from_non_terminal_statuses() {
        assert!(OrderStatus::Created.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_display_and_parse_agree() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Confirmed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }
}
