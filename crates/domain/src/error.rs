//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A line requested zero units.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A unit price was negative.
    #[error("Invalid unit price for product {product_id}: {price_cents} cents")]
    InvalidPrice {
        product_id: ProductId,
        price_cents: i64,
    },

    /// An order was assembled without lines.
    #[error("Order has no lines")]
    EmptyOrder,

    /// A monetary computation overflowed.
    #[error("Monetary overflow while computing {context}")]
    AmountOverflow { context: &'static str },

    /// An audit entry would reference nothing.
    #[error("Audit entry must reference at least one order, user, or product")]
    InvalidAuditTarget,

    /// An order is not in a status that allows the requested action.
    #[error("Invalid status transition: cannot {action} an order in {current} status")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },
}
