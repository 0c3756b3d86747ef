//! The order aggregate and its line items.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, OrderLineId, ProductId};
use serde::Serialize;

use crate::error::DomainError;
use crate::money::Money;

use super::OrderStatus;

/// A single product/quantity/price entry within an order.
///
/// The line total is computed on construction from the quantity and the
/// captured unit price and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    id: OrderLineId,
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    line_total: Money,
}

impl OrderLine {
    /// Creates a line, computing its total.
    pub fn new(
        id: OrderLineId,
        product_id: ProductId,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        if unit_price.is_negative() {
            return Err(DomainError::InvalidPrice {
                product_id,
                price_cents: unit_price.cents(),
            });
        }
        let line_total = unit_price
            .checked_mul(quantity)
            .ok_or(DomainError::AmountOverflow {
                context: "line total",
            })?;

        Ok(Self {
            id,
            product_id,
            quantity,
            unit_price,
            line_total,
        })
    }

    pub fn id(&self) -> OrderLineId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price captured when the order was placed.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// `quantity * unit_price`.
    pub fn line_total(&self) -> Money {
        self.line_total
    }
}

fn sum_lines(lines: &[OrderLine]) -> Result<Money, DomainError> {
    Money::checked_sum(lines.iter().map(OrderLine::line_total)).ok_or(
        DomainError::AmountOverflow {
            context: "order total",
        },
    )
}

/// An order that has been assembled but not yet saved.
///
/// It has no identity yet; the order store assigns one when it persists the
/// header and all lines together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    customer_id: CustomerId,
    placed_at: DateTime<Utc>,
    lines: Vec<OrderLine>,
    total: Money,
}

impl NewOrder {
    /// Creates an unsaved order, computing the total from the lines.
    pub fn new(
        customer_id: CustomerId,
        placed_at: DateTime<Utc>,
        lines: Vec<OrderLine>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        let total = sum_lines(&lines)?;
        Ok(Self {
            customer_id,
            placed_at,
            lines,
            total,
        })
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// New orders always start out `Created`.
    pub fn status(&self) -> OrderStatus {
        OrderStatus::Created
    }

    /// Attaches the identity assigned by the store.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            placed_at: self.placed_at,
            status: OrderStatus::Created,
            lines: self.lines,
            total: self.total,
        }
    }
}

/// A persisted order. Owns its line items exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    placed_at: DateTime<Utc>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
}

impl Order {
    /// Rebuilds an order from stored parts, recomputing the total.
    pub fn from_parts(
        id: OrderId,
        customer_id: CustomerId,
        placed_at: DateTime<Utc>,
        status: OrderStatus,
        lines: Vec<OrderLine>,
    ) -> Result<Self, DomainError> {
        let total = sum_lines(&lines)?;
        Ok(Self {
            id,
            customer_id,
            placed_at,
            status,
            lines,
            total,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Moves the order to `to` if the current status is one of `from`.
    pub fn transition(
        &mut self,
        from: &[OrderStatus],
        to: OrderStatus,
        action: &'static str,
    ) -> Result<(), DomainError> {
        if !from.contains(&self.status) {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                action,
            });
        }
        self.status = to;
        Ok(())
    }
}
