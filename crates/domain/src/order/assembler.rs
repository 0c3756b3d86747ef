//! Builds order aggregates from priced lines.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderLineId, ProductId};

use crate::error::DomainError;
use crate::money::Money;

use super::model::{NewOrder, OrderLine};

/// A requested line with the catalog unit price captured at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl PricedLine {
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }
}

/// Assembles an unsaved order placed now.
///
/// Each line total is `quantity * unit_price` and the order total is the
/// sum of line totals, all in checked fixed-point arithmetic. Nothing is
/// persisted here.
pub fn assemble(customer_id: CustomerId, lines: &[PricedLine]) -> Result<NewOrder, DomainError> {
    assemble_at(customer_id, lines, Utc::now())
}

/// Same as [`assemble`] with an explicit placement timestamp.
pub fn assemble_at(
    customer_id: CustomerId,
    lines: &[PricedLine],
    placed_at: DateTime<Utc>,
) -> Result<NewOrder, DomainError> {
    let order_lines = lines
        .iter()
        .map(|line| {
            OrderLine::new(
                OrderLineId::new(),
                line.product_id,
                line.quantity,
                line.unit_price,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    NewOrder::new(customer_id, placed_at, order_lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;

    #[test]
    fn computes_line_and_order_totals() {
        let p1 = ProductId::new();
        let p2 = ProductId::new();
        let order = assemble(
            CustomerId::new(),
            &[
                PricedLine::new(p1, 3, Money::from_cents(500)),
                PricedLine::new(p2, 1, Money::from_cents(1200)),
            ],
        )
        .unwrap();

        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[0].product_id(), p1);
        assert_eq!(order.lines()[0].line_total(), Money::from_cents(1500));
        assert_eq!(order.lines()[1].line_total(), Money::from_cents(1200));
        assert_eq!(order.total(), Money::from_cents(2700));
        assert_eq!(order.total().to_string(), "27.00");
        assert_eq!(order.status(), OrderStatus::Created);
    }

    #[test]
    fn uses_given_placement_time() {
        let placed_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let order = assemble_at(
            CustomerId::new(),
            &[PricedLine::new(ProductId::new(), 1, Money::from_cents(100))],
            placed_at,
        )
        .unwrap();
        assert_eq!(order.placed_at(), placed_at);
    }

    #[test]
    fn assigns_distinct_line_ids() {
        let order = assemble(
            CustomerId::new(),
            &[
                PricedLine::new(ProductId::new(), 1, Money::from_cents(100)),
                PricedLine::new(ProductId::new(), 1, Money::from_cents(100)),
            ],
        )
        .unwrap();
        assert_ne!(order.lines()[0].id(), order.lines()[1].id());
    }

    #[test]
    fn rejects_empty_and_zero_quantity() {
        assert_eq!(
            assemble(CustomerId::new(), &[]).unwrap_err(),
            DomainError::EmptyOrder
        );
        let err = assemble(
            CustomerId::new(),
            &[PricedLine::new(ProductId::new(), 0, Money::from_cents(100))],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { .. }));
    }

    #[test]
    fn order_total_overflow_is_an_error() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        let err = assemble(
            CustomerId::new(),
            &[
                PricedLine::new(ProductId::new(), 1, huge),
                PricedLine::new(ProductId::new(), 1, huge),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::AmountOverflow {
                context: "order total"
            }
        );
    }
}
