//! Order fulfillment core.

use std::future::Future;
use std::time::Instant;

use common::{OrderId, ProductId, UserId};
use domain::audit::{ORDER_CANCELLED, ORDER_CONFIRMED, ORDER_CREATED};
use domain::{AuditEntry, AuditTarget, DomainError, NewOrder, Order, OrderStatus, assemble};
use serde::Serialize;
use storage::{AuditLog, CatalogStore, CustomerStore, OrderStore, StoreError};
use tracing::Instrument;

use crate::error::{FulfillmentError, ReservationError, Result};
use crate::recorder::{AuditRecorder, AuditStatus};
use crate::request::PlaceOrderRequest;
use crate::reservation::{Reservation, StockReservationService};
use crate::state::PlacementState;

/// An order after a committed change, with the outcome of its audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct OrderOutcome {
    pub order: Order,
    pub audit: AuditStatus,
}

/// The result of a successful placement.
pub type PlacedOrder = OrderOutcome;

fn enter(state: PlacementState) {
    tracing::debug!(%state, "Placement state");
}

/// Runs `fut` on its own task so that dropping the caller cannot stop it
/// part-way.
async fn run_detached<T, F>(fut: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(fut.instrument(tracing::Span::current()))
        .await
        .map_err(|e| FulfillmentError::Internal(format!("background task failed: {e}")))?
}

/// Places, confirms, and cancels orders.
///
/// Placement runs Validating → Reserving → Assembling → Committing →
/// Auditing → Done. A rejected reservation persists nothing. A failed commit
/// re-credits the reserved stock before `CommitFailed` is returned. A failed
/// audit append leaves the order committed and is reported on the result.
///
/// Once Committing starts the rest of the placement runs on a spawned task;
/// before that, dropping the future releases any reserved stock.
#[derive(Clone)]
pub struct OrderFulfillmentCore<C, U, O, A> {
    reservations: StockReservationService<C>,
    customers: U,
    orders: O,
    recorder: AuditRecorder<A>,
}

impl<C, U, O, A> OrderFulfillmentCore<C, U, O, A>
where
    C: CatalogStore + Clone + 'static,
    U: CustomerStore,
    O: OrderStore + Clone + 'static,
    A: AuditLog + Clone + 'static,
{
    /// Creates a new fulfillment core over the given stores.
    pub fn new(catalog: C, customers: U, orders: O, audit: A) -> Self {
        Self {
            reservations: StockReservationService::new(catalog),
            customers,
            orders,
            recorder: AuditRecorder::new(audit),
        }
    }

    /// Places an order for the requested lines at current catalog prices.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, lines = request.lines.len())
    )]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<PlacedOrder> {
        let start = Instant::now();
        let result = self.run_placement(request).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => metrics::counter!("orders_placed_total").increment(1),
            Err(FulfillmentError::Rejected(_)) => {
                metrics::counter!("orders_rejected_total").increment(1)
            }
            Err(FulfillmentError::CommitFailed(_)) => {
                metrics::counter!("orders_commit_failed_total").increment(1)
            }
            Err(_) => {}
        }

        result
    }

    async fn run_placement(&self, request: PlaceOrderRequest) -> Result<PlacedOrder> {
        enter(PlacementState::Validating);
        self.validate(&request).await?;

        enter(PlacementState::Reserving);
        let reservation = match self.reservations.reserve(&request.lines).await {
            Ok(reservation) => reservation,
            Err(e) => {
                let e = FulfillmentError::from(e);
                if let FulfillmentError::Rejected(lines) = &e {
                    enter(PlacementState::Rejected);
                    tracing::info!(failed_lines = lines.len(), "Order rejected");
                }
                return Err(e);
            }
        };

        enter(PlacementState::Assembling);
        let new_order = match assemble(request.customer_id, reservation.priced_lines()) {
            Ok(new_order) => new_order,
            Err(e) => {
                reservation.release().await?;
                return Err(e.into());
            }
        };

        enter(PlacementState::Committing);
        run_detached(commit_and_audit(
            self.orders.clone(),
            self.recorder.clone(),
            new_order,
            reservation,
            request.placed_by,
        ))
        .await
    }

    async fn validate(&self, request: &PlaceOrderRequest) -> Result<()> {
        if request.lines.is_empty() {
            return Err(FulfillmentError::InvalidRequest(
                "order must contain at least one line".to_string(),
            ));
        }
        if let Some(line) = request.lines.iter().find(|l| l.quantity == 0) {
            return Err(FulfillmentError::InvalidRequest(format!(
                "quantity for product {} must be greater than 0",
                line.product_id
            )));
        }
        if !self.customers.exists(request.customer_id).await? {
            return Err(FulfillmentError::InvalidRequest(format!(
                "customer {} does not exist",
                request.customer_id
            )));
        }
        Ok(())
    }

    /// Confirms a `Created` order.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_order(
        &self,
        order_id: OrderId,
        confirmed_by: Option<UserId>,
    ) -> Result<OrderOutcome> {
        let order = self
            .orders
            .transition_status(order_id, OrderStatus::CONFIRMABLE, OrderStatus::Confirmed)
            .await?;

        let audit = self
            .recorder
            .record_best_effort(
                ORDER_CONFIRMED,
                AuditTarget::order(order_id).with_user(confirmed_by),
            )
            .await;

        tracing::info!(%order_id, "Order confirmed");
        Ok(OrderOutcome { order, audit })
    }

    /// Cancels an order and puts its stock back.
    ///
    /// The status change is checked and applied atomically by the order
    /// store, so cancelling twice fails with `InvalidTransition` and stock is
    /// re-credited only once. If the stock cannot be re-credited the order is
    /// returned to its previous status and the store error is reported, so
    /// the cancellation can be retried. If it cannot be returned either, the
    /// cancel audit entry is still attempted and `CompensationFailed` is
    /// reported.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
        cancelled_by: Option<UserId>,
    ) -> Result<OrderOutcome> {
        let orders = self.orders.clone();
        let reservations = self.reservations.clone();
        let recorder = self.recorder.clone();
        let reason = reason.to_string();

        run_detached(async move {
            let (prior, order) = mark_cancelled(&orders, order_id).await?;
            let target = AuditTarget::order(order_id).with_user(cancelled_by);

            let lines: Vec<(ProductId, u32)> = order
                .lines()
                .iter()
                .map(|l| (l.product_id(), l.quantity()))
                .collect();
            let restock_failure = match reservations.restock(&lines).await {
                Ok(()) => None,
                Err(ReservationError::CompensationFailed(msg)) => {
                    tracing::error!(%order_id, error = %msg, "Stock partially re-credited for cancelled order");
                    Some(FulfillmentError::CompensationFailed(msg))
                }
                Err(e) => {
                    tracing::warn!(%order_id, error = %e, "Restock failed, reverting cancellation");
                    match orders
                        .transition_status(order_id, &[OrderStatus::Cancelled], prior)
                        .await
                    {
                        Ok(_) => return Err(e.into()),
                        Err(revert) => {
                            tracing::error!(%order_id, error = %revert, restock_error = %e, "Failed to revert cancellation");
                            Some(FulfillmentError::CompensationFailed(format!(
                                "{revert} (after restock failure: {e})"
                            )))
                        }
                    }
                }
            };

            // The cancellation stands from here on, restored stock or not.
            let audit = recorder.record_best_effort(ORDER_CANCELLED, target).await;
            if let Some(e) = restock_failure {
                return Err(e);
            }

            tracing::info!(%order_id, reason = %reason, "Order cancelled");
            Ok::<_, FulfillmentError>(OrderOutcome { order, audit })
        })
        .await
    }

    /// Loads an order with its lines.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    /// Returns the audit entries for an order, oldest first.
    pub async fn order_history(&self, order_id: OrderId) -> Result<Vec<AuditEntry>> {
        self.get_order(order_id).await?;
        Ok(self.recorder.history(order_id).await?)
    }
}

/// Moves a cancellable order to `Cancelled`, returning the status it left.
async fn mark_cancelled<O: OrderStore>(orders: &O, order_id: OrderId) -> Result<(OrderStatus, Order)> {
    loop {
        let prior = orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?
            .status();
        if !prior.can_cancel() {
            return Err(FulfillmentError::InvalidTransition {
                current: prior,
                action: OrderStatus::Cancelled.verb(),
            });
        }

        match orders
            .transition_status(order_id, &[prior], OrderStatus::Cancelled)
            .await
        {
            Ok(order) => return Ok((prior, order)),
            // Confirmed in between; cancel from there.
            Err(StoreError::Domain(DomainError::InvalidTransition { current, .. }))
                if current.can_cancel() => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Saves the order, settles the reservation, and appends the audit entry.
async fn commit_and_audit<C, O, A>(
    orders: O,
    recorder: AuditRecorder<A>,
    new_order: NewOrder,
    reservation: Reservation<C>,
    placed_by: Option<UserId>,
) -> Result<PlacedOrder>
where
    C: CatalogStore + Clone + 'static,
    O: OrderStore,
    A: AuditLog,
{
    let order = match orders.save_order(new_order).await {
        Ok(order) => order,
        Err(e) => {
            enter(PlacementState::CommitFailed);
            tracing::warn!(error = %e, "Order commit failed, releasing reserved stock");
            return match reservation.release().await {
                Ok(()) => {
                    enter(PlacementState::RolledBack);
                    Err(FulfillmentError::CommitFailed(e))
                }
                Err(compensation) => {
                    tracing::error!(
                        error = %compensation,
                        commit_error = %e,
                        "Failed to restore stock after commit failure"
                    );
                    Err(FulfillmentError::CompensationFailed(format!(
                        "{compensation} (after commit failure: {e})"
                    )))
                }
            };
        }
    };

    let low_stock = reservation.low_stock().to_vec();
    reservation.commit();
    for product_id in low_stock {
        tracing::warn!(%product_id, "Product at or below minimum stock");
    }

    enter(PlacementState::Auditing);
    let audit = recorder
        .record_best_effort(
            ORDER_CREATED,
            AuditTarget::order(order.id()).with_user(placed_by),
        )
        .await;

    enter(PlacementState::Done);
    tracing::info!(
        order_id = %order.id(),
        total = %order.total(),
        units = order.unit_count(),
        "Order placed"
    );
    Ok(PlacedOrder { order, audit })
}
