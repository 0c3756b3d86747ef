//! Stock reservation.
//!
//! A reservation validates every requested line against current stock and
//! then decrements all of them, as one unit: either every line is debited or
//! none is. Reservations touching the same product are serialized through a
//! per-product async lock, taken in ascending [`ProductId`] order so that two
//! multi-line orders can never deadlock. The store's `adjust_stock` refuses
//! to go below zero on its own, so stock cannot be oversold even by a writer
//! that bypasses these locks.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, MutexGuard, PoisonError};

use common::ProductId;
use domain::{PricedLine, Product};
use storage::{CatalogStore, StoreError};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{LineFailure, LineFailureReason, ReservationError};
use crate::request::RequestedLine;

/// One async lock per product, created on first use and dropped once no
/// reservation holds or awaits it.
#[derive(Debug, Default)]
struct ProductLocks {
    locks: std::sync::Mutex<HashMap<ProductId, Arc<Mutex<()>>>>,
}

impl ProductLocks {
    fn table(&self) -> MutexGuard<'_, HashMap<ProductId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the given products. `ids` must be in ascending order.
    async fn acquire(self: &Arc<Self>, ids: impl IntoIterator<Item = ProductId>) -> HeldLocks {
        let handles: Vec<(ProductId, Arc<Mutex<()>>)> = {
            let mut locks = self.table();
            ids.into_iter()
                .map(|id| (id, Arc::clone(locks.entry(id).or_default())))
                .collect()
        };

        let mut held = HeldLocks {
            owner: Arc::clone(self),
            ids: handles.iter().map(|(id, _)| *id).collect(),
            guards: Vec::with_capacity(handles.len()),
        };
        for (_, handle) in handles {
            held.guards.push(handle.lock_owned().await);
        }
        held
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table().len()
    }

    #[cfg(test)]
    fn holders(&self, id: ProductId) -> usize {
        self.table().get(&id).map_or(0, Arc::strong_count)
    }
}

/// Product locks held by one caller. Unused table entries are removed on drop.
struct HeldLocks {
    owner: Arc<ProductLocks>,
    ids: Vec<ProductId>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        self.guards.clear();
        let mut locks = self.owner.table();
        for id in &self.ids {
            // The table's own reference is the last one.
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
    }
}

/// Validates and decrements stock for order lines.
#[derive(Clone)]
pub struct StockReservationService<C> {
    catalog: C,
    locks: Arc<ProductLocks>,
}

impl<C> StockReservationService<C>
where
    C: CatalogStore + Clone + 'static,
{
    /// Creates a new reservation service over the given catalog.
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            locks: Arc::new(ProductLocks::default()),
        }
    }

    /// Reserves stock for every line.
    ///
    /// Lines naming the same product are summed before they are checked.
    /// Every failing product is reported, in the order it first appears in
    /// `lines`. On success the returned [`Reservation`] holds the debited
    /// quantities and the unit prices read under the lock.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(
        &self,
        lines: &[RequestedLine],
    ) -> Result<Reservation<C>, ReservationError> {
        let mut totals: BTreeMap<ProductId, u64> = BTreeMap::new();
        let mut first_seen = Vec::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(ReservationError::InvalidQuantity {
                    product_id: line.product_id,
                });
            }
            let total = totals.entry(line.product_id).or_insert_with(|| {
                first_seen.push(line.product_id);
                0
            });
            *total += u64::from(line.quantity);
        }

        let _guards = self.locks.acquire(totals.keys().copied()).await;

        let mut products: HashMap<ProductId, Product> = HashMap::with_capacity(totals.len());
        let mut failures = Vec::new();
        for &product_id in &first_seen {
            let requested = totals[&product_id];
            match self.catalog.get_product(product_id).await? {
                None => failures.push(LineFailure::new(product_id, LineFailureReason::NotFound)),
                Some(product) if !product.active => {
                    failures.push(LineFailure::new(product_id, LineFailureReason::Inactive))
                }
                Some(product) if requested > u64::from(product.stock) => {
                    failures.push(LineFailure::new(
                        product_id,
                        LineFailureReason::InsufficientStock {
                            available: product.stock,
                            requested,
                        },
                    ))
                }
                Some(product) => {
                    products.insert(product_id, product);
                }
            }
        }

        if !failures.is_empty() {
            metrics::counter!("stock_reservations_total", "outcome" => "rejected").increment(1);
            tracing::info!(failed_lines = failures.len(), "Reservation rejected");
            return Err(ReservationError::Rejected(failures));
        }

        let priced = lines
            .iter()
            .map(|l| PricedLine::new(l.product_id, l.quantity, products[&l.product_id].price))
            .collect();
        let mut reservation = Reservation::new(self.catalog.clone(), priced);

        for (&product_id, &requested) in &totals {
            // Bounded by the stock checked above.
            let quantity = requested as u32;
            match self
                .catalog
                .adjust_stock(product_id, -i64::from(quantity))
                .await
            {
                Ok(remaining) => {
                    reservation.held.push((product_id, quantity));
                    if remaining <= products[&product_id].min_stock {
                        reservation.low_stock.push(product_id);
                    }
                }
                Err(e) => {
                    tracing::warn!(%product_id, error = %e, "Stock decrement failed, releasing partial reservation");
                    reservation.release().await?;
                    metrics::counter!("stock_reservations_total", "outcome" => "failed")
                        .increment(1);
                    return Err(match e {
                        StoreError::StockUnderflow {
                            available,
                            requested,
                            ..
                        } => ReservationError::Rejected(vec![LineFailure::new(
                            product_id,
                            LineFailureReason::InsufficientStock {
                                available,
                                requested,
                            },
                        )]),
                        other => ReservationError::Store(other),
                    });
                }
            }
        }

        metrics::counter!("stock_reservations_total", "outcome" => "reserved").increment(1);
        tracing::debug!(products = totals.len(), "Stock reserved");
        Ok(reservation)
    }

    /// Puts stock back, e.g. for the lines of a cancelled order.
    ///
    /// All or nothing: if a credit fails, the lines already credited are
    /// debited again before the store error is returned.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn restock(&self, lines: &[(ProductId, u32)]) -> Result<(), ReservationError> {
        let ids: std::collections::BTreeSet<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        let _guards = self.locks.acquire(ids).await;

        for (done, &(product_id, quantity)) in lines.iter().enumerate() {
            if let Err(e) = self
                .catalog
                .adjust_stock(product_id, i64::from(quantity))
                .await
            {
                tracing::warn!(%product_id, quantity, error = %e, "Restock failed, undoing credited lines");
                let failures = debit_all(&self.catalog, &lines[..done]).await;
                if !failures.is_empty() {
                    return Err(ReservationError::CompensationFailed(failures.join("; ")));
                }
                return Err(ReservationError::Store(e));
            }
        }
        Ok(())
    }
}

/// Debits every entry again, returning a description of each failure.
async fn debit_all<C: CatalogStore>(catalog: &C, credited: &[(ProductId, u32)]) -> Vec<String> {
    let mut failures = Vec::new();
    for &(product_id, quantity) in credited {
        if let Err(e) = catalog.adjust_stock(product_id, -i64::from(quantity)).await {
            tracing::error!(%product_id, quantity, error = %e, "Failed to undo restock");
            failures.push(format!("{product_id}: {e}"));
        }
    }
    failures
}

/// Credits every entry back, returning a description of each failure.
async fn credit_all<C: CatalogStore>(catalog: &C, held: &[(ProductId, u32)]) -> Vec<String> {
    let mut failures = Vec::new();
    for &(product_id, quantity) in held {
        if let Err(e) = catalog.adjust_stock(product_id, i64::from(quantity)).await {
            tracing::error!(%product_id, quantity, error = %e, "Failed to re-credit stock");
            failures.push(format!("{product_id}: {e}"));
        }
    }
    failures
}

/// Stock debited for an order that is not yet committed.
///
/// Settle it with [`commit`](Self::commit) once the order is saved, or
/// [`release`](Self::release) to put the stock back. A reservation dropped
/// without being settled re-credits its stock from a spawned task.
pub struct Reservation<C: CatalogStore + Clone + 'static> {
    catalog: C,
    lines: Vec<PricedLine>,
    held: Vec<(ProductId, u32)>,
    low_stock: Vec<ProductId>,
}

impl<C: CatalogStore + Clone + 'static> Reservation<C> {
    fn new(catalog: C, lines: Vec<PricedLine>) -> Self {
        Self {
            catalog,
            lines,
            held: Vec::new(),
            low_stock: Vec::new(),
        }
    }

    /// The requested lines, priced from the catalog under the lock.
    pub fn priced_lines(&self) -> &[PricedLine] {
        &self.lines
    }

    /// Debited quantity per product.
    pub fn held(&self) -> &[(ProductId, u32)] {
        &self.held
    }

    /// Products left at or below their minimum stock by this reservation.
    pub fn low_stock(&self) -> &[ProductId] {
        &self.low_stock
    }

    /// Keeps the stock debited.
    pub fn commit(mut self) {
        self.held.clear();
    }

    /// Re-credits all debited stock.
    pub async fn release(mut self) -> Result<(), ReservationError> {
        let mut failures = Vec::new();
        // Entries leave `held` only once handled, so a drop part-way
        // through still re-credits the rest.
        while let Some(&(product_id, quantity)) = self.held.last() {
            if let Err(e) = self
                .catalog
                .adjust_stock(product_id, i64::from(quantity))
                .await
            {
                tracing::error!(%product_id, quantity, error = %e, "Failed to re-credit stock");
                failures.push(format!("{product_id}: {e}"));
            }
            self.held.pop();
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReservationError::CompensationFailed(failures.join("; ")))
        }
    }
}

impl<C: CatalogStore + Clone + 'static> fmt::Debug for Reservation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("lines", &self.lines)
            .field("held", &self.held)
            .field("low_stock", &self.low_stock)
            .finish_non_exhaustive()
    }
}

impl<C: CatalogStore + Clone + 'static> Drop for Reservation<C> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }

        let held = std::mem::take(&mut self.held);
        let catalog = self.catalog.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(products = held.len(), "Reservation dropped unsettled, re-crediting stock");
                handle.spawn(async move {
                    credit_all(&catalog, &held).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    products = held.len(),
                    "Reservation dropped outside a runtime, stock was not re-credited"
                );
            }
        }
    }
}
