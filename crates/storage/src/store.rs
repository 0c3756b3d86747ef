use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId, SupplierId};
use domain::{AuditEntry, Customer, NewOrder, Order, OrderStatus, Product, Supplier};

use crate::Result;

/// Products, suppliers, and stock levels.
///
/// `adjust_stock` is the only way stock changes. Implementations apply the
/// delta atomically and refuse any adjustment that would take stock below
/// zero, so a decrement is a compare-and-decrement even without outside
/// locking.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Stores a new supplier.
    async fn insert_supplier(&self, supplier: Supplier) -> Result<()>;

    /// Loads a supplier, returning None if it doesn't exist.
    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>>;

    /// Stores a new product.
    async fn insert_product(&self, product: Product) -> Result<()>;

    /// Loads a product, returning None if it doesn't exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Returns the current stock of a product.
    ///
    /// Fails with `NotFound` if the product doesn't exist.
    async fn get_stock(&self, id: ProductId) -> Result<u32>;

    /// Adds `delta` to a product's stock and returns the new level.
    ///
    /// A negative delta reserves stock, a positive one re-credits it. Fails
    /// with `NotFound` for an unknown product and `StockUnderflow` if the
    /// result would be negative; in both cases nothing changes.
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<u32>;
}

/// Customer records.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Stores a new customer.
    async fn insert_customer(&self, customer: Customer) -> Result<()>;

    /// Loads a customer, returning None if it doesn't exist.
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Checks whether a customer exists.
    async fn exists(&self, id: CustomerId) -> Result<bool> {
        Ok(self.get_customer(id).await?.is_some())
    }
}

/// Order aggregates.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order header and all of its lines as one unit and
    /// returns the order with its assigned identity.
    ///
    /// Either everything is stored or nothing is.
    async fn save_order(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order with its lines, returning None if it doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Moves an order to `to` if its current status is one of `from`.
    ///
    /// The check and the update are atomic, so of two concurrent callers
    /// making the same transition only one succeeds. Returns the updated
    /// order.
    async fn transition_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order>;
}

/// The append-only audit ledger.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends an entry. Entries are never updated or removed.
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Returns every entry referencing the given order, oldest first.
    async fn entries_for_order(&self, id: OrderId) -> Result<Vec<AuditEntry>>;
}
