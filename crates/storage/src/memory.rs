use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId, SupplierId};
use domain::{AuditEntry, Customer, NewOrder, Order, OrderStatus, Product, Supplier};
use tokio::sync::RwLock;

use crate::{
    AuditLog, CatalogStore, CustomerStore, OrderStore, Result, StoreError,
};

/// Switches for simulating storage failures in tests.
#[derive(Debug, Default)]
struct Faults {
    fail_on_save_order: AtomicBool,
    fail_on_audit_append: AtomicBool,
}

/// In-memory implementation of every store contract.
///
/// Cloning is cheap and clones share the same data, so one instance can be
/// handed to the fulfillment core as catalog, customer, order and audit
/// store at once.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    suppliers: Arc<RwLock<HashMap<SupplierId, Supplier>>>,
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    audit: Arc<RwLock<Vec<AuditEntry>>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save_order` fail with `Unavailable`.
    pub fn set_fail_on_save_order(&self, fail: bool) {
        self.faults.fail_on_save_order.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent audit `append` fail with `Unavailable`.
    pub fn set_fail_on_audit_append(&self, fail: bool) {
        self.faults.fail_on_audit_append.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the whole audit ledger in append order.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }
}

/// Applies a signed delta to a stock level without leaving the `u32` range.
fn apply_delta(product_id: ProductId, stock: u32, delta: i64) -> Result<u32> {
    let next = i64::from(stock) + delta;
    if next < 0 {
        return Err(StoreError::StockUnderflow {
            product_id,
            available: stock,
            requested: delta.unsigned_abs(),
        });
    }
    u32::try_from(next).map_err(|_| StoreError::StockOverflow {
        product_id,
        stock,
        delta,
    })
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_supplier(&self, supplier: Supplier) -> Result<()> {
        let mut suppliers = self.suppliers.write().await;
        if suppliers.contains_key(&supplier.id) {
            return Err(StoreError::conflict("supplier", supplier.id));
        }
        suppliers.insert(supplier.id, supplier);
        Ok(())
    }

    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>> {
        Ok(self.suppliers.read().await.get(&id).cloned())
    }

    async fn insert_product(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(StoreError::conflict("product", product.id));
        }
        products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn get_stock(&self, id: ProductId) -> Result<u32> {
        self.products
            .read()
            .await
            .get(&id)
            .map(|p| p.stock)
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<u32> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("product", id))?;

        product.stock = apply_delta(id, product.stock, delta)?;
        Ok(product.stock)
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn insert_customer(&self, customer: Customer) -> Result<()> {
        let mut customers = self.customers.write().await;
        if customers.contains_key(&customer.id) {
            return Err(StoreError::conflict("customer", customer.id));
        }
        customers.insert(customer.id, customer);
        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(&id).cloned())
    }

    async fn exists(&self, id: CustomerId) -> Result<bool> {
        Ok(self.customers.read().await.contains_key(&id))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn save_order(&self, order: NewOrder) -> Result<Order> {
        if self.faults.fail_on_save_order.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "order store rejected the write".to_string(),
            ));
        }

        let order = order.into_order(OrderId::new());
        self.orders.write().await.insert(order.id(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;

        order.transition(from, to, to.verb())?;
        Ok(order.clone())
    }
}

#[async_trait]
impl AuditLog for InMemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        if self.faults.fail_on_audit_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "audit log rejected the write".to_string(),
            ));
        }

        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn entries_for_order(&self, id: OrderId) -> Result<Vec<AuditEntry>> {
        Ok(self
            .audit
            .read()
            .await
            .iter()
            .filter(|e| e.concerns_order(id))
            .cloned()
            .collect())
    }
}
