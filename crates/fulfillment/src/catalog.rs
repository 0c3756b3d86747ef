//! Registration of suppliers, products, and customers.

use common::{CustomerId, ProductId, SupplierId, UserId};
use domain::audit::PRODUCT_ADDED;
use domain::{AuditTarget, Customer, NewCustomer, NewProduct, NewSupplier, Product, Supplier};
use storage::{AuditLog, CatalogStore, CustomerStore};

use crate::error::{FulfillmentError, Result};
use crate::recorder::AuditRecorder;

/// Adds records to the catalog and customer stores.
#[derive(Clone)]
pub struct CatalogService<C, U, A> {
    catalog: C,
    customers: U,
    recorder: AuditRecorder<A>,
}

impl<C, U, A> CatalogService<C, U, A>
where
    C: CatalogStore,
    U: CustomerStore,
    A: AuditLog,
{
    pub fn new(catalog: C, customers: U, audit: A) -> Self {
        Self {
            catalog,
            customers,
            recorder: AuditRecorder::new(audit),
        }
    }

    #[tracing::instrument(skip_all, fields(name = %supplier.name))]
    pub async fn register_supplier(&self, supplier: NewSupplier) -> Result<Supplier> {
        let supplier = supplier.into_supplier(SupplierId::new());
        self.catalog.insert_supplier(supplier.clone()).await?;

        tracing::info!(supplier_id = %supplier.id, "Supplier registered");
        Ok(supplier)
    }

    /// Adds a product under an existing supplier and records "Product Added".
    ///
    /// The audit entry is best-effort: if it cannot be written the product
    /// stays registered and a warning is logged.
    #[tracing::instrument(skip_all, fields(name = %product.name, supplier_id = %product.supplier_id))]
    pub async fn register_product(
        &self,
        product: NewProduct,
        added_by: Option<UserId>,
    ) -> Result<Product> {
        if product.price.is_negative() {
            return Err(FulfillmentError::InvalidRequest(format!(
                "price must not be negative, got {}",
                product.price
            )));
        }
        if self.catalog.get_supplier(product.supplier_id).await?.is_none() {
            return Err(FulfillmentError::InvalidRequest(format!(
                "supplier {} does not exist",
                product.supplier_id
            )));
        }

        let product = product.into_product(ProductId::new());
        self.catalog.insert_product(product.clone()).await?;

        self.recorder
            .record_best_effort(
                PRODUCT_ADDED,
                AuditTarget::product(product.id).with_user(added_by),
            )
            .await;

        tracing::info!(product_id = %product.id, stock = product.stock, "Product registered");
        Ok(product)
    }

    #[tracing::instrument(skip_all, fields(name = %customer.name))]
    pub async fn register_customer(&self, customer: NewCustomer) -> Result<Customer> {
        let customer = customer.into_customer(CustomerId::new());
        self.customers.insert_customer(customer.clone()).await?;

        tracing::info!(customer_id = %customer.id, "Customer registered");
        Ok(customer)
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })
    }

    /// Returns true if the product's stock is at or below its minimum.
    pub async fn is_low_on_stock(&self, product_id: ProductId) -> Result<bool> {
        Ok(self.get_product(product_id).await?.is_low_on_stock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;
    use storage::InMemoryStore;

    fn service(store: &InMemoryStore) -> CatalogService<InMemoryStore, InMemoryStore, InMemoryStore> {
        CatalogService::new(store.clone(), store.clone(), store.clone())
    }

    fn new_supplier() -> NewSupplier {
        NewSupplier {
            name: "Acme".to_string(),
            contact_name: "Jo".to_string(),
            phone: "555-0100".to_string(),
            email: "jo@acme.test".to_string(),
            address: "1 Main St".to_string(),
            tax_id: "12.345.678/0001-90".to_string(),
        }
    }

    fn new_product(supplier_id: SupplierId) -> NewProduct {
        NewProduct {
            supplier_id,
            name: "Widget".to_string(),
            description: None,
            price: Money::from_cents(500),
            initial_stock: 3,
            min_stock: 5,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_register_product_records_audit_entry() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let supplier = service.register_supplier(new_supplier()).await.unwrap();

        let product = service
            .register_product(new_product(supplier.id), None)
            .await
            .unwrap();

        let entries = store.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, PRODUCT_ADDED);
        assert_eq!(entries[0].target.product_id(), Some(product.id));
        assert_eq!(service.get_product(product.id).await.unwrap(), product);
        assert!(service.is_low_on_stock(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_product_requires_supplier() {
        let store = InMemoryStore::new();
        let err = service(&store)
            .register_product(new_product(SupplierId::new()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::InvalidRequest(_)));
        assert!(store.audit_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_product_stays_registered_when_audit_fails() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let supplier = service.register_supplier(new_supplier()).await.unwrap();
        store.set_fail_on_audit_append(true);

        let product = service
            .register_product(new_product(supplier.id), Some(UserId::new()))
            .await
            .unwrap();
        assert!(store.get_product(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_customer() {
        let store = InMemoryStore::new();
        let customer = service(&store)
            .register_customer(NewCustomer {
                name: "Ada".to_string(),
                email: "ada@example.test".to_string(),
                phone: String::new(),
                address: String::new(),
            })
            .await
            .unwrap();
        assert!(store.exists(customer.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_product_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            service(&store).get_product(ProductId::new()).await,
            Err(FulfillmentError::NotFound { entity: "product", .. })
        ));
    }
}
