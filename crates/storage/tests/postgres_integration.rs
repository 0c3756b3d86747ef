//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker, so they are
//! ignored by default. Run with:
//!
//! ```bash
//! cargo test -p storage --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use domain::{
    AuditEntry, AuditTarget, Customer, CustomerId, DomainError, Money, OrderId, OrderStatus,
    PricedLine, Product, ProductId, Supplier, SupplierId, UserId, assemble,
};
use serial_test::serial;
use sqlx::PgPool;
use storage::{AuditLog, CatalogStore, CustomerStore, OrderStore, PostgresStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_inventory_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE audit_entries, order_lines, orders, customers, products, suppliers",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_product(store: &PostgresStore, stock: u32, price_cents: i64) -> ProductId {
    let supplier = Supplier {
        id: SupplierId::new(),
        name: "Acme".to_string(),
        contact_name: "Jo".to_string(),
        phone: "555-0100".to_string(),
        email: "jo@acme.test".to_string(),
        address: "1 Main St".to_string(),
        tax_id: "TX-1".to_string(),
    };
    let supplier_id = supplier.id;
    store.insert_supplier(supplier).await.unwrap();

    let product = Product {
        id: ProductId::new(),
        supplier_id,
        name: "Widget".to_string(),
        description: Some("A widget".to_string()),
        price: Money::from_cents(price_cents),
        stock,
        min_stock: 1,
        active: true,
    };
    let id = product.id;
    store.insert_product(product).await.unwrap();
    id
}

async fn seed_customer(store: &PostgresStore) -> CustomerId {
    let customer = Customer {
        id: CustomerId::new(),
        name: "Ada".to_string(),
        email: "ada@example.test".to_string(),
        phone: "555-0101".to_string(),
        address: "2 Side St".to_string(),
    };
    let id = customer.id;
    store.insert_customer(customer).await.unwrap();
    id
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn product_round_trip() {
    let store = get_test_store().await;
    let id = seed_product(&store, 10, 500).await;

    let product = store.get_product(id).await.unwrap().unwrap();
    assert_eq!(product.stock, 10);
    assert_eq!(product.price, Money::from_cents(500));
    assert_eq!(product.description.as_deref(), Some("A widget"));
    assert!(store.get_product(ProductId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn duplicate_customer_is_a_conflict() {
    let store = get_test_store().await;
    let id = seed_customer(&store).await;
    let again = store.get_customer(id).await.unwrap().unwrap();

    let err = store.insert_customer(again).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { entity: "customer", .. }));
    assert!(store.exists(id).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn adjust_stock_never_goes_negative() {
    let store = get_test_store().await;
    let id = seed_product(&store, 3, 100).await;

    assert_eq!(store.adjust_stock(id, -2).await.unwrap(), 1);

    let err = store.adjust_stock(id, -2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::StockUnderflow {
            available: 1,
            requested: 2,
            ..
        }
    ));
    assert_eq!(store.get_stock(id).await.unwrap(), 1);

    assert!(matches!(
        store.adjust_stock(ProductId::new(), -1).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn concurrent_decrements_do_not_oversell() {
    let store = get_test_store().await;
    let id = seed_product(&store, 5, 100).await;

    let attempts = (0..20).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.adjust_stock(id, -1).await })
    });
    let results = futures_util::future::join_all(attempts).await;

    let succeeded = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(succeeded, 5);
    assert_eq!(store.get_stock(id).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn order_saved_with_lines_in_order() {
    let store = get_test_store().await;
    let p1 = seed_product(&store, 10, 500).await;
    let p2 = seed_product(&store, 1, 1200).await;
    let customer_id = seed_customer(&store).await;

    let new_order = assemble(
        customer_id,
        &[
            PricedLine::new(p1, 3, Money::from_cents(500)),
            PricedLine::new(p2, 1, Money::from_cents(1200)),
        ],
    )
    .unwrap();

    let saved = store.save_order(new_order).await.unwrap();
    let loaded = store.get_order(saved.id()).await.unwrap().unwrap();

    assert_eq!(loaded.total(), Money::from_cents(2700));
    assert_eq!(loaded.lines().len(), 2);
    assert_eq!(loaded.lines()[0].product_id(), p1);
    assert_eq!(loaded.lines()[1].product_id(), p2);
    assert_eq!(loaded.status(), OrderStatus::Created);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn failed_save_leaves_no_partial_order() {
    let store = get_test_store().await;
    let p1 = seed_product(&store, 10, 500).await;
    let customer_id = seed_customer(&store).await;

    // The second line references a product that does not exist, so the
    // line insert fails after the header was written.
    let new_order = assemble(
        customer_id,
        &[
            PricedLine::new(p1, 1, Money::from_cents(500)),
            PricedLine::new(ProductId::new(), 1, Money::from_cents(100)),
        ],
    )
    .unwrap();

    assert!(store.save_order(new_order).await.is_err());

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn transition_is_checked_against_current_status() {
    let store = get_test_store().await;
    let p1 = seed_product(&store, 10, 500).await;
    let customer_id = seed_customer(&store).await;
    let order = store
        .save_order(
            assemble(customer_id, &[PricedLine::new(p1, 1, Money::from_cents(500))]).unwrap(),
        )
        .await
        .unwrap();

    let confirmed = store
        .transition_status(order.id(), OrderStatus::CONFIRMABLE, OrderStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status(), OrderStatus::Confirmed);

    let err = store
        .transition_status(order.id(), OrderStatus::CONFIRMABLE, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Domain(DomainError::InvalidTransition {
            current: OrderStatus::Confirmed,
            ..
        })
    ));

    assert!(matches!(
        store
            .transition_status(OrderId::new(), OrderStatus::CANCELLABLE, OrderStatus::Cancelled)
            .await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn audit_entries_returned_oldest_first() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let user_id = UserId::new();

    store
        .append(AuditEntry::new(AuditTarget::order(order_id), "Order Created"))
        .await
        .unwrap();
    store
        .append(AuditEntry::new(
            AuditTarget::order(order_id).with_user(Some(user_id)),
            "Order Cancelled",
        ))
        .await
        .unwrap();
    store
        .append(AuditEntry::new(
            AuditTarget::product(ProductId::new()),
            "Product Added",
        ))
        .await
        .unwrap();

    let entries = store.entries_for_order(order_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "Order Created");
    assert_eq!(entries[1].action, "Order Cancelled");
    assert_eq!(entries[1].target.user_id(), Some(user_id));
}
