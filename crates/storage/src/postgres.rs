use async_trait::async_trait;
use common::{AuditEntryId, CustomerId, OrderId, OrderLineId, ProductId, SupplierId, UserId};
use domain::{
    AuditEntry, AuditTarget, Customer, DomainError, Money, NewOrder, Order, OrderLine,
    OrderStatus, Product, Supplier,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{AuditLog, CatalogStore, CustomerStore, OrderStore, Result, StoreError};

/// PostgreSQL-backed implementation of every store contract.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_supplier(row: PgRow) -> Result<Supplier> {
        Ok(Supplier {
            id: SupplierId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            contact_name: row.try_get("contact_name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            tax_id: row.try_get("tax_id")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            supplier_id: SupplierId::from_uuid(row.try_get::<Uuid, _>("supplier_id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: to_u32(row.try_get("stock")?, "stock")?,
            min_stock: to_u32(row.try_get("min_stock")?, "min_stock")?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<OrderLine> {
        let line = OrderLine::new(
            OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            to_u32(row.try_get("quantity")?, "quantity")?,
            Money::from_cents(row.try_get("unit_price_cents")?),
        )?;
        Ok(line)
    }

    fn row_to_audit_entry(row: PgRow) -> Result<AuditEntry> {
        let target = AuditTarget::from_refs(
            row.try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            row.try_get::<Option<Uuid>, _>("user_id")?
                .map(UserId::from_uuid),
            row.try_get::<Option<Uuid>, _>("product_id")?
                .map(ProductId::from_uuid),
        )?;

        Ok(AuditEntry {
            id: AuditEntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            target,
            action: row.try_get("action")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    /// Loads an order header and its lines over one connection.
    async fn load_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
        let header: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, customer_id, placed_at, status
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let status: String = header.try_get("status")?;
        let status: OrderStatus = status
            .parse()
            .map_err(|e: domain::order::UnknownStatus| StoreError::InvalidData(e.to_string()))?;

        let lines = sqlx::query(
            r#"
            SELECT id, product_id, quantity, unit_price_cents
            FROM order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Self::row_to_line)
        .collect::<Result<Vec<_>>>()?;

        let order = Order::from_parts(
            id,
            CustomerId::from_uuid(header.try_get::<Uuid, _>("customer_id")?),
            header.try_get("placed_at")?,
            status,
            lines,
        )?;
        Ok(Some(order))
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

/// Maps a unique constraint violation to `Conflict`.
fn map_insert_error(
    entity: &'static str,
    id: impl std::fmt::Display,
) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return StoreError::conflict(entity, id);
        }
        StoreError::Database(e)
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn insert_supplier(&self, supplier: Supplier) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, contact_name, phone, email, address, tax_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(supplier.id.as_uuid())
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(&supplier.tax_id)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error("supplier", supplier.id))?;

        Ok(())
    }

    async fn get_supplier(&self, id: SupplierId) -> Result<Option<Supplier>> {
        sqlx::query(
            r#"
            SELECT id, name, contact_name, phone, email, address, tax_id
            FROM suppliers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_supplier)
        .transpose()
    }

    async fn insert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, supplier_id, name, description, price_cents, stock, min_stock, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.supplier_id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(i64::from(product.min_stock))
        .bind(product.active)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error("product", product.id))?;

        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query(
            r#"
            SELECT id, supplier_id, name, description, price_cents, stock, min_stock, active
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Self::row_to_product)
        .transpose()
    }

    async fn get_stock(&self, id: ProductId) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match stock {
            Some(stock) => to_u32(stock, "stock"),
            None => Err(StoreError::not_found("product", id)),
        }
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<u32> {
        // The guard makes the update a compare-and-adjust in a single statement.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2
            WHERE id = $1 AND stock + $2 BETWEEN 0 AND 4294967295
            RETURNING stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(stock) = updated {
            return to_u32(stock, "stock");
        }

        let stock = self.get_stock(id).await?;
        if i64::from(stock) + delta < 0 {
            Err(StoreError::StockUnderflow {
                product_id: id,
                available: stock,
                requested: delta.unsigned_abs(),
            })
        } else {
            Err(StoreError::StockOverflow {
                product_id: id,
                stock,
                delta,
            })
        }
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn insert_customer(&self, customer: Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error("customer", customer.id))?;

        Ok(())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        sqlx::query("SELECT id, name, email, phone, address FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_customer)
            .transpose()
    }

    async fn exists(&self, id: CustomerId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn save_order(&self, order: NewOrder) -> Result<Order> {
        let order = order.into_order(OrderId::new());

        // Header and lines commit together or not at all.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, placed_at, status, total_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.placed_at())
        .bind(order.status().as_str())
        .bind(order.total().cents())
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in (1_i32..).zip(order.lines()) {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, line_no, product_id, quantity, unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(order.id().as_uuid())
            .bind(line_no)
            .bind(line.product_id().as_uuid())
            .bind(i64::from(line.quantity()))
            .bind(line.unit_price().cents())
            .bind(line.line_total().cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(order_id = %order.id(), lines = order.lines().len(), "Order saved");
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_order(&mut conn, id).await
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Order> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let mut tx = self.pool.begin().await?;

        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $3
            WHERE id = $1 AND status = ANY($2)
            RETURNING id
            "#,
        )
        .bind(id.as_uuid())
        .bind(&from)
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let order = Self::load_order(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::not_found("order", id))?;

        if updated.is_none() {
            return Err(StoreError::Domain(DomainError::InvalidTransition {
                current: order.status(),
                action: to.verb(),
            }));
        }

        tx.commit().await?;
        Ok(order)
    }
}

#[async_trait]
impl AuditLog for PostgresStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (id, order_id, user_id, product_id, action, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.target.order_id().map(|id| id.as_uuid()))
        .bind(entry.target.user_id().map(|id| id.as_uuid()))
        .bind(entry.target.product_id().map(|id| id.as_uuid()))
        .bind(&entry.action)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entries_for_order(&self, id: OrderId) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, user_id, product_id, action, recorded_at
            FROM audit_entries
            WHERE order_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_audit_entry).collect()
    }
}
