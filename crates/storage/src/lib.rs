//! Persistence contracts for the order fulfillment core.
//!
//! The core only talks to storage through the narrow traits in [`store`].
//! Two implementations are provided: [`InMemoryStore`] for tests and
//! single-process deployments, and [`PostgresStore`] backed by `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{AuditLog, CatalogStore, CustomerStore, OrderStore};
