//! Domain layer for the inventory and order fulfillment system.
//!
//! This crate is pure: it holds the record types and the rules that do not
//! need storage.
//! - Fixed-point [`Money`]
//! - Catalog records ([`Product`], [`Supplier`]) and [`Customer`]
//! - The [`Order`] aggregate with its [`OrderLine`]s and [`OrderStatus`]
//! - The order assembler that prices lines and computes totals
//! - The append-only [`AuditEntry`] with its structural [`AuditTarget`]
//!
//! Entities reference each other by identifier only; nothing here owns a
//! pointer to another aggregate.

pub mod audit;
pub mod catalog;
pub mod customer;
pub mod error;
pub mod money;
pub mod order;

pub use audit::{AuditEntry, AuditTarget};
pub use catalog::{NewProduct, NewSupplier, Product, Supplier};
pub use common::{
    AuditEntryId, CustomerId, OrderId, OrderLineId, ProductId, SupplierId, UserId,
};
pub use customer::{Customer, NewCustomer};
pub use error::DomainError;
pub use money::Money;
pub use order::{NewOrder, Order, OrderLine, OrderStatus, PricedLine, assemble, assemble_at};
