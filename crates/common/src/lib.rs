//! Shared types for the inventory and order fulfillment system.
//!
//! Every entity is addressed by its own identifier type so that an order id
//! can never be handed to something expecting a product id.

mod types;

pub use types::{
    AuditEntryId, CustomerId, OrderId, OrderLineId, ProductId, SupplierId, UserId,
};
