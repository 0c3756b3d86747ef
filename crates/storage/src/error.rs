use common::ProductId;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// A stock decrement would have taken the quantity below zero.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    StockUnderflow {
        product_id: ProductId,
        available: u32,
        requested: u64,
    },

    /// A stock increment would have exceeded the representable range.
    #[error("Stock adjustment out of range for product {product_id}: stock {stock}, delta {delta}")]
    StockOverflow {
        product_id: ProductId,
        stock: u32,
        delta: i64,
    },

    /// A domain rule rejected the change (e.g. an invalid status transition).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store could not be reached or refused the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be turned back into a domain record.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_io_failures_are_transient() {
        assert!(StoreError::Unavailable("down".to_string()).is_transient());
        assert!(!StoreError::not_found("product", ProductId::new()).is_transient());
        assert!(!StoreError::Domain(DomainError::EmptyOrder).is_transient());
    }

    #[test]
    fn not_found_message_names_entity() {
        let id = ProductId::new();
        let err = StoreError::not_found("product", id);
        assert_eq!(err.to_string(), format!("product not found: {id}"));
    }
}
