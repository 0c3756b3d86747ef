//! Fulfillment error types.

use common::ProductId;
use domain::{DomainError, OrderStatus};
use serde::Serialize;
use storage::StoreError;
use thiserror::Error;

/// Why a single requested line could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LineFailureReason {
    /// The product does not exist.
    NotFound,

    /// The product exists but is not offered for sale.
    Inactive,

    /// The product has fewer units on hand than requested.
    InsufficientStock { available: u32, requested: u64 },
}

/// A requested line that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub reason: LineFailureReason,
}

impl LineFailure {
    pub fn new(product_id: ProductId, reason: LineFailureReason) -> Self {
        Self { product_id, reason }
    }
}

impl std::fmt::Display for LineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            LineFailureReason::NotFound => write!(f, "product {} not found", self.product_id),
            LineFailureReason::Inactive => write!(f, "product {} is inactive", self.product_id),
            LineFailureReason::InsufficientStock {
                available,
                requested,
            } => write!(
                f,
                "product {}: requested {requested}, available {available}",
                self.product_id
            ),
        }
    }
}

fn join_failures(failures: &[LineFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the stock reservation service.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// A line asked for zero units.
    #[error("Invalid quantity for product {product_id}: must be greater than 0")]
    InvalidQuantity { product_id: ProductId },

    /// One or more lines could not be reserved. Nothing was decremented.
    #[error("Reservation rejected: {}", join_failures(.0))]
    Rejected(Vec<LineFailure>),

    /// The catalog store failed. Any partial decrements were re-credited.
    #[error("Catalog store error: {0}")]
    Store(#[from] StoreError),

    /// Re-crediting reserved stock failed; stock may be understated.
    #[error("Failed to re-credit reserved stock: {0}")]
    CompensationFailed(String),
}

/// Errors from the audit recorder.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The entry would reference no order, user, or product.
    #[error("Audit entry must reference at least one order, user, or product")]
    InvalidTarget,

    /// The audit log refused the append.
    #[error("Audit log error: {0}")]
    Store(#[from] StoreError),
}

impl From<DomainError> for AuditError {
    fn from(_: DomainError) -> Self {
        Self::InvalidTarget
    }
}

/// Errors returned by the fulfillment core and the catalog service.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request is malformed or references an unknown customer or
    /// supplier. Nothing was persisted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Stock could not be reserved for one or more lines. Nothing was
    /// persisted.
    #[error("Order rejected: {}", join_failures(.0))]
    Rejected(Vec<LineFailure>),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Persisting the order failed after stock was reserved. The stock has
    /// been restored, so the request can be retried as-is.
    #[error("Failed to commit order: {0}")]
    CommitFailed(#[source] StoreError),

    /// Restoring stock after a failure did not succeed.
    #[error("Compensation failed: {0}")]
    CompensationFailed(String),

    /// The order is not in a status that allows the requested action.
    #[error("Cannot {action} an order in {current} status")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// A domain rule failed while building the order.
    #[error("Domain error: {0}")]
    Domain(DomainError),

    /// A store failed outside the commit step.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// The background commit task did not complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FulfillmentError {
    /// Returns true if the caller may resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CommitFailed(_) => true,
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns the failing lines of a rejection.
    pub fn line_failures(&self) -> Option<&[LineFailure]> {
        match self {
            Self::Rejected(lines) => Some(lines),
            _ => None,
        }
    }
}

impl From<DomainError> for FulfillmentError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidTransition { current, action } => {
                Self::InvalidTransition { current, action }
            }
            DomainError::InvalidQuantity { .. }
            | DomainError::InvalidPrice { .. }
            | DomainError::EmptyOrder
            | DomainError::AmountOverflow { .. } => Self::InvalidRequest(e.to_string()),
            other => Self::Domain(other),
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Domain(domain) => domain.into(),
            other => Self::Store(other),
        }
    }
}

impl From<ReservationError> for FulfillmentError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::InvalidQuantity { .. } => Self::InvalidRequest(e.to_string()),
            ReservationError::Rejected(lines) => Self::Rejected(lines),
            ReservationError::Store(store) => store.into(),
            ReservationError::CompensationFailed(msg) => Self::CompensationFailed(msg),
        }
    }
}

impl From<AuditError> for FulfillmentError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::InvalidTarget => Self::InvalidRequest(e.to_string()),
            AuditError::Store(store) => store.into(),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
