//! The audit ledger's entry type.

use chrono::{DateTime, Utc};
use common::{AuditEntryId, OrderId, ProductId, UserId};
use serde::Serialize;

use crate::error::DomainError;

/// Action recorded when an order is placed.
pub const ORDER_CREATED: &str = "Order Created";
/// Action recorded when an order is confirmed.
pub const ORDER_CONFIRMED: &str = "Order Confirmed";
/// Action recorded when an order is cancelled and its stock re-credited.
pub const ORDER_CANCELLED: &str = "Order Cancelled";
/// Action recorded when a product is added to the catalog.
pub const PRODUCT_ADDED: &str = "Product Added";

/// Two or more references carried by a [`AuditTarget::Combination`].
///
/// Only constructed through [`AuditTarget::from_refs`], which guarantees at
/// least two references are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AuditRefs {
    order: Option<OrderId>,
    user: Option<UserId>,
    product: Option<ProductId>,
}

/// What an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditTarget {
    Order { order_id: OrderId },
    Product { product_id: ProductId },
    User { user_id: UserId },
    Combination(AuditRefs),
}

impl AuditTarget {
    pub fn order(order_id: OrderId) -> Self {
        Self::Order { order_id }
    }

    pub fn product(product_id: ProductId) -> Self {
        Self::Product { product_id }
    }

    pub fn user(user_id: UserId) -> Self {
        Self::User { user_id }
    }

    /// Builds a target from optional references.
    ///
    /// A single reference yields the matching single variant, several yield
    /// a [`AuditTarget::Combination`], and none is an error.
    pub fn from_refs(
        order: Option<OrderId>,
        user: Option<UserId>,
        product: Option<ProductId>,
    ) -> Result<Self, DomainError> {
        match (order, user, product) {
            (None, None, None) => Err(DomainError::InvalidAuditTarget),
            (Some(order_id), None, None) => Ok(Self::order(order_id)),
            (None, Some(user_id), None) => Ok(Self::user(user_id)),
            (None, None, Some(product_id)) => Ok(Self::product(product_id)),
            (order, user, product) => Ok(Self::Combination(AuditRefs {
                order,
                user,
                product,
            })),
        }
    }

    /// Adds the acting user to this target, if there is one.
    pub fn with_user(self, user: Option<UserId>) -> Self {
        match user {
            None => self,
            // A user reference is present, so this cannot fail.
            Some(_) => Self::from_refs(self.order_id(), user, self.product_id()).unwrap_or(self),
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::Order { order_id } => Some(*order_id),
            Self::Combination(refs) => refs.order,
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id } => Some(*user_id),
            Self::Combination(refs) => refs.user,
            _ => None,
        }
    }

    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Product { product_id } => Some(*product_id),
            Self::Combination(refs) => refs.product,
            _ => None,
        }
    }
}

/// An immutable record of an action taken on the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub target: AuditTarget,
    pub action: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(target: AuditTarget, action: impl Into<String>) -> Self {
        Self {
            id: AuditEntryId::new(),
            target,
            action: action.into(),
            recorded_at: Utc::now(),
        }
    }

    /// Returns true if this entry references the given order.
    pub fn concerns_order(&self, order_id: OrderId) -> bool {
        self.target.order_id() == Some(order_id)
    }
}
