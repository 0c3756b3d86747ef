//! Inbound placement request.

use common::{CustomerId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// One requested product and quantity. Prices come from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl RequestedLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A request to place an order for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: CustomerId,
    /// The user acting on the customer's behalf, recorded in the audit entry.
    #[serde(default)]
    pub placed_by: Option<UserId>,
    pub lines: Vec<RequestedLine>,
}

impl PlaceOrderRequest {
    pub fn new(customer_id: CustomerId, lines: Vec<RequestedLine>) -> Self {
        Self {
            customer_id,
            placed_by: None,
            lines,
        }
    }

    /// Sets the acting user.
    pub fn placed_by(mut self, user_id: UserId) -> Self {
        self.placed_by = Some(user_id);
        self
    }
}
