//! Order fulfillment for the inventory back end.
//!
//! Placing an order coordinates several stores as one unit:
//! 1. Validate the request and the customer
//! 2. Reserve stock for every line (all or nothing)
//! 3. Assemble the order at the prices read under the reservation
//! 4. Commit the order, releasing the stock if the commit fails
//! 5. Append an audit entry (best-effort)
//!
//! Stock is never sold beyond what is on hand, however placements interleave.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod recorder;
pub mod request;
pub mod reservation;
pub mod state;

pub use catalog::CatalogService;
pub use coordinator::{OrderFulfillmentCore, OrderOutcome, PlacedOrder};
pub use error::{
    AuditError, FulfillmentError, LineFailure, LineFailureReason, ReservationError, Result,
};
pub use recorder::{AuditRecorder, AuditStatus};
pub use request::{PlaceOrderRequest, RequestedLine};
pub use reservation::{Reservation, StockReservationService};
pub use state::PlacementState;
