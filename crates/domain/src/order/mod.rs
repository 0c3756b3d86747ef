//! Order aggregate, line items, and the order assembler.

mod assembler;
mod model;
mod state;

pub use assembler::{PricedLine, assemble, assemble_at};
pub use model::{NewOrder, Order, OrderLine};
pub use state::{OrderStatus, UnknownStatus};
