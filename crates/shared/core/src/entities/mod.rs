mod hold;
mod order_type;
mod plan;
mod portfolio;
mod quote;
mod receipt;
mod side;

pub use hold::{Hold, HoldId, HoldStatus, Reservation};
pub use order_type::OrderType;
pub use plan::{ExecutionLeg, ExecutionPlan};
pub use portfolio::{MarginSnapshot, NetPosition, Portfolio};
pub use quote::VenueQuote;
pub use receipt::FillReceipt;
pub use side::Side;
