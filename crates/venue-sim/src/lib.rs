//! Venue Simulator
//!
//! An in-process liquidity venue implementing the [`VenueClient`] port:
//! a configurable depth ladder per instrument, a proportional fee rate,
//! and time-bounded holds with venue-side expiry.
//!
//! The simulator stands in for a real venue in tests and local runs. It
//! is deliberately not a matching engine - resting-order matching is the
//! venue's own business and out of scope here. What it does model
//! faithfully is the reservation protocol:
//!
//! - `reserve` debits liquidity from the ladder and earmarks it under a
//!   TTL-bounded hold
//! - `commit` re-validates expiry against the venue's clock (the venue's
//!   answer is authoritative, whatever the router believes locally)
//! - `cancel` is idempotent and refunds the earmarked liquidity
//! - expired holds refund on the next touch
//!
//! Failure injection (`fail_next_reserve`, `fail_next_commit`,
//! `set_offline`) drives the coordinator's rollback paths in tests.

mod model;
mod venue;

pub use hermes_ports::VenueClient;
pub use model::{DepthLevel, SimVenueConfig};
pub use venue::SimVenue;
