//! Hermes Ports
//!
//! Port definitions (traits) for the Hermes smart order router.
//! These define the boundaries between routing logic and the venues it
//! trades against.

mod clock;
mod error;
mod venue;

pub use clock::Clock;
pub use error::{VenueError, VenueResult};
pub use venue::VenueClient;
