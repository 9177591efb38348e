//! Router errors
//!
//! An unfilled remainder after allocation is deliberately absent from
//! this taxonomy: `plan.unfilled > 0` is data the caller inspects on the
//! result, not a failure. Nothing here is retried automatically across a
//! stale hold - after any failure, a fresh plan and fresh holds are the
//! only way forward.

use hermes_core::{FillReceipt, Price, VenueId};
use hermes_ports::VenueError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RouteError {
    /// No venue was eligible at the caller's limit at all
    #[error("no venue eligible at limit price {limit_price}")]
    PriceLimitViolation { limit_price: Price },

    /// A venue declined at reserve time (e.g. the quote moved)
    #[error("reservation rejected by venue {venue_id}: {reason}")]
    ReservationRejected { venue_id: VenueId, reason: String },

    /// The hold's TTL elapsed before commit
    #[error("hold on venue {venue_id} expired before commit")]
    ReservationExpired { venue_id: VenueId },

    /// Pre-trade risk check failed; nothing was reserved
    #[error("insufficient collateral: required {required}, free {free_collateral}")]
    MarginInsufficient {
        required: Decimal,
        free_collateral: Decimal,
    },

    /// Transient transport failure talking to a venue
    #[error("venue {venue_id} unreachable")]
    VenueUnreachable { venue_id: VenueId },

    /// Fatal: some legs committed while a sibling failed to commit after
    /// successful reservation. Executed legs on independent venues
    /// cannot be undone by the router; the committed receipts are
    /// carried for reconciliation.
    #[error(
        "route {route_id} partially executed: {} leg(s) committed, {} failed - reconciliation required",
        .committed.len(),
        .failed.len()
    )]
    PartialExecutionConflict {
        route_id: Uuid,
        committed: Vec<FillReceipt>,
        failed: Vec<VenueId>,
    },

    /// The request itself was malformed
    #[error("invalid route request: {0}")]
    InvalidRequest(String),
}

impl RouteError {
    /// Map a venue failure observed during the reserve phase
    pub(crate) fn from_reserve_failure(err: VenueError) -> Self {
        if err.is_transport() {
            return RouteError::VenueUnreachable {
                venue_id: err.venue_id().clone(),
            };
        }
        match err {
            VenueError::ReserveRejected { venue_id, reason } => {
                RouteError::ReservationRejected { venue_id, reason }
            }
            other => RouteError::ReservationRejected {
                venue_id: other.venue_id().clone(),
                reason: other.to_string(),
            },
        }
    }

    /// Map a venue failure observed during the commit phase
    pub(crate) fn from_commit_failure(err: VenueError) -> Self {
        if err.is_transport() {
            return RouteError::VenueUnreachable {
                venue_id: err.venue_id().clone(),
            };
        }
        match err {
            VenueError::HoldExpired { venue_id, .. } => {
                RouteError::ReservationExpired { venue_id }
            }
            other => RouteError::ReservationRejected {
                venue_id: other.venue_id().clone(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::HoldId;

    #[test]
    fn test_transport_failures_map_to_unreachable() {
        let err = RouteError::from_reserve_failure(VenueError::Timeout(VenueId::new("alpha")));
        assert!(matches!(err, RouteError::VenueUnreachable { .. }));
    }

    #[test]
    fn test_commit_expiry_maps_to_reservation_expired() {
        let err = RouteError::from_commit_failure(VenueError::HoldExpired {
            venue_id: VenueId::new("alpha"),
            hold_id: HoldId(1),
        });
        assert!(matches!(
            err,
            RouteError::ReservationExpired { venue_id } if venue_id == VenueId::new("alpha")
        ));
    }
}
