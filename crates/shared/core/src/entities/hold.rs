use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::side::Side;
use crate::instruments::VenueId;
use crate::values::{Price, Quantity, Timestamp};

/// Venue-assigned identifier for a hold
///
/// Opaque to the router: venues number their own holds and two venues may
/// reuse the same value, so a hold is globally identified by
/// (venue_id, hold_id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoldId(pub u64);

impl std::fmt::Display for HoldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a hold
///
/// `Pending` is the only non-terminal state. A venue may expire a hold on
/// its own, so the local status is re-derived from venue responses rather
/// than assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldStatus {
    /// Reserved, awaiting commit or cancel
    Pending,
    /// Commit succeeded; liquidity consumed
    Committed,
    /// TTL elapsed before commit
    Expired,
    /// Released by the holder
    Cancelled,
    /// Venue declined the reservation or the commit
    Failed,
}

impl HoldStatus {
    /// Whether no further transition is permitted from this state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Pending)
    }
}

/// The venue's answer to a reserve request
///
/// `worst_price` is the worst marginal price inside the reserved depth,
/// and `max_charge` bounds what the eventual commit can cost including
/// fees. Both let the holder re-check the execution before committing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub hold_id: HoldId,
    pub venue_id: VenueId,
    pub vwap_price: Price,
    pub worst_price: Price,
    pub max_charge: Decimal,
    pub expires_at: Timestamp,
}

/// A time-bounded reservation of liquidity at one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hold {
    /// Venue-assigned identifier
    pub hold_id: HoldId,

    /// Venue holding the liquidity
    pub venue_id: VenueId,

    /// Side of the reserved liquidity
    pub side: Side,

    /// Reserved quantity
    pub qty: Quantity,

    /// Worst acceptable price agreed at reserve time
    pub limit_price: Price,

    /// When the hold was created
    pub created_at: Timestamp,

    /// When the venue will release the hold on its own
    pub expires_at: Timestamp,

    /// Current lifecycle state
    pub status: HoldStatus,
}

impl Hold {
    /// Create a pending hold from a reservation
    pub fn from_reservation(
        reservation: &Reservation,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        created_at: Timestamp,
    ) -> Self {
        Self {
            hold_id: reservation.hold_id,
            venue_id: reservation.venue_id.clone(),
            side,
            qty,
            limit_price,
            created_at,
            expires_at: reservation.expires_at,
            status: HoldStatus::Pending,
        }
    }

    /// Whether the hold's TTL has elapsed as of `now`
    ///
    /// Local time only hints that a hold is dead; the venue's response is
    /// authoritative for the opposite direction.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Attempt a transition. Returns `false` (and leaves the hold
    /// untouched) when the hold is already terminal: a repeated cancel
    /// on a terminal hold is a no-op, not an error.
    pub fn transition(&mut self, to: HoldStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = to;
        true
    }
}
