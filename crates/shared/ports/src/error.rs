use hermes_core::{HoldId, VenueId};
use thiserror::Error;

/// Failures a venue can report through the client port
///
/// Commit rejections are typed so the coordinator can re-derive hold
/// state from the venue's answer instead of assuming it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("venue {0} is unavailable")]
    Unavailable(VenueId),

    #[error("request to venue {0} timed out")]
    Timeout(VenueId),

    #[error("reservation rejected by venue {venue_id}: {reason}")]
    ReserveRejected { venue_id: VenueId, reason: String },

    #[error("hold {hold_id} on venue {venue_id} has expired")]
    HoldExpired { venue_id: VenueId, hold_id: HoldId },

    #[error("hold {hold_id} not found on venue {venue_id}")]
    HoldNotFound { venue_id: VenueId, hold_id: HoldId },

    #[error("hold {hold_id} on venue {venue_id} already committed")]
    AlreadyCommitted { venue_id: VenueId, hold_id: HoldId },

    #[error("venue {venue_id} internal error: {reason}")]
    Internal { venue_id: VenueId, reason: String },

    #[error("invalid request to venue {venue_id}: {reason}")]
    InvalidRequest { venue_id: VenueId, reason: String },
}

impl VenueError {
    /// The venue the failure came from
    pub fn venue_id(&self) -> &VenueId {
        match self {
            VenueError::Unavailable(venue_id) | VenueError::Timeout(venue_id) => venue_id,
            VenueError::ReserveRejected { venue_id, .. }
            | VenueError::HoldExpired { venue_id, .. }
            | VenueError::HoldNotFound { venue_id, .. }
            | VenueError::AlreadyCommitted { venue_id, .. }
            | VenueError::Internal { venue_id, .. }
            | VenueError::InvalidRequest { venue_id, .. } => venue_id,
        }
    }

    /// Whether the failure means the venue could not be reached at all
    /// (as opposed to the venue answering with a rejection)
    pub fn is_transport(&self) -> bool {
        matches!(self, VenueError::Unavailable(_) | VenueError::Timeout(_))
    }
}

pub type VenueResult<T> = Result<T, VenueError>;
