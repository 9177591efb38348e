use async_trait::async_trait;
use hermes_core::{
    FillReceipt, HoldId, InstrumentId, Price, Quantity, Reservation, Side, VenueId, VenueQuote,
};

use crate::error::VenueResult;

/// Per-venue RPC surface: quote, reserve, commit, cancel
///
/// One implementor per venue. The router only ever talks to venues
/// through this port; how a venue matches resting orders is its own
/// business.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// The venue this client talks to
    fn venue_id(&self) -> &VenueId;

    /// Price the venue's liquidity for a taker on `side`, up to
    /// `depth_hint` quantity. Read-only; safe to call repeatedly and
    /// concurrently.
    async fn quote(
        &self,
        instrument_id: &InstrumentId,
        side: Side,
        depth_hint: Quantity,
    ) -> VenueResult<VenueQuote>;

    /// Earmark `qty` of liquidity at or better than `limit_price` for up
    /// to `ttl_ms`. The returned reservation carries the venue-assigned
    /// hold id and the venue's own expiry.
    async fn reserve(
        &self,
        instrument_id: &InstrumentId,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        ttl_ms: u64,
    ) -> VenueResult<Reservation>;

    /// Execute a reserved hold. The venue's answer is authoritative:
    /// an expired or unknown hold is a typed rejection, never a fill.
    async fn commit(&self, hold_id: HoldId) -> VenueResult<FillReceipt>;

    /// Release a hold. Idempotent: cancelling a hold that is already
    /// terminal (or unknown) acknowledges without error.
    async fn cancel(&self, hold_id: HoldId) -> VenueResult<()>;
}
