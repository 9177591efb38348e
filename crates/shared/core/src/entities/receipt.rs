use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::hold::HoldId;
use super::side::Side;
use crate::instruments::{InstrumentId, VenueId};
use crate::values::{Price, Quantity, Timestamp};

/// Proof of one committed hold
///
/// Produced exactly once per successful commit and immutable thereafter.
/// `pnl_delta` carries any pnl the venue itself realized as part of the
/// fill (position-tracking venues); cross-venue pnl attribution is owned
/// by the portfolio ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReceipt {
    /// Hold this receipt settles
    pub hold_id: HoldId,

    /// Venue that executed the fill
    pub venue_id: VenueId,

    /// Instrument traded
    pub instrument_id: InstrumentId,

    /// Side of the fill from the taker's view
    pub side: Side,

    /// Quantity actually filled
    pub filled_qty: Quantity,

    /// Volume-weighted execution price
    pub vwap_price: Price,

    /// filled_qty * vwap_price
    pub notional: Decimal,

    /// Fee charged by the venue
    pub fee: Decimal,

    /// Pnl realized at the venue as part of this fill
    pub pnl_delta: Decimal,

    /// When the venue committed the fill
    pub timestamp: Timestamp,
}

impl FillReceipt {
    /// Signed fill quantity for exposure accounting
    pub fn signed_qty(&self) -> Decimal {
        self.side.signed(self.filled_qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_qty() {
        let receipt = FillReceipt {
            hold_id: HoldId(1),
            venue_id: VenueId::new("alpha"),
            instrument_id: InstrumentId::new("BTC-PERP"),
            side: Side::Sell,
            filled_qty: dec!(4),
            vwap_price: dec!(100),
            notional: dec!(400),
            fee: dec!(4),
            pnl_delta: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        assert_eq!(receipt.signed_qty(), dec!(-4));
    }
}
