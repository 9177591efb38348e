use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::side::Side;
use crate::instruments::VenueId;
use crate::values::{Price, Quantity, Timestamp};

/// A snapshot of executable liquidity at one venue
///
/// `vwap_price` is the volume-weighted price for filling the requested
/// depth at this venue; `available_liquidity` is how much can be taken at
/// that price view. A quote is only a planning input - the venue's reserve
/// response is what actually locks liquidity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueQuote {
    /// Venue that produced the quote
    pub venue_id: VenueId,

    /// Side of the book this quote prices (the taker's side)
    pub side: Side,

    /// Volume-weighted price at the requested depth
    pub vwap_price: Price,

    /// Total quantity executable at this venue right now
    pub available_liquidity: Quantity,

    /// Proportional fee charged on notional (e.g. 0.01 = 1%)
    pub fee_rate: Decimal,

    /// Smallest tradable quantity step at this venue
    pub min_increment: Quantity,

    /// When the venue produced the quote
    pub quote_timestamp: Timestamp,
}

impl VenueQuote {
    pub fn new(
        venue_id: VenueId,
        side: Side,
        vwap_price: Price,
        available_liquidity: Quantity,
        fee_rate: Decimal,
        min_increment: Quantity,
        quote_timestamp: Timestamp,
    ) -> Self {
        debug_assert!(available_liquidity >= Decimal::ZERO);
        Self {
            venue_id,
            side,
            vwap_price,
            available_liquidity,
            fee_rate,
            min_increment,
            quote_timestamp,
        }
    }

    /// Whether this quote is older than `max_age` as of `now`
    pub fn is_stale(&self, now: Timestamp, max_age: Duration) -> bool {
        now - self.quote_timestamp > max_age
    }

    /// Round a quantity down to this venue's tradable increment
    pub fn round_to_increment(&self, qty: Quantity) -> Quantity {
        if self.min_increment <= Decimal::ZERO {
            return qty;
        }
        (qty / self.min_increment).floor() * self.min_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn make_quote(ts: Timestamp) -> VenueQuote {
        VenueQuote::new(
            VenueId::new("alpha"),
            Side::Buy,
            dec!(100),
            dec!(10),
            dec!(0.01),
            dec!(0.1),
            ts,
        )
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let fresh = make_quote(now - Duration::seconds(1));
        let stale = make_quote(now - Duration::seconds(10));

        assert!(!fresh.is_stale(now, Duration::seconds(5)));
        assert!(stale.is_stale(now, Duration::seconds(5)));
    }

    #[test]
    fn test_round_to_increment() {
        let quote = make_quote(Utc::now());
        assert_eq!(quote.round_to_increment(dec!(3.14)), dec!(3.1));
        assert_eq!(quote.round_to_increment(dec!(3.10)), dec!(3.1));
        assert_eq!(quote.round_to_increment(dec!(0.05)), dec!(0));
    }

    #[test]
    fn test_round_with_zero_increment_passes_through() {
        let mut quote = make_quote(Utc::now());
        quote.min_increment = Decimal::ZERO;
        assert_eq!(quote.round_to_increment(dec!(3.14)), dec!(3.14));
    }
}
