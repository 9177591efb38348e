use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Price;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Whether `price` satisfies the caller's `limit` on this side.
    ///
    /// Buyers accept anything at or below their limit, sellers anything
    /// at or above it. The boundary is inclusive: a venue quoting exactly
    /// at the limit is eligible.
    pub fn within_limit(&self, price: Price, limit: Price) -> bool {
        match self {
            Side::Buy => price <= limit,
            Side::Sell => price >= limit,
        }
    }

    /// Whether price `a` is strictly better than `b` from this side's
    /// point of view (lower for buys, higher for sells).
    pub fn is_better(&self, a: Price, b: Price) -> bool {
        match self {
            Side::Buy => a < b,
            Side::Sell => a > b,
        }
    }

    /// Signed quantity for exposure accounting: buys increase net
    /// position, sells decrease it.
    pub fn signed(&self, qty: Decimal) -> Decimal {
        match self {
            Side::Buy => qty,
            Side::Sell => -qty,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_within_limit_inclusive() {
        // Boundary is inclusive on both sides
        assert!(Side::Buy.within_limit(dec!(101), dec!(101)));
        assert!(Side::Buy.within_limit(dec!(100), dec!(101)));
        assert!(!Side::Buy.within_limit(dec!(102), dec!(101)));

        assert!(Side::Sell.within_limit(dec!(100), dec!(100)));
        assert!(Side::Sell.within_limit(dec!(101), dec!(100)));
        assert!(!Side::Sell.within_limit(dec!(99), dec!(100)));
    }

    #[test]
    fn test_is_better() {
        assert!(Side::Buy.is_better(dec!(99), dec!(100)));
        assert!(!Side::Buy.is_better(dec!(100), dec!(100)));
        assert!(Side::Sell.is_better(dec!(101), dec!(100)));
    }

    #[test]
    fn test_signed() {
        assert_eq!(Side::Buy.signed(dec!(5)), dec!(5));
        assert_eq!(Side::Sell.signed(dec!(5)), dec!(-5));
    }
}
