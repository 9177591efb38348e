use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::instruments::InstrumentId;
use crate::values::{Price, Timestamp};

/// Margin state derived from the full position set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    /// Collateral required to open the current exposure
    pub initial_margin: Decimal,

    /// Collateral required to keep it open
    pub maintenance_margin: Decimal,

    /// equity - initial_margin
    pub free_collateral: Decimal,
}

impl MarginSnapshot {
    /// Snapshot for a portfolio with no exposure
    pub fn flat(equity: Decimal) -> Self {
        Self {
            initial_margin: Decimal::ZERO,
            maintenance_margin: Decimal::ZERO,
            free_collateral: equity,
        }
    }
}

/// Net position in one instrument, aggregated across all venues
///
/// `qty` is signed: positive long, negative short. Offsetting fills on
/// different venues net against each other here - margin is charged on
/// net exposure, never gross.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPosition {
    /// Signed net quantity
    pub qty: Decimal,

    /// Volume-weighted entry price of the open quantity
    pub avg_entry_price: Price,

    /// Last traded price, used for notional/margin
    pub mark_price: Price,
}

impl NetPosition {
    pub fn flat() -> Self {
        Self {
            qty: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            mark_price: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }

    /// Absolute notional exposure at the mark price
    pub fn notional(&self) -> Decimal {
        self.qty.abs() * self.mark_price
    }

    /// Net a signed fill into the position.
    ///
    /// Returns the pnl realized by the reducing portion (ZERO when the
    /// fill opens or extends). A fill that crosses through flat keeps the
    /// remainder open at the fill price.
    pub fn apply(&mut self, fill_qty: Decimal, price: Price) -> Decimal {
        self.mark_price = price;
        if fill_qty.is_zero() {
            return Decimal::ZERO;
        }

        let extending = self.qty.is_zero()
            || (self.qty > Decimal::ZERO) == (fill_qty > Decimal::ZERO);
        if extending {
            let new_qty = self.qty + fill_qty;
            self.avg_entry_price =
                (self.avg_entry_price * self.qty + price * fill_qty) / new_qty;
            self.qty = new_qty;
            return Decimal::ZERO;
        }

        // Reducing or flipping: realize pnl on the closed quantity
        let closed = fill_qty.abs().min(self.qty.abs());
        let direction = if self.qty > Decimal::ZERO {
            Decimal::ONE
        } else {
            -Decimal::ONE
        };
        let realized = (price - self.avg_entry_price) * closed * direction;

        let new_qty = self.qty + fill_qty;
        if new_qty.is_zero() {
            self.qty = Decimal::ZERO;
            self.avg_entry_price = Decimal::ZERO;
        } else if (new_qty > Decimal::ZERO) == (self.qty > Decimal::ZERO) {
            // Partial close - entry price of the remainder unchanged
            self.qty = new_qty;
        } else {
            // Crossed through flat - remainder opens at the fill price
            self.qty = new_qty;
            self.avg_entry_price = price;
        }
        realized
    }
}

/// An owner's cross-venue book
///
/// Mutated only by the portfolio ledger. Created on first trade, never
/// deleted - exposure can only be reset to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Account owner
    pub owner: String,

    /// Account equity (collateral plus realized pnl, net of fees)
    pub equity: Decimal,

    /// Net position per instrument, across all venues
    pub positions: HashMap<InstrumentId, NetPosition>,

    /// Margin state as of the last recomputation
    pub last_margin_snapshot: MarginSnapshot,

    /// When the portfolio was created
    pub created_at: Timestamp,

    /// Last update time
    pub updated_at: Timestamp,
}

impl Portfolio {
    pub fn new(owner: impl Into<String>, equity: Decimal) -> Self {
        let now = Utc::now();
        Self {
            owner: owner.into(),
            equity,
            positions: HashMap::new(),
            last_margin_snapshot: MarginSnapshot::flat(equity),
            created_at: now,
            updated_at: now,
        }
    }

    /// Signed net position in an instrument (ZERO when untouched)
    pub fn net_position(&self, instrument_id: &InstrumentId) -> Decimal {
        self.positions
            .get(instrument_id)
            .map(|p| p.qty)
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of per-instrument absolute notional exposure
    pub fn net_notional_exposure(&self) -> Decimal {
        self.positions.values().map(|p| p.notional()).sum()
    }

    /// Net a signed fill into the instrument's position, returning the
    /// realized pnl of the reducing portion
    pub fn apply_signed_fill(
        &mut self,
        instrument_id: &InstrumentId,
        fill_qty: Decimal,
        price: Price,
    ) -> Decimal {
        let position = self
            .positions
            .entry(instrument_id.clone())
            .or_insert_with(NetPosition::flat);
        let realized = position.apply(fill_qty, price);
        self.updated_at = Utc::now();
        realized
    }

    /// Recompute the margin snapshot from the full position set.
    ///
    /// Always from scratch - margin must never drift from what a clean
    /// recomputation over all positions would produce.
    pub fn recompute_margin(&mut self, im_rate: Decimal, mm_rate: Decimal) {
        let exposure = self.net_notional_exposure();
        let initial_margin = exposure * im_rate;
        self.last_margin_snapshot = MarginSnapshot {
            initial_margin,
            maintenance_margin: exposure * mm_rate,
            free_collateral: self.equity - initial_margin,
        };
        self.updated_at = Utc::now();
    }

    /// Zero out every position, keeping equity
    pub fn reset_exposure(&mut self) {
        self.positions.clear();
        self.last_margin_snapshot = MarginSnapshot::flat(self.equity);
        self.updated_at = Utc::now();
    }

    pub fn free_collateral(&self) -> Decimal {
        self.last_margin_snapshot.free_collateral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_and_extend() {
        let mut position = NetPosition::flat();

        assert_eq!(position.apply(dec!(10), dec!(100)), Decimal::ZERO);
        assert_eq!(position.qty, dec!(10));
        assert_eq!(position.avg_entry_price, dec!(100));

        // Extend at a worse price - entry averages up
        assert_eq!(position.apply(dec!(10), dec!(110)), Decimal::ZERO);
        assert_eq!(position.qty, dec!(20));
        assert_eq!(position.avg_entry_price, dec!(105));
    }

    #[test]
    fn test_partial_close_realizes_pnl() {
        let mut position = NetPosition::flat();
        position.apply(dec!(10), dec!(100));

        let realized = position.apply(dec!(-4), dec!(110));
        assert_eq!(realized, dec!(40)); // (110-100) * 4
        assert_eq!(position.qty, dec!(6));
        assert_eq!(position.avg_entry_price, dec!(100)); // remainder keeps entry
    }

    #[test]
    fn test_short_close_realizes_pnl() {
        let mut position = NetPosition::flat();
        position.apply(dec!(-10), dec!(100));

        // Short profits when price falls
        let realized = position.apply(dec!(5), dec!(90));
        assert_eq!(realized, dec!(50)); // (90-100) * 5 * -1
        assert_eq!(position.qty, dec!(-5));
    }

    #[test]
    fn test_flip_through_flat() {
        let mut position = NetPosition::flat();
        position.apply(dec!(5), dec!(100));

        let realized = position.apply(dec!(-8), dec!(104));
        assert_eq!(realized, dec!(20)); // closed 5 at +4 each
        assert_eq!(position.qty, dec!(-3));
        assert_eq!(position.avg_entry_price, dec!(104)); // remainder opened at fill
    }

    #[test]
    fn test_offsetting_fills_net_to_flat() {
        let mut portfolio = Portfolio::new("alice", dec!(10000));
        let instrument = InstrumentId::new("BTC-PERP");

        // Buy on one venue, sell the same qty on another
        portfolio.apply_signed_fill(&instrument, dec!(10), dec!(100));
        portfolio.apply_signed_fill(&instrument, dec!(-10), dec!(100));

        assert_eq!(portfolio.net_position(&instrument), Decimal::ZERO);
        assert_eq!(portfolio.net_notional_exposure(), Decimal::ZERO);

        portfolio.recompute_margin(dec!(0.10), dec!(0.05));
        assert_eq!(portfolio.last_margin_snapshot.initial_margin, Decimal::ZERO);
        assert_eq!(portfolio.free_collateral(), dec!(10000));
    }

    #[test]
    fn test_margin_on_net_exposure() {
        let mut portfolio = Portfolio::new("alice", dec!(10000));
        let instrument = InstrumentId::new("BTC-PERP");

        portfolio.apply_signed_fill(&instrument, dec!(10), dec!(100));
        portfolio.recompute_margin(dec!(0.10), dec!(0.05));

        // |10| * 100 = 1000 notional
        assert_eq!(portfolio.last_margin_snapshot.initial_margin, dec!(100));
        assert_eq!(portfolio.last_margin_snapshot.maintenance_margin, dec!(50));
        assert_eq!(portfolio.free_collateral(), dec!(9900));
    }

    #[test]
    fn test_reset_exposure_keeps_equity() {
        let mut portfolio = Portfolio::new("alice", dec!(10000));
        portfolio.apply_signed_fill(&InstrumentId::new("BTC-PERP"), dec!(10), dec!(100));
        portfolio.reset_exposure();

        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.equity, dec!(10000));
        assert_eq!(portfolio.free_collateral(), dec!(10000));
    }
}
