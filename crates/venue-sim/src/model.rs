//! Simulator state: depth ladders, holds, configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use hermes_core::{Hold, HoldId, InstrumentId, Price, Quantity, Side, VenueId};

/// One price level of a depth ladder
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLevel {
    pub price: Price,
    pub qty: Quantity,
}

impl DepthLevel {
    pub fn new(price: Price, qty: Quantity) -> Self {
        Self { price, qty }
    }
}

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimVenueConfig {
    /// Venue identity
    pub venue_id: VenueId,
    /// Proportional fee on notional
    pub fee_rate: Decimal,
    /// Smallest tradable quantity step
    pub min_increment: Quantity,
    /// Artificial delay before answering quotes (latency injection)
    pub quote_latency: Option<std::time::Duration>,
}

impl SimVenueConfig {
    pub fn new(venue_id: impl Into<String>) -> Self {
        Self {
            venue_id: VenueId::new(venue_id),
            fee_rate: dec!(0.001),
            min_increment: dec!(1),
            quote_latency: None,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_min_increment(mut self, min_increment: Quantity) -> Self {
        self.min_increment = min_increment;
        self
    }

    pub fn with_quote_latency(mut self, latency: std::time::Duration) -> Self {
        self.quote_latency = Some(latency);
        self
    }
}

/// Both sides of one instrument's book, as depth ladders
///
/// Asks are sorted ascending (what a buyer consumes), bids descending
/// (what a seller consumes).
#[derive(Debug, Default)]
pub(crate) struct Book {
    pub asks: Vec<DepthLevel>,
    pub bids: Vec<DepthLevel>,
}

impl Book {
    /// Ladder a taker on `side` executes against
    pub fn ladder(&self, side: Side) -> &Vec<DepthLevel> {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    pub fn ladder_mut(&mut self, side: Side) -> &mut Vec<DepthLevel> {
        match side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        }
    }

    /// Re-sort and merge duplicate price levels after a refund
    pub fn normalize(&mut self, side: Side) {
        let ladder = self.ladder_mut(side);
        match side {
            Side::Buy => ladder.sort_by(|a, b| a.price.cmp(&b.price)),
            Side::Sell => ladder.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        let mut merged: Vec<DepthLevel> = Vec::with_capacity(ladder.len());
        for level in ladder.drain(..) {
            match merged.last_mut() {
                Some(last) if last.price == level.price => last.qty += level.qty,
                _ => merged.push(level),
            }
        }
        *ladder = merged;
    }
}

/// A hold and the liquidity it earmarked, kept for refunds
#[derive(Debug)]
pub(crate) struct HoldRecord {
    pub hold: Hold,
    pub instrument_id: InstrumentId,
    /// Levels debited from the ladder at reserve time
    pub taken: Vec<DepthLevel>,
    pub vwap_price: Price,
    pub notional: Decimal,
}

/// Everything behind the simulator's single lock
#[derive(Debug, Default)]
pub(crate) struct VenueState {
    pub books: HashMap<InstrumentId, Book>,
    pub holds: HashMap<HoldId, HoldRecord>,
    pub next_hold_id: u64,
}
