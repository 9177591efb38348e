use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::side::Side;
use crate::instruments::VenueId;
use crate::values::{Price, Quantity};

/// One venue's share of an execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLeg {
    /// Venue this leg executes on
    pub venue_id: VenueId,

    /// Quantity allocated to this venue
    pub fill_qty: Quantity,

    /// Quoted price this allocation was made at
    pub price: Price,

    /// Notional cost excluding fees (fill_qty * price)
    pub cost: Decimal,

    /// Fee at the venue's rate (cost * fee_rate)
    pub fee: Decimal,
}

impl ExecutionLeg {
    pub fn new(venue_id: VenueId, fill_qty: Quantity, price: Price, fee_rate: Decimal) -> Self {
        let cost = fill_qty * price;
        Self {
            venue_id,
            fill_qty,
            price,
            cost,
            fee: cost * fee_rate,
        }
    }
}

/// A deterministic allocation of one logical order across venues
///
/// Produced by the allocation planner from a quote snapshot; legs are
/// ordered best price first. `total_filled + unfilled == target_qty`
/// always holds, and an unfilled remainder is data the caller inspects,
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Side of the routed order
    pub side: Side,

    /// Quantity the caller asked for
    pub target_qty: Quantity,

    /// Caller's worst acceptable price
    pub limit_price: Price,

    /// Per-venue allocations, best price first
    pub legs: Vec<ExecutionLeg>,

    /// Quantity covered by the legs
    pub total_filled: Quantity,

    /// Remainder the eligible venues could not cover
    pub unfilled: Quantity,

    /// Volume-weighted price across legs, excluding fees
    /// (ZERO when nothing filled)
    pub avg_price: Price,

    /// Total cost including every leg's fee
    pub total_cost_with_fees: Decimal,
}

impl ExecutionPlan {
    /// Plan with no legs - nothing was eligible or nothing was asked for
    pub fn empty(side: Side, target_qty: Quantity, limit_price: Price) -> Self {
        Self {
            side,
            target_qty,
            limit_price,
            legs: Vec::new(),
            total_filled: Decimal::ZERO,
            unfilled: target_qty,
            avg_price: Decimal::ZERO,
            total_cost_with_fees: Decimal::ZERO,
        }
    }

    /// Build a plan from allocated legs, computing the aggregates
    pub fn from_legs(
        side: Side,
        target_qty: Quantity,
        limit_price: Price,
        legs: Vec<ExecutionLeg>,
    ) -> Self {
        let total_filled: Quantity = legs.iter().map(|l| l.fill_qty).sum();
        let total_cost: Decimal = legs.iter().map(|l| l.cost).sum();
        let total_fees: Decimal = legs.iter().map(|l| l.fee).sum();

        let avg_price = if total_filled > Decimal::ZERO {
            total_cost / total_filled
        } else {
            Decimal::ZERO
        };

        Self {
            side,
            target_qty,
            limit_price,
            legs,
            total_filled,
            unfilled: target_qty - total_filled,
            avg_price,
            total_cost_with_fees: total_cost + total_fees,
        }
    }

    /// Whether the plan covers the full target quantity
    pub fn is_fully_filled(&self) -> bool {
        self.unfilled.is_zero()
    }

    /// Whether no venue was eligible at all
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Total fees across legs
    pub fn total_fees(&self) -> Decimal {
        self.legs.iter().map(|l| l.fee).sum()
    }

    /// Number of venues participating
    pub fn venue_count(&self) -> usize {
        self.legs.len()
    }
}
