//! Allocation Planning
//!
//! Turns a quote snapshot plus an order request into an execution plan:
//! which venues to hit, for how much, at what expected cost. Pure and
//! deterministic - no I/O, no clock, no shared state - so it is safe to
//! call from any thread without locking.
//!
//! Greedy price priority is optimal here: venues are independent and
//! there is no cross-venue quantity discount, so taking the cheapest
//! eligible unit first is never worse than any other feasible
//! allocation.

use log::debug;
use rust_decimal::Decimal;

use hermes_core::{ExecutionLeg, ExecutionPlan, Price, Quantity, Side, VenueQuote};

/// Plans the allocation of one logical order across venues
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationPlanner;

impl AllocationPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Allocate `target_qty` across the quoted venues under `limit_price`.
    ///
    /// 1. Keep quotes on the requested side that satisfy the limit
    ///    (boundary inclusive).
    /// 2. Sort by price - ascending for buys, descending for sells -
    ///    with ties broken by venue id ascending.
    /// 3. Walk the list greedily, taking
    ///    `min(remaining, available_liquidity)` from each venue, rounded
    ///    down to the venue's tradable increment.
    ///
    /// An empty or partially filled plan is a normal outcome; the caller
    /// inspects `unfilled` on the result.
    pub fn plan(
        &self,
        side: Side,
        target_qty: Quantity,
        limit_price: Price,
        quotes: &[VenueQuote],
    ) -> ExecutionPlan {
        if target_qty <= Decimal::ZERO {
            return ExecutionPlan::empty(side, target_qty, limit_price);
        }

        let mut eligible: Vec<&VenueQuote> = quotes
            .iter()
            .filter(|q| q.side == side)
            .filter(|q| q.available_liquidity > Decimal::ZERO)
            .filter(|q| side.within_limit(q.vwap_price, limit_price))
            .collect();

        eligible.sort_by(|a, b| {
            let by_price = match side {
                Side::Buy => a.vwap_price.cmp(&b.vwap_price),
                Side::Sell => b.vwap_price.cmp(&a.vwap_price),
            };
            by_price.then_with(|| a.venue_id.cmp(&b.venue_id))
        });

        let mut remaining = target_qty;
        let mut legs = Vec::new();
        for quote in eligible {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = quote.round_to_increment(remaining.min(quote.available_liquidity));
            if take <= Decimal::ZERO {
                // Remainder is below this venue's tradable increment
                continue;
            }
            legs.push(ExecutionLeg::new(
                quote.venue_id.clone(),
                take,
                quote.vwap_price,
                quote.fee_rate,
            ));
            remaining -= take;
        }

        let plan = ExecutionPlan::from_legs(side, target_qty, limit_price, legs);
        debug!(
            "[PLAN] {} {} limit {}: {} leg(s), filled {}, unfilled {}",
            side,
            target_qty,
            limit_price,
            plan.venue_count(),
            plan.total_filled,
            plan.unfilled
        );
        plan
    }
}
