//! Smart Order Router facade
//!
//! Wires the aggregator, planner, ledger and coordinator into the one
//! call the rest of the application consumes: [`SmartOrderRouter::route`].
//! Also exposes the single-venue reserve/commit path for callers that
//! want to hold a reservation open and decide later.

use log::{info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use hermes_core::{
    FillReceipt, InstrumentId, OrderType, Price, Quantity, Side, VenueId,
};
use hermes_ledger::{HypotheticalFill, PortfolioLedger};
use hermes_ports::{Clock, VenueClient};

use crate::aggregator::{AggregatorConfig, QuoteAggregator, QuoteSnapshot};
use crate::coordinator::{CoordinatorConfig, HoldHandle, ReservationCoordinator};
use crate::error::{Result, RouteError};
use crate::planner::AllocationPlanner;

/// Router configuration
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub aggregator: AggregatorConfig,
    pub coordinator: CoordinatorConfig,
}

/// One logical order to route across venues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Account the fills settle into
    pub owner: String,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub target_qty: Quantity,
    /// Worst acceptable price (for market orders, the side's extreme)
    pub limit_price: Price,
    /// Hold TTL requested from the venues, in milliseconds
    pub ttl_ms: u64,
}

impl RouteRequest {
    /// A limit order: execute at or better than `limit_price`
    pub fn limit(
        owner: impl Into<String>,
        instrument_id: InstrumentId,
        side: Side,
        target_qty: Quantity,
        limit_price: Price,
        ttl_ms: u64,
    ) -> Self {
        Self {
            owner: owner.into(),
            instrument_id,
            side,
            order_type: OrderType::Limit,
            target_qty,
            limit_price,
            ttl_ms,
        }
    }

    /// A market order: no price cap beyond the side's extreme
    pub fn market(
        owner: impl Into<String>,
        instrument_id: InstrumentId,
        side: Side,
        target_qty: Quantity,
        ttl_ms: u64,
    ) -> Self {
        let limit_price = match side {
            Side::Buy => Decimal::MAX,
            Side::Sell => Decimal::ZERO,
        };
        Self {
            owner: owner.into(),
            instrument_id,
            side,
            order_type: OrderType::Market,
            target_qty,
            limit_price,
            ttl_ms,
        }
    }
}

/// The aggregated outcome of one routing call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub route_id: Uuid,
    pub filled_qty: Quantity,
    /// Volume-weighted price across the committed legs, excluding fees
    pub avg_price: Price,
    pub total_fees: Decimal,
    /// Remainder the eligible venues could not cover (data, not an error)
    pub unfilled_qty: Quantity,
    pub legs: Vec<FillReceipt>,
}

impl ExecutionResult {
    /// Aggregate committed receipts into the caller-facing result
    pub fn from_receipts(
        route_id: Uuid,
        target_qty: Quantity,
        legs: Vec<FillReceipt>,
    ) -> Self {
        let filled_qty: Quantity = legs.iter().map(|r| r.filled_qty).sum();
        let total_notional: Decimal = legs.iter().map(|r| r.notional).sum();
        let total_fees: Decimal = legs.iter().map(|r| r.fee).sum();
        let avg_price = if filled_qty > Decimal::ZERO {
            total_notional / filled_qty
        } else {
            Decimal::ZERO
        };
        Self {
            route_id,
            filled_qty,
            avg_price,
            total_fees,
            unfilled_qty: target_qty - filled_qty,
            legs,
        }
    }
}

/// Routes one logical order across independent venues under an
/// all-or-nothing reservation guarantee
pub struct SmartOrderRouter {
    venues: HashMap<VenueId, Arc<dyn VenueClient>>,
    aggregator: QuoteAggregator,
    planner: AllocationPlanner,
    coordinator: ReservationCoordinator,
    ledger: Arc<PortfolioLedger>,
}

impl SmartOrderRouter {
    pub fn new(
        venues: Vec<Arc<dyn VenueClient>>,
        ledger: Arc<PortfolioLedger>,
        clock: Arc<dyn Clock>,
        config: RouterConfig,
    ) -> Self {
        let venue_map = venues
            .iter()
            .map(|v| (v.venue_id().clone(), v.clone()))
            .collect();
        Self {
            venues: venue_map,
            aggregator: QuoteAggregator::new(venues, clock.clone(), config.aggregator),
            planner: AllocationPlanner::new(),
            coordinator: ReservationCoordinator::new(clock, config.coordinator),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<PortfolioLedger> {
        &self.ledger
    }

    /// The last quote snapshot the aggregator took
    pub fn latest_quotes(&self) -> Option<Arc<QuoteSnapshot>> {
        self.aggregator.latest_snapshot()
    }

    /// Route one logical order: aggregate quotes, plan the allocation,
    /// gate on margin, reserve and commit every leg, settle the fills.
    ///
    /// A partial fill (eligible liquidity below `target_qty`) is routed
    /// for the available portion and reported through `unfilled_qty`.
    pub async fn route(&self, request: RouteRequest) -> Result<ExecutionResult> {
        if request.target_qty <= Decimal::ZERO {
            return Err(RouteError::InvalidRequest(format!(
                "non-positive target_qty {}",
                request.target_qty
            )));
        }
        if request.ttl_ms == 0 {
            return Err(RouteError::InvalidRequest("zero ttl_ms".to_string()));
        }

        let route_id = Uuid::new_v4();
        info!(
            "[ROUTE {}] {} {} {} {} limit {} (owner {})",
            route_id,
            request.order_type,
            request.side,
            request.target_qty,
            request.instrument_id,
            request.limit_price,
            request.owner
        );

        let quotes = self
            .aggregator
            .aggregate(&request.instrument_id, request.side)
            .await;
        let plan = self.planner.plan(
            request.side,
            request.target_qty,
            request.limit_price,
            &quotes,
        );
        if plan.is_empty() {
            warn!(
                "[ROUTE {}] no venue eligible at limit {} ({} quoted)",
                route_id,
                request.limit_price,
                quotes.len()
            );
            return Err(RouteError::PriceLimitViolation {
                limit_price: request.limit_price,
            });
        }

        // Pre-trade risk gate: nothing is reserved unless the full
        // post-trade position set fits the owner's collateral
        let preview = self.ledger.preview_margin(
            &request.owner,
            &HypotheticalFill::new(
                request.instrument_id.clone(),
                request.side,
                plan.total_filled,
                plan.avg_price,
            ),
        );
        if !preview.ok {
            return Err(RouteError::MarginInsufficient {
                required: preview.required_initial_margin,
                free_collateral: self.ledger.portfolio(&request.owner).free_collateral(),
            });
        }

        let receipts = self
            .coordinator
            .execute_atomic(
                route_id,
                &self.venues,
                &request.instrument_id,
                &plan,
                request.ttl_ms,
            )
            .await?;

        // Post-trade update: net every fill into the owner's book
        for receipt in &receipts {
            self.ledger
                .apply_fill(&request.owner, receipt)
                .map_err(|e| RouteError::InvalidRequest(e.to_string()))?;
        }

        let result = ExecutionResult::from_receipts(route_id, request.target_qty, receipts);
        info!(
            "[ROUTE {}] done: filled {} @ avg {} across {} venue(s), unfilled {}",
            route_id,
            result.filled_qty,
            result.avg_price,
            result.legs.len(),
            result.unfilled_qty
        );
        Ok(result)
    }

    /// Single-venue mode: reserve at one venue and hand the hold to the
    /// caller. Weaker guarantee than [`Self::route`]: the caller owns
    /// the window between reserve and commit and may observe expiry.
    pub async fn reserve_at(
        &self,
        venue_id: &VenueId,
        instrument_id: &InstrumentId,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        ttl_ms: u64,
    ) -> Result<HoldHandle> {
        let venue = self
            .venues
            .get(venue_id)
            .ok_or_else(|| RouteError::InvalidRequest(format!("unknown venue {}", venue_id)))?
            .clone();
        self.coordinator
            .reserve(venue, instrument_id, side, qty, limit_price, ttl_ms)
            .await
    }

    /// Commit a single-venue hold and settle the fill for `owner`.
    ///
    /// Re-runs the margin gate against the owner's current book first;
    /// the hold is left pending on a refusal so the caller can cancel.
    pub async fn commit_at(&self, owner: &str, handle: &HoldHandle) -> Result<FillReceipt> {
        let hold = handle.hold();
        let preview = self.ledger.preview_margin(
            owner,
            &HypotheticalFill::new(
                handle.instrument_id().clone(),
                hold.side,
                hold.qty,
                handle.reservation().vwap_price,
            ),
        );
        if !preview.ok {
            return Err(RouteError::MarginInsufficient {
                required: preview.required_initial_margin,
                free_collateral: self.ledger.portfolio(owner).free_collateral(),
            });
        }

        let receipt = handle.commit().await?;
        self.ledger
            .apply_fill(owner, &receipt)
            .map_err(|e| RouteError::InvalidRequest(e.to_string()))?;
        Ok(receipt)
    }
}
