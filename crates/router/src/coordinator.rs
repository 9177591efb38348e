//! Reservation Coordination
//!
//! Drives the two-phase reserve/commit protocol against the venues.
//!
//! Per-leg state machine:
//!
//! ```text
//!            reserve            commit
//!   (idle) ──────────► Pending ────────► Committed
//!                        │ │
//!                 cancel │ │ expiry (wall clock >= expires_at)
//!                        ▼ ▼
//!                Cancelled Expired        venue rejection ──► Failed
//! ```
//!
//! All states except Pending are terminal. Local state is a cache: a
//! venue may expire or reject a hold on its own, so every transition is
//! re-derived from the venue's response. The local clock only lets the
//! coordinator fail fast - it never lets it assume a hold is still good.
//!
//! Two execution modes:
//! - single-venue ([`ReservationCoordinator::reserve`]): the caller gets
//!   a [`HoldHandle`] with the venue's expiry surfaced, and may inspect,
//!   wait, cancel or commit at its own pace.
//! - multi-venue atomic ([`ReservationCoordinator::execute_atomic`]):
//!   reserve every leg, then commit every leg; any reserve failure rolls
//!   the siblings back before the caller hears about it.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use hermes_core::{
    ExecutionPlan, FillReceipt, Hold, HoldId, HoldStatus, InstrumentId, Price, Quantity,
    Reservation, Side, Timestamp, VenueId,
};
use hermes_ports::{Clock, VenueClient, VenueError};

use crate::error::{Result, RouteError};

/// Requested TTLs are capped at two minutes before reaching a venue
pub const MAX_TTL_MS: u64 = 120_000;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound applied to caller-requested TTLs
    pub max_ttl_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_ttl_ms: MAX_TTL_MS,
        }
    }
}

/// A live single-venue hold owned by the caller
///
/// Carries the local state machine for one hold plus a single
/// cancellable timer task that flips Pending to Expired at the deadline
/// (no polling). Dropping the handle aborts the timer; the venue's own
/// TTL still releases the liquidity.
pub struct HoldHandle {
    state: Arc<Mutex<Hold>>,
    reservation: Reservation,
    instrument_id: InstrumentId,
    venue: Arc<dyn VenueClient>,
    clock: Arc<dyn Clock>,
    watcher: JoinHandle<()>,
}

impl HoldHandle {
    fn new(
        reservation: Reservation,
        instrument_id: InstrumentId,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        venue: Arc<dyn VenueClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hold = Hold::from_reservation(&reservation, side, qty, limit_price, clock.now());
        let state = Arc::new(Mutex::new(hold));

        // One timer task per hold; aborted once the hold is terminal
        let watcher = {
            let state = state.clone();
            let delay = (reservation.expires_at - clock.now())
                .to_std()
                .unwrap_or_default();
            let hold_id = reservation.hold_id;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut hold = state.lock().unwrap_or_else(|e| e.into_inner());
                if hold.transition(HoldStatus::Expired) {
                    debug!("[HOLD {}] expired by timer", hold_id);
                }
            })
        };

        Self {
            state,
            reservation,
            instrument_id,
            venue,
            clock,
            watcher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Hold> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the hold
    pub fn hold(&self) -> Hold {
        self.lock().clone()
    }

    /// Current lifecycle state
    pub fn status(&self) -> HoldStatus {
        self.lock().status
    }

    pub fn hold_id(&self) -> HoldId {
        self.reservation.hold_id
    }

    /// Instrument the hold reserves liquidity in
    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    /// The venue's reserve response, including worst price and the
    /// charge ceiling
    pub fn reservation(&self) -> &Reservation {
        &self.reservation
    }

    /// When the venue will release this hold on its own
    pub fn expires_at(&self) -> Timestamp {
        self.reservation.expires_at
    }

    /// Execute the hold.
    ///
    /// Checks the local clock against `expires_at` first, to avoid a
    /// wasted round trip on a hold that is already dead - but the
    /// venue's response stays authoritative: a venue-side expiry maps to
    /// the same `ReservationExpired` outcome.
    pub async fn commit(&self) -> Result<FillReceipt> {
        {
            let mut hold = self.lock();
            match hold.status {
                HoldStatus::Pending => {
                    if hold.is_expired_at(self.clock.now()) {
                        hold.transition(HoldStatus::Expired);
                        return Err(RouteError::ReservationExpired {
                            venue_id: hold.venue_id.clone(),
                        });
                    }
                }
                HoldStatus::Expired => {
                    return Err(RouteError::ReservationExpired {
                        venue_id: hold.venue_id.clone(),
                    });
                }
                other => {
                    return Err(RouteError::InvalidRequest(format!(
                        "commit on hold {} in terminal state {:?}",
                        hold.hold_id, other
                    )));
                }
            }
        }

        match self.venue.commit(self.reservation.hold_id).await {
            Ok(receipt) => {
                self.lock().transition(HoldStatus::Committed);
                self.watcher.abort();
                info!(
                    "[HOLD {}] committed on {}: {} @ {}",
                    receipt.hold_id, receipt.venue_id, receipt.filled_qty, receipt.vwap_price
                );
                Ok(receipt)
            }
            Err(err) => {
                let status = match &err {
                    VenueError::HoldExpired { .. } => HoldStatus::Expired,
                    _ => HoldStatus::Failed,
                };
                self.lock().transition(status);
                self.watcher.abort();
                Err(RouteError::from_commit_failure(err))
            }
        }
    }

    /// Release the hold. Idempotent: cancelling a hold that is already
    /// terminal is a no-op acknowledgement, not an error.
    pub async fn cancel(&self) -> Result<()> {
        if self.lock().status.is_terminal() {
            return Ok(());
        }

        match self.venue.cancel(self.reservation.hold_id).await {
            Ok(()) => {
                self.lock().transition(HoldStatus::Cancelled);
                self.watcher.abort();
                Ok(())
            }
            Err(err) => {
                // Hold stays pending; the venue's TTL will release it
                warn!(
                    "[HOLD {}] cancel failed, leaving to venue TTL: {}",
                    self.reservation.hold_id, err
                );
                Err(RouteError::from_reserve_failure(err))
            }
        }
    }
}

impl Drop for HoldHandle {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// A reserved leg of a multi-venue execution, internal to the atomic path
struct ReservedLeg {
    venue: Arc<dyn VenueClient>,
    reservation: Reservation,
}

/// Drives reserve/commit/cancel across one or many venues
pub struct ReservationCoordinator {
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl ReservationCoordinator {
    pub fn new(clock: Arc<dyn Clock>, config: CoordinatorConfig) -> Self {
        Self { clock, config }
    }

    fn cap_ttl(&self, ttl_ms: u64) -> u64 {
        ttl_ms.min(self.config.max_ttl_ms)
    }

    /// Single-venue mode: reserve and hand the hold to the caller.
    ///
    /// The caller may wait, inspect or cancel before committing; a
    /// commit attempted after expiry fails deterministically with
    /// `ReservationExpired`.
    pub async fn reserve(
        &self,
        venue: Arc<dyn VenueClient>,
        instrument_id: &InstrumentId,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        ttl_ms: u64,
    ) -> Result<HoldHandle> {
        let ttl_ms = self.cap_ttl(ttl_ms);
        let reservation = venue
            .reserve(instrument_id, side, qty, limit_price, ttl_ms)
            .await
            .map_err(RouteError::from_reserve_failure)?;

        info!(
            "[HOLD {}] reserved on {}: {} {} @ vwap {} (expires {})",
            reservation.hold_id,
            reservation.venue_id,
            side,
            qty,
            reservation.vwap_price,
            reservation.expires_at
        );
        Ok(HoldHandle::new(
            reservation,
            instrument_id.clone(),
            side,
            qty,
            limit_price,
            venue,
            self.clock.clone(),
        ))
    }

    /// Multi-venue atomic mode: reserve every leg of the plan, then
    /// commit every leg.
    ///
    /// If any reserve fails, every already-reserved sibling is cancelled
    /// (concurrently, best-effort) before the failure is reported - no
    /// leg is left pending. If a commit fails after at least one sibling
    /// committed, the partial execution is surfaced as
    /// [`RouteError::PartialExecutionConflict`] with the committed
    /// receipts attached; independent venues cannot be rolled back.
    pub async fn execute_atomic(
        &self,
        route_id: Uuid,
        venues: &HashMap<VenueId, Arc<dyn VenueClient>>,
        instrument_id: &InstrumentId,
        plan: &ExecutionPlan,
        ttl_ms: u64,
    ) -> Result<Vec<FillReceipt>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let ttl_ms = self.cap_ttl(ttl_ms);

        // Resolve every client up front; an unknown venue is a caller bug
        let mut clients = Vec::with_capacity(plan.legs.len());
        for leg in &plan.legs {
            let client = venues.get(&leg.venue_id).ok_or_else(|| {
                RouteError::InvalidRequest(format!("unknown venue {}", leg.venue_id))
            })?;
            clients.push(client.clone());
        }

        // Phase 1: reserve every leg concurrently
        let mut set = JoinSet::new();
        for (leg, client) in plan.legs.iter().zip(clients.iter()) {
            let client = client.clone();
            let instrument_id = instrument_id.clone();
            let side = plan.side;
            let qty = leg.fill_qty;
            let limit_price = plan.limit_price;
            set.spawn(async move {
                let outcome = client
                    .reserve(&instrument_id, side, qty, limit_price, ttl_ms)
                    .await;
                (client, outcome)
            });
        }

        let mut reserved: Vec<ReservedLeg> = Vec::with_capacity(plan.legs.len());
        let mut reserve_failure: Option<VenueError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((venue, Ok(reservation))) => {
                    debug!(
                        "[ROUTE {}] reserved hold {} on {}",
                        route_id, reservation.hold_id, reservation.venue_id
                    );
                    reserved.push(ReservedLeg { venue, reservation });
                }
                Ok((venue, Err(err))) => {
                    warn!(
                        "[ROUTE {}] reserve failed on {}: {}",
                        route_id,
                        venue.venue_id(),
                        err
                    );
                    reserve_failure.get_or_insert(err);
                }
                Err(join_err) => {
                    warn!("[ROUTE {}] reserve task failed: {}", route_id, join_err);
                    reserve_failure.get_or_insert(VenueError::Internal {
                        venue_id: unattributed_venue(),
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        if let Some(err) = reserve_failure {
            // Compensating rollback: no leg may stay pending
            info!(
                "[ROUTE {}] rolling back {} reserved leg(s)",
                route_id,
                reserved.len()
            );
            Self::cancel_best_effort(route_id, &reserved).await;
            return Err(RouteError::from_reserve_failure(err));
        }

        // Fail fast on holds the local clock already considers dead; the
        // venue would refuse the commit anyway
        let now = self.clock.now();
        if let Some(dead) = reserved.iter().find(|l| now >= l.reservation.expires_at) {
            let venue_id = dead.reservation.venue_id.clone();
            Self::cancel_best_effort(route_id, &reserved).await;
            return Err(RouteError::ReservationExpired { venue_id });
        }

        // Phase 2: commit every leg concurrently
        let mut set = JoinSet::new();
        for leg in &reserved {
            let venue = leg.venue.clone();
            let hold_id = leg.reservation.hold_id;
            set.spawn(async move {
                let outcome = venue.commit(hold_id).await;
                (venue, hold_id, outcome)
            });
        }

        let mut receipts: Vec<FillReceipt> = Vec::with_capacity(reserved.len());
        let mut failed: Vec<(Arc<dyn VenueClient>, HoldId, VenueError)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, _, Ok(receipt))) => receipts.push(receipt),
                Ok((venue, hold_id, Err(err))) => {
                    warn!(
                        "[ROUTE {}] commit failed for hold {} on {}: {}",
                        route_id,
                        hold_id,
                        venue.venue_id(),
                        err
                    );
                    failed.push((venue, hold_id, err));
                }
                Err(join_err) => {
                    // The commit outcome is unknown; surface loudly below
                    error!("[ROUTE {}] commit task failed: {}", route_id, join_err);
                }
            }
        }
        receipts.sort_by(|a, b| a.venue_id.cmp(&b.venue_id));

        if failed.is_empty() {
            info!(
                "[ROUTE {}] committed {} leg(s) atomically",
                route_id,
                receipts.len()
            );
            return Ok(receipts);
        }

        // Best-effort release of the failed legs: a transport-failed
        // commit may have left its hold pending at the venue
        let to_cancel: Vec<ReservedLeg> = failed
            .iter()
            .filter_map(|(venue, hold_id, _)| {
                reserved
                    .iter()
                    .find(|l| l.reservation.hold_id == *hold_id && l.venue.venue_id() == venue.venue_id())
                    .map(|l| ReservedLeg {
                        venue: l.venue.clone(),
                        reservation: l.reservation.clone(),
                    })
            })
            .collect();
        Self::cancel_best_effort(route_id, &to_cancel).await;

        if receipts.is_empty() {
            // Clean failure: nothing executed, nothing left pending
            let (_, _, first) = failed.swap_remove(0);
            return Err(RouteError::from_commit_failure(first));
        }

        // Partial execution across independent venues: cannot be undone
        // here. Surface distinctly and loudly for reconciliation.
        let failed_venues: Vec<VenueId> = failed
            .iter()
            .map(|(venue, _, _)| venue.venue_id().clone())
            .collect();
        error!(
            "[ROUTE {}] PARTIAL EXECUTION CONFLICT: {} leg(s) committed, {} failed ({:?}) - manual reconciliation required",
            route_id,
            receipts.len(),
            failed_venues.len(),
            failed_venues
        );
        Err(RouteError::PartialExecutionConflict {
            route_id,
            committed: receipts,
            failed: failed_venues,
        })
    }

    /// Cancel reserved legs concurrently. Best-effort: a failed cancel
    /// is logged and left to the venue's own TTL, never blocking the
    /// overall outcome.
    async fn cancel_best_effort(route_id: Uuid, legs: &[ReservedLeg]) {
        let mut set = JoinSet::new();
        for leg in legs {
            let venue = leg.venue.clone();
            let hold_id = leg.reservation.hold_id;
            set.spawn(async move {
                let outcome = venue.cancel(hold_id).await;
                (venue, hold_id, outcome)
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, hold_id, Ok(()))) => {
                    debug!("[ROUTE {}] cancelled hold {}", route_id, hold_id);
                }
                Ok((venue, hold_id, Err(err))) => {
                    warn!(
                        "[ROUTE {}] cancel of hold {} on {} failed (venue TTL will release it): {}",
                        route_id,
                        hold_id,
                        venue.venue_id(),
                        err
                    );
                }
                Err(join_err) => {
                    warn!("[ROUTE {}] cancel task failed: {}", route_id, join_err);
                }
            }
        }
    }
}

/// Placeholder venue id for failures that cannot be attributed to a
/// venue (task-level join errors)
fn unattributed_venue() -> VenueId {
    VenueId::new("<unknown>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hermes_clock::ManualClock;
    use rust_decimal_macros::dec;
    use venue_sim::{DepthLevel, SimVenue, SimVenueConfig};

    fn instrument() -> InstrumentId {
        InstrumentId::new("BTC-PERP")
    }

    async fn make_venue(name: &str, clock: Arc<dyn Clock>) -> Arc<SimVenue> {
        let venue = Arc::new(SimVenue::new(
            SimVenueConfig::new(name).with_fee_rate(dec!(0.01)),
            clock,
        ));
        venue
            .load_depth(
                instrument(),
                vec![DepthLevel::new(dec!(100), dec!(10))],
                vec![DepthLevel::new(dec!(99), dec!(10))],
            )
            .await;
        venue
    }

    fn coordinator(clock: &ManualClock) -> ReservationCoordinator {
        ReservationCoordinator::new(Arc::new(clock.clone()), CoordinatorConfig::default())
    }

    #[tokio::test]
    async fn test_single_venue_reserve_then_commit() {
        let clock = ManualClock::starting_now();
        let venue = make_venue("alpha", Arc::new(clock.clone())).await;
        let coordinator = coordinator(&clock);

        let handle = coordinator
            .reserve(venue.clone(), &instrument(), Side::Buy, dec!(5), dec!(100), 1000)
            .await
            .unwrap();
        assert_eq!(handle.status(), HoldStatus::Pending);
        assert_eq!(handle.expires_at(), clock.now() + Duration::milliseconds(1000));

        let receipt = handle.commit().await.unwrap();
        assert_eq!(receipt.filled_qty, dec!(5));
        assert_eq!(handle.status(), HoldStatus::Committed);
    }

    #[tokio::test]
    async fn test_commit_after_expiry_fails_without_round_trip() {
        let clock = ManualClock::starting_now();
        let venue = make_venue("alpha", Arc::new(clock.clone())).await;
        let coordinator = coordinator(&clock);

        let handle = coordinator
            .reserve(venue.clone(), &instrument(), Side::Buy, dec!(5), dec!(100), 1000)
            .await
            .unwrap();

        clock.advance(Duration::milliseconds(1100));
        let result = handle.commit().await;
        assert!(matches!(result, Err(RouteError::ReservationExpired { .. })));
        assert_eq!(handle.status(), HoldStatus::Expired);

        // Deterministic: a second attempt answers the same way
        let again = handle.commit().await;
        assert!(matches!(again, Err(RouteError::ReservationExpired { .. })));
    }

    #[tokio::test]
    async fn test_handle_cancel_is_idempotent() {
        let clock = ManualClock::starting_now();
        let venue = make_venue("alpha", Arc::new(clock.clone())).await;
        let coordinator = coordinator(&clock);

        let handle = coordinator
            .reserve(venue.clone(), &instrument(), Side::Buy, dec!(5), dec!(100), 1000)
            .await
            .unwrap();

        handle.cancel().await.unwrap();
        assert_eq!(handle.status(), HoldStatus::Cancelled);
        handle.cancel().await.unwrap();
        assert_eq!(handle.status(), HoldStatus::Cancelled);

        // Commit on a cancelled hold is refused locally
        assert!(matches!(
            handle.commit().await,
            Err(RouteError::InvalidRequest(_))
        ));
        assert_eq!(venue.open_hold_count().await, 0);
    }

    #[tokio::test]
    async fn test_requested_ttl_is_capped() {
        let clock = ManualClock::starting_now();
        let venue = make_venue("alpha", Arc::new(clock.clone())).await;
        let coordinator = coordinator(&clock);

        let handle = coordinator
            .reserve(
                venue.clone(),
                &instrument(),
                Side::Buy,
                dec!(5),
                dec!(100),
                300_000, // five minutes requested
            )
            .await
            .unwrap();

        assert_eq!(
            handle.expires_at(),
            clock.now() + Duration::milliseconds(MAX_TTL_MS as i64)
        );
    }

    #[tokio::test]
    async fn test_atomic_two_legs_commit() {
        let clock = ManualClock::starting_now();
        let alpha = make_venue("alpha", Arc::new(clock.clone())).await;
        let beta = make_venue("beta", Arc::new(clock.clone())).await;
        let coordinator = coordinator(&clock);

        let venues: HashMap<VenueId, Arc<dyn VenueClient>> = HashMap::from([
            (VenueId::new("alpha"), alpha.clone() as Arc<dyn VenueClient>),
            (VenueId::new("beta"), beta.clone() as Arc<dyn VenueClient>),
        ]);
        let plan = ExecutionPlan::from_legs(
            Side::Buy,
            dec!(15),
            dec!(100),
            vec![
                hermes_core::ExecutionLeg::new(VenueId::new("alpha"), dec!(10), dec!(100), dec!(0.01)),
                hermes_core::ExecutionLeg::new(VenueId::new("beta"), dec!(5), dec!(100), dec!(0.01)),
            ],
        );

        let receipts = coordinator
            .execute_atomic(Uuid::new_v4(), &venues, &instrument(), &plan, 1000)
            .await
            .unwrap();

        assert_eq!(receipts.len(), 2);
        assert_eq!(alpha.open_hold_count().await, 0);
        assert_eq!(beta.open_hold_count().await, 0);
    }

    #[tokio::test]
    async fn test_atomic_reserve_failure_rolls_back_siblings() {
        let clock = ManualClock::starting_now();
        let alpha = make_venue("alpha", Arc::new(clock.clone())).await;
        let beta = make_venue("beta", Arc::new(clock.clone())).await;
        beta.fail_next_reserve();
        let coordinator = coordinator(&clock);

        let venues: HashMap<VenueId, Arc<dyn VenueClient>> = HashMap::from([
            (VenueId::new("alpha"), alpha.clone() as Arc<dyn VenueClient>),
            (VenueId::new("beta"), beta.clone() as Arc<dyn VenueClient>),
        ]);
        let plan = ExecutionPlan::from_legs(
            Side::Buy,
            dec!(15),
            dec!(100),
            vec![
                hermes_core::ExecutionLeg::new(VenueId::new("alpha"), dec!(10), dec!(100), dec!(0.01)),
                hermes_core::ExecutionLeg::new(VenueId::new("beta"), dec!(5), dec!(100), dec!(0.01)),
            ],
        );

        let result = coordinator
            .execute_atomic(Uuid::new_v4(), &venues, &instrument(), &plan, 1000)
            .await;

        assert!(matches!(
            result,
            Err(RouteError::ReservationRejected { .. })
        ));
        // No leg left pending anywhere
        assert_eq!(alpha.open_hold_count().await, 0);
        assert_eq!(beta.open_hold_count().await, 0);
        // Alpha's liquidity is back
        let quote = alpha.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(10));
    }

    #[tokio::test]
    async fn test_partial_commit_is_a_distinct_conflict() {
        let clock = ManualClock::starting_now();
        let alpha = make_venue("alpha", Arc::new(clock.clone())).await;
        let beta = make_venue("beta", Arc::new(clock.clone())).await;
        beta.fail_next_commit();
        let coordinator = coordinator(&clock);

        let venues: HashMap<VenueId, Arc<dyn VenueClient>> = HashMap::from([
            (VenueId::new("alpha"), alpha.clone() as Arc<dyn VenueClient>),
            (VenueId::new("beta"), beta.clone() as Arc<dyn VenueClient>),
        ]);
        let plan = ExecutionPlan::from_legs(
            Side::Buy,
            dec!(15),
            dec!(100),
            vec![
                hermes_core::ExecutionLeg::new(VenueId::new("alpha"), dec!(10), dec!(100), dec!(0.01)),
                hermes_core::ExecutionLeg::new(VenueId::new("beta"), dec!(5), dec!(100), dec!(0.01)),
            ],
        );

        let route_id = Uuid::new_v4();
        let result = coordinator
            .execute_atomic(route_id, &venues, &instrument(), &plan, 1000)
            .await;

        match result {
            Err(RouteError::PartialExecutionConflict {
                route_id: reported,
                committed,
                failed,
            }) => {
                assert_eq!(reported, route_id);
                assert_eq!(committed.len(), 1);
                assert_eq!(committed[0].venue_id, VenueId::new("alpha"));
                assert_eq!(failed, vec![VenueId::new("beta")]);
            }
            other => panic!("expected PartialExecutionConflict, got {:?}", other),
        }
        assert_eq!(beta.open_hold_count().await, 0);
    }
}
