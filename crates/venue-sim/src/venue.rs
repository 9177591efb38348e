//! The simulated venue

use async_trait::async_trait;
use chrono::Duration;
use log::{debug, info};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use hermes_core::{
    FillReceipt, Hold, HoldId, HoldStatus, InstrumentId, Price, Quantity, Reservation, Side,
    Timestamp, VenueId, VenueQuote,
};
use hermes_ports::{Clock, VenueClient, VenueError, VenueResult};

use crate::model::{Book, DepthLevel, HoldRecord, SimVenueConfig, VenueState};

/// An in-process venue with a depth ladder per instrument and
/// TTL-bounded holds
pub struct SimVenue {
    config: SimVenueConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<VenueState>,
    fail_next_reserve: AtomicBool,
    fail_next_commit: AtomicBool,
    offline: AtomicBool,
}

impl SimVenue {
    pub fn new(config: SimVenueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(VenueState::default()),
            fail_next_reserve: AtomicBool::new(false),
            fail_next_commit: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// Replace both ladders for an instrument
    pub async fn load_depth(
        &self,
        instrument_id: InstrumentId,
        asks: Vec<DepthLevel>,
        bids: Vec<DepthLevel>,
    ) {
        let mut state = self.state.write().await;
        let book = state.books.entry(instrument_id).or_default();
        book.asks = asks;
        book.bids = bids;
        book.normalize(Side::Buy);
        book.normalize(Side::Sell);
    }

    /// Make the next reserve call fail with a rejection
    pub fn fail_next_reserve(&self) {
        self.fail_next_reserve.store(true, Ordering::SeqCst);
    }

    /// Make the next commit call fail with a venue-internal error
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Take the venue off the network: every call answers Unavailable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of holds still pending (expired-but-untouched holds are
    /// swept first)
    pub async fn open_hold_count(&self) -> usize {
        let mut state = self.state.write().await;
        Self::expire_due(&mut state, self.clock.now());
        state
            .holds
            .values()
            .filter(|r| r.hold.status == HoldStatus::Pending)
            .count()
    }

    /// Lifecycle state of a hold, if the venue still knows it
    pub async fn hold_status(&self, hold_id: HoldId) -> Option<HoldStatus> {
        let state = self.state.read().await;
        state.holds.get(&hold_id).map(|r| r.hold.status)
    }

    fn ensure_online(&self) -> VenueResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(VenueError::Unavailable(self.config.venue_id.clone()));
        }
        Ok(())
    }

    /// Sweep holds whose TTL elapsed, refunding their liquidity.
    /// Expiry is applied lazily, on the next touch of venue state.
    fn expire_due(state: &mut VenueState, now: Timestamp) {
        let due: Vec<HoldId> = state
            .holds
            .iter()
            .filter(|(_, r)| r.hold.status == HoldStatus::Pending && r.hold.is_expired_at(now))
            .map(|(id, _)| *id)
            .collect();
        for hold_id in due {
            Self::release(state, hold_id, HoldStatus::Expired);
        }
    }

    /// Transition a pending hold to a terminal released state and refund
    /// its earmarked liquidity
    fn release(state: &mut VenueState, hold_id: HoldId, to: HoldStatus) {
        let Some(record) = state.holds.get_mut(&hold_id) else {
            return;
        };
        if !record.hold.transition(to) {
            return;
        }
        let instrument_id = record.instrument_id.clone();
        let side = record.hold.side;
        let taken = std::mem::take(&mut record.taken);

        if let Some(book) = state.books.get_mut(&instrument_id) {
            book.ladder_mut(side).extend(taken);
            book.normalize(side);
        }
        debug!("[SIM] hold {} released as {:?}", hold_id, to);
    }
}

#[async_trait]
impl VenueClient for SimVenue {
    fn venue_id(&self) -> &VenueId {
        &self.config.venue_id
    }

    async fn quote(
        &self,
        instrument_id: &InstrumentId,
        side: Side,
        depth_hint: Quantity,
    ) -> VenueResult<VenueQuote> {
        self.ensure_online()?;
        if let Some(latency) = self.config.quote_latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.read().await;
        let empty = Book::default();
        let book = state.books.get(instrument_id).unwrap_or(&empty);
        let ladder = book.ladder(side);

        let available: Quantity = ladder.iter().map(|l| l.qty).sum();

        // VWAP over the hinted depth (or everything, if shallower)
        let depth = if depth_hint > Decimal::ZERO {
            depth_hint.min(available)
        } else {
            available
        };
        let mut remaining = depth;
        let mut cost = Decimal::ZERO;
        for level in ladder {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(level.qty);
            cost += take * level.price;
            remaining -= take;
        }
        let vwap_price = if depth > Decimal::ZERO {
            cost / depth
        } else {
            Decimal::ZERO
        };

        Ok(VenueQuote::new(
            self.config.venue_id.clone(),
            side,
            vwap_price,
            available,
            self.config.fee_rate,
            self.config.min_increment,
            self.clock.now(),
        ))
    }

    async fn reserve(
        &self,
        instrument_id: &InstrumentId,
        side: Side,
        qty: Quantity,
        limit_price: Price,
        ttl_ms: u64,
    ) -> VenueResult<Reservation> {
        self.ensure_online()?;
        if qty <= Decimal::ZERO {
            return Err(VenueError::InvalidRequest {
                venue_id: self.config.venue_id.clone(),
                reason: format!("non-positive qty {}", qty),
            });
        }
        if self.fail_next_reserve.swap(false, Ordering::SeqCst) {
            return Err(VenueError::ReserveRejected {
                venue_id: self.config.venue_id.clone(),
                reason: "injected reserve failure".to_string(),
            });
        }

        let now = self.clock.now();
        let mut state = self.state.write().await;
        Self::expire_due(&mut state, now);

        let book = state.books.entry(instrument_id.clone()).or_default();
        let ladder = book.ladder_mut(side);

        // Eligible levels are a best-first prefix of the ladder
        let eligible: Quantity = ladder
            .iter()
            .take_while(|l| side.within_limit(l.price, limit_price))
            .map(|l| l.qty)
            .sum();
        if eligible < qty {
            return Err(VenueError::ReserveRejected {
                venue_id: self.config.venue_id.clone(),
                reason: format!(
                    "insufficient liquidity within limit: {} available, {} requested",
                    eligible, qty
                ),
            });
        }

        // Debit exactly qty, best levels first
        let mut remaining = qty;
        let mut taken = Vec::new();
        let mut cost = Decimal::ZERO;
        let mut worst_price = Decimal::ZERO;
        for level in ladder.iter_mut() {
            if remaining.is_zero() {
                break;
            }
            let take = remaining.min(level.qty);
            level.qty -= take;
            remaining -= take;
            cost += take * level.price;
            worst_price = level.price;
            taken.push(DepthLevel::new(level.price, take));
        }
        ladder.retain(|l| l.qty > Decimal::ZERO);

        let vwap_price = cost / qty;
        let hold_id = HoldId(state.next_hold_id);
        state.next_hold_id += 1;
        let expires_at = now + Duration::milliseconds(ttl_ms as i64);

        let reservation = Reservation {
            hold_id,
            venue_id: self.config.venue_id.clone(),
            vwap_price,
            worst_price,
            max_charge: cost * (Decimal::ONE + self.config.fee_rate),
            expires_at,
        };
        let hold = Hold::from_reservation(&reservation, side, qty, limit_price, now);
        state.holds.insert(
            hold_id,
            HoldRecord {
                hold,
                instrument_id: instrument_id.clone(),
                taken,
                vwap_price,
                notional: cost,
            },
        );

        info!(
            "[SIM] {} reserved hold {}: {} {} @ vwap {} (expires {})",
            self.config.venue_id, hold_id, side, qty, vwap_price, expires_at
        );
        Ok(reservation)
    }

    async fn commit(&self, hold_id: HoldId) -> VenueResult<FillReceipt> {
        self.ensure_online()?;

        let now = self.clock.now();
        let mut state = self.state.write().await;
        Self::expire_due(&mut state, now);

        let status = match state.holds.get(&hold_id) {
            Some(record) => record.hold.status,
            None => {
                return Err(VenueError::HoldNotFound {
                    venue_id: self.config.venue_id.clone(),
                    hold_id,
                });
            }
        };
        match status {
            HoldStatus::Committed => {
                return Err(VenueError::AlreadyCommitted {
                    venue_id: self.config.venue_id.clone(),
                    hold_id,
                });
            }
            HoldStatus::Expired => {
                return Err(VenueError::HoldExpired {
                    venue_id: self.config.venue_id.clone(),
                    hold_id,
                });
            }
            HoldStatus::Cancelled | HoldStatus::Failed => {
                return Err(VenueError::HoldNotFound {
                    venue_id: self.config.venue_id.clone(),
                    hold_id,
                });
            }
            HoldStatus::Pending => {}
        }

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            Self::release(&mut state, hold_id, HoldStatus::Failed);
            return Err(VenueError::Internal {
                venue_id: self.config.venue_id.clone(),
                reason: "injected commit failure".to_string(),
            });
        }

        let Some(record) = state.holds.get_mut(&hold_id) else {
            return Err(VenueError::HoldNotFound {
                venue_id: self.config.venue_id.clone(),
                hold_id,
            });
        };
        record.hold.transition(HoldStatus::Committed);
        let fee = record.notional * self.config.fee_rate;
        let receipt = FillReceipt {
            hold_id,
            venue_id: self.config.venue_id.clone(),
            instrument_id: record.instrument_id.clone(),
            side: record.hold.side,
            filled_qty: record.hold.qty,
            vwap_price: record.vwap_price,
            notional: record.notional,
            fee,
            // Position pnl attribution is owned by the router's ledger
            pnl_delta: Decimal::ZERO,
            timestamp: now,
        };

        info!(
            "[SIM] {} committed hold {}: {} {} @ {}",
            self.config.venue_id, hold_id, receipt.side, receipt.filled_qty, receipt.vwap_price
        );
        Ok(receipt)
    }

    async fn cancel(&self, hold_id: HoldId) -> VenueResult<()> {
        self.ensure_online()?;

        let now = self.clock.now();
        let mut state = self.state.write().await;
        Self::expire_due(&mut state, now);

        // Idempotent: unknown or terminal holds acknowledge without error
        Self::release(&mut state, hold_id, HoldStatus::Cancelled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_clock::ManualClock;
    use rust_decimal_macros::dec;

    fn instrument() -> InstrumentId {
        InstrumentId::new("BTC-PERP")
    }

    async fn make_venue() -> (Arc<SimVenue>, ManualClock) {
        let clock = ManualClock::starting_now();
        let venue = Arc::new(SimVenue::new(
            SimVenueConfig::new("alpha").with_fee_rate(dec!(0.01)),
            Arc::new(clock.clone()),
        ));
        venue
            .load_depth(
                instrument(),
                vec![
                    DepthLevel::new(dec!(100), dec!(10)),
                    DepthLevel::new(dec!(101), dec!(5)),
                ],
                vec![DepthLevel::new(dec!(99), dec!(8))],
            )
            .await;
        (venue, clock)
    }

    #[tokio::test]
    async fn test_quote_vwap_over_depth() {
        let (venue, _clock) = make_venue().await;

        let quote = venue.quote(&instrument(), Side::Buy, dec!(15)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(15));
        // (10*100 + 5*101) / 15
        assert_eq!(quote.vwap_price, dec!(1505) / dec!(15));

        // Shallow hint prices only the top level
        let top = venue.quote(&instrument(), Side::Buy, dec!(5)).await.unwrap();
        assert_eq!(top.vwap_price, dec!(100));
    }

    #[tokio::test]
    async fn test_reserve_debits_and_cancel_refunds() {
        let (venue, _clock) = make_venue().await;

        let reservation = venue
            .reserve(&instrument(), Side::Buy, dec!(12), dec!(101), 1000)
            .await
            .unwrap();
        // 10@100 + 2@101
        assert_eq!(reservation.vwap_price, dec!(1202) / dec!(12));
        assert_eq!(reservation.worst_price, dec!(101));

        // Remaining ask liquidity is 3
        let quote = venue.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(3));

        venue.cancel(reservation.hold_id).await.unwrap();
        let quote = venue.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(15));
        assert_eq!(venue.open_hold_count().await, 0);
    }

    #[tokio::test]
    async fn test_reserve_rejected_when_limit_too_tight() {
        let (venue, _clock) = make_venue().await;

        // Only 10 available at or under 100
        let result = venue
            .reserve(&instrument(), Side::Buy, dec!(12), dec!(100), 1000)
            .await;
        assert!(matches!(result, Err(VenueError::ReserveRejected { .. })));
        assert_eq!(venue.open_hold_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_produces_receipt_once() {
        let (venue, _clock) = make_venue().await;

        let reservation = venue
            .reserve(&instrument(), Side::Buy, dec!(10), dec!(101), 1000)
            .await
            .unwrap();
        let receipt = venue.commit(reservation.hold_id).await.unwrap();

        assert_eq!(receipt.filled_qty, dec!(10));
        assert_eq!(receipt.vwap_price, dec!(100));
        assert_eq!(receipt.notional, dec!(1000));
        assert_eq!(receipt.fee, dec!(10));

        // Second commit is a typed rejection, never a second fill
        let again = venue.commit(reservation.hold_id).await;
        assert!(matches!(again, Err(VenueError::AlreadyCommitted { .. })));
    }

    #[tokio::test]
    async fn test_commit_after_expiry_is_rejected_and_refunds() {
        let (venue, clock) = make_venue().await;

        let reservation = venue
            .reserve(&instrument(), Side::Buy, dec!(10), dec!(101), 1000)
            .await
            .unwrap();
        clock.advance(Duration::milliseconds(1100));

        let result = venue.commit(reservation.hold_id).await;
        assert!(matches!(result, Err(VenueError::HoldExpired { .. })));

        // Expired hold's liquidity is back on the ladder
        let quote = venue.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(15));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (venue, _clock) = make_venue().await;

        let reservation = venue
            .reserve(&instrument(), Side::Buy, dec!(5), dec!(101), 1000)
            .await
            .unwrap();

        venue.cancel(reservation.hold_id).await.unwrap();
        venue.cancel(reservation.hold_id).await.unwrap();
        // Cancelling an unknown hold also acknowledges
        venue.cancel(HoldId(9999)).await.unwrap();

        let quote = venue.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(15));
    }

    #[tokio::test]
    async fn test_cancel_after_commit_does_not_refund() {
        let (venue, _clock) = make_venue().await;

        let reservation = venue
            .reserve(&instrument(), Side::Buy, dec!(10), dec!(101), 1000)
            .await
            .unwrap();
        venue.commit(reservation.hold_id).await.unwrap();
        venue.cancel(reservation.hold_id).await.unwrap();

        // Committed liquidity stays consumed
        let quote = venue.quote(&instrument(), Side::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.available_liquidity, dec!(5));
        assert_eq!(
            venue.hold_status(reservation.hold_id).await,
            Some(HoldStatus::Committed)
        );
    }

    #[tokio::test]
    async fn test_offline_venue_is_unavailable() {
        let (venue, _clock) = make_venue().await;
        venue.set_offline(true);

        let result = venue.quote(&instrument(), Side::Buy, dec!(1)).await;
        assert!(matches!(result, Err(VenueError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_injected_reserve_failure_fires_once() {
        let (venue, _clock) = make_venue().await;
        venue.fail_next_reserve();

        let first = venue
            .reserve(&instrument(), Side::Buy, dec!(1), dec!(101), 1000)
            .await;
        assert!(matches!(first, Err(VenueError::ReserveRejected { .. })));

        let second = venue
            .reserve(&instrument(), Side::Buy, dec!(1), dec!(101), 1000)
            .await;
        assert!(second.is_ok());
    }
}
