//! Quote Aggregation
//!
//! Fans one quote request out to every known venue concurrently, each
//! bounded by its own timeout, and returns a consistent snapshot of
//! fresh quotes. A venue that times out, errors or answers stale is
//! simply absent from the snapshot - its liquidity is unavailable for
//! this planning cycle, which is a degradation, never a failure of the
//! whole call.
//!
//! The last good snapshot is kept behind an atomically replaced `Arc`;
//! readers either see the previous snapshot or the new one, never a
//! partially updated mix.

use chrono::Duration;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};
use tokio::task::JoinSet;

use hermes_core::{InstrumentId, Quantity, Side, Timestamp, VenueQuote};
use hermes_ports::{Clock, VenueClient};

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Per-venue deadline for a quote answer
    pub quote_timeout: std::time::Duration,
    /// Quotes older than this are discarded
    pub staleness_bound: Duration,
    /// Depth the venues are asked to price (ZERO = full ladder)
    pub depth_hint: Quantity,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            quote_timeout: std::time::Duration::from_millis(500),
            staleness_bound: Duration::seconds(5),
            depth_hint: Decimal::ZERO,
        }
    }
}

/// A consistent view of every venue that answered one aggregation pass
#[derive(Debug, Clone)]
pub struct QuoteSnapshot {
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub quotes: Vec<VenueQuote>,
    pub taken_at: Timestamp,
}

/// Concurrent quote fan-out across all known venues
///
/// Read-only with respect to the venues; safe to call repeatedly and
/// concurrently.
pub struct QuoteAggregator {
    venues: Vec<Arc<dyn VenueClient>>,
    clock: Arc<dyn Clock>,
    config: AggregatorConfig,
    /// Last good snapshot, replaced atomically as a whole
    snapshot: RwLock<Option<Arc<QuoteSnapshot>>>,
}

impl QuoteAggregator {
    pub fn new(
        venues: Vec<Arc<dyn VenueClient>>,
        clock: Arc<dyn Clock>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            venues,
            clock,
            config,
            snapshot: RwLock::new(None),
        }
    }

    /// Number of venues this aggregator fans out to
    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    /// The last snapshot taken, if any
    pub fn latest_snapshot(&self) -> Option<Arc<QuoteSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Fan out one quote request per venue and collect the survivors.
    ///
    /// Blocks only until the last surviving call returns or times out,
    /// whichever comes first.
    pub async fn aggregate(&self, instrument_id: &InstrumentId, side: Side) -> Vec<VenueQuote> {
        let mut set = JoinSet::new();
        for venue in &self.venues {
            let venue = venue.clone();
            let instrument_id = instrument_id.clone();
            let depth_hint = self.config.depth_hint;
            let deadline = self.config.quote_timeout;
            set.spawn(async move {
                let venue_id = venue.venue_id().clone();
                let outcome = tokio::time::timeout(
                    deadline,
                    venue.quote(&instrument_id, side, depth_hint),
                )
                .await;
                (venue_id, outcome)
            });
        }

        let mut quotes = Vec::with_capacity(self.venues.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((venue_id, Ok(Ok(quote)))) => {
                    let now = self.clock.now();
                    if quote.is_stale(now, self.config.staleness_bound) {
                        warn!(
                            "[QUOTES] discarding stale quote from {} (age {}ms)",
                            venue_id,
                            (now - quote.quote_timestamp).num_milliseconds()
                        );
                        continue;
                    }
                    if quote.available_liquidity < Decimal::ZERO {
                        warn!(
                            "[QUOTES] discarding malformed quote from {} (negative liquidity)",
                            venue_id
                        );
                        continue;
                    }
                    quotes.push(quote);
                }
                Ok((venue_id, Ok(Err(err)))) => {
                    warn!("[QUOTES] venue {} excluded: {}", venue_id, err);
                }
                Ok((venue_id, Err(_elapsed))) => {
                    warn!(
                        "[QUOTES] venue {} excluded: no answer within {:?}",
                        venue_id, self.config.quote_timeout
                    );
                }
                Err(join_err) => {
                    warn!("[QUOTES] quote task failed: {}", join_err);
                }
            }
        }

        // Stable order regardless of completion order
        quotes.sort_by(|a, b| a.venue_id.cmp(&b.venue_id));
        debug!(
            "[QUOTES] {} {}: {}/{} venues answered",
            instrument_id,
            side,
            quotes.len(),
            self.venues.len()
        );

        let snapshot = Arc::new(QuoteSnapshot {
            instrument_id: instrument_id.clone(),
            side,
            quotes: quotes.clone(),
            taken_at: self.clock.now(),
        });
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);

        quotes
    }
}
