//! Portfolio ledger implementation

use dashmap::DashMap;
use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use hermes_core::{FillReceipt, InstrumentId, Portfolio, Price, Quantity, Side};

use crate::error::{Error, Result};

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Equity credited to an account on first touch
    pub starting_equity: Decimal,
    /// Initial margin rate on net notional exposure (0.10 = 10x leverage)
    pub im_rate: Decimal,
    /// Maintenance margin rate on net notional exposure
    pub mm_rate: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_equity: dec!(100000),
            im_rate: dec!(0.10),
            mm_rate: dec!(0.05),
        }
    }
}

/// A fill that has not happened yet, used for pre-trade margin checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypotheticalFill {
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub qty: Quantity,
    pub price: Price,
}

impl HypotheticalFill {
    pub fn new(
        instrument_id: InstrumentId,
        side: Side,
        qty: Quantity,
        price: Price,
    ) -> Self {
        Self {
            instrument_id,
            side,
            qty,
            price,
        }
    }

    fn signed_qty(&self) -> Decimal {
        self.side.signed(self.qty)
    }
}

/// Outcome of a pre-trade margin check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginPreview {
    /// Whether the trade fits inside the owner's collateral
    pub ok: bool,
    /// Initial margin the full post-trade position set would require
    pub required_initial_margin: Decimal,
    /// Free collateral left after the hypothetical fill
    pub free_collateral_after: Decimal,
}

/// Recomputes net per-instrument exposure and margin after each fill and
/// gates commits against available collateral
///
/// The only component allowed to mutate a [`Portfolio`]. Accounts are
/// created on first touch and never deleted - exposure can only be reset
/// to zero.
pub struct PortfolioLedger {
    config: LedgerConfig,
    /// Accounts keyed by owner
    accounts: DashMap<String, Portfolio>,
}

impl PortfolioLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            accounts: DashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Snapshot of an owner's portfolio, creating the account on first
    /// touch
    pub fn portfolio(&self, owner: &str) -> Portfolio {
        self.accounts
            .entry(owner.to_string())
            .or_insert_with(|| self.new_account(owner))
            .clone()
    }

    /// Pre-trade margin check: would the owner's collateral cover the
    /// full position set after this fill?
    ///
    /// Must be called - and must return `ok` - before any reservation is
    /// issued for the owner.
    pub fn preview_margin(&self, owner: &str, fill: &HypotheticalFill) -> MarginPreview {
        let mut portfolio = self.portfolio(owner);
        portfolio.apply_signed_fill(&fill.instrument_id, fill.signed_qty(), fill.price);
        portfolio.recompute_margin(self.config.im_rate, self.config.mm_rate);

        let snapshot = &portfolio.last_margin_snapshot;
        let preview = MarginPreview {
            ok: snapshot.free_collateral >= Decimal::ZERO,
            required_initial_margin: snapshot.initial_margin,
            free_collateral_after: snapshot.free_collateral,
        };

        debug!(
            "[LEDGER] preview {} {} {}@{} -> ok={} free_after={}",
            owner, fill.side, fill.qty, fill.price, preview.ok, preview.free_collateral_after
        );
        preview
    }

    /// Fold a committed fill into the owner's portfolio.
    ///
    /// Nets the signed quantity into the instrument's position, realizes
    /// pnl on any reducing portion, charges the fee against equity, and
    /// recomputes the margin snapshot from the full position set.
    pub fn apply_fill(&self, owner: &str, receipt: &FillReceipt) -> Result<Portfolio> {
        if receipt.filled_qty <= Decimal::ZERO {
            return Err(Error::InvalidFill {
                owner: owner.to_string(),
                reason: format!("non-positive filled_qty {}", receipt.filled_qty),
            });
        }

        let mut entry = self
            .accounts
            .entry(owner.to_string())
            .or_insert_with(|| self.new_account(owner));
        let portfolio = entry.value_mut();

        let realized = portfolio.apply_signed_fill(
            &receipt.instrument_id,
            receipt.signed_qty(),
            receipt.vwap_price,
        );
        portfolio.equity += realized + receipt.pnl_delta - receipt.fee;
        portfolio.recompute_margin(self.config.im_rate, self.config.mm_rate);

        debug!(
            "[LEDGER] {} fill {} {} {}@{} fee={} realized={} net={} free={}",
            owner,
            receipt.venue_id,
            receipt.side,
            receipt.filled_qty,
            receipt.vwap_price,
            receipt.fee,
            realized,
            portfolio.net_position(&receipt.instrument_id),
            portfolio.free_collateral(),
        );

        Ok(portfolio.clone())
    }

    /// Zero out an owner's exposure, keeping equity
    pub fn reset_exposure(&self, owner: &str) -> Portfolio {
        let mut entry = self
            .accounts
            .entry(owner.to_string())
            .or_insert_with(|| self.new_account(owner));
        entry.value_mut().reset_exposure();
        entry.clone()
    }

    fn new_account(&self, owner: &str) -> Portfolio {
        info!(
            "[LEDGER] creating account for {} with equity {}",
            owner, self.config.starting_equity
        );
        Portfolio::new(owner, self.config.starting_equity)
    }
}

impl Default for PortfolioLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}
