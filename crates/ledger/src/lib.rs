//! Hermes Portfolio Ledger
//!
//! Tracks each owner's net exposure per instrument across all venues and
//! recomputes margin after every fill:
//!
//! - **Netting**: two offsetting legs on different venues reduce net
//!   exposure, and therefore margin. A perfectly hedged book requires
//!   zero margin.
//! - **From-scratch margin**: every recomputation runs over the full
//!   position set; the snapshot never drifts from what a clean
//!   recalculation would produce.
//! - **Pre-trade gating**: [`PortfolioLedger::preview_margin`] must pass
//!   before any reservation is issued. A commit that proceeds despite
//!   insufficient free collateral is a defect in the caller.

mod error;
mod ledger;

pub use error::{Error, Result};
pub use ledger::{HypotheticalFill, LedgerConfig, MarginPreview, PortfolioLedger};
