//! Hermes Smart Order Router
//!
//! Routes one logical order across several independent liquidity venues
//! and executes the resulting multi-leg trade under an all-or-nothing
//! reservation guarantee:
//!
//! ```text
//! caller ──► ┌──────────────────────────────────────────────┐
//!            │            Smart Order Router                │
//!            │  ┌────────────────────────────────────────┐  │
//!            │  │  Quote Aggregator                      │  │
//!            │  │  - concurrent fan-out, per-venue       │  │
//!            │  │    timeout, staleness filter           │  │
//!            │  └──────────────────┬─────────────────────┘  │
//!            │                     │ quote snapshot         │
//!            │  ┌──────────────────▼─────────────────────┐  │
//!            │  │  Allocation Planner (pure)             │  │
//!            │  │  - price-priority greedy allocation    │  │
//!            │  │    under the caller's limit            │  │
//!            │  └──────────────────┬─────────────────────┘  │
//!            │                     │ execution plan         │
//!            │  ┌──────────────────▼─────────────────────┐  │
//!            │  │  Portfolio Ledger (pre-trade gate)     │  │
//!            │  └──────────────────┬─────────────────────┘  │
//!            │  ┌──────────────────▼─────────────────────┐  │
//!            │  │  Reservation Coordinator               │  │
//!            │  │  - reserve all legs, commit all legs,  │  │
//!            │  │    or roll back                        │  │
//!            │  └──────────────────┬─────────────────────┘  │
//!            │                     │ fill receipts          │
//!            │  ┌──────────────────▼─────────────────────┐  │
//!            │  │  Portfolio Ledger (post-trade update)  │  │
//!            │  └────────────────────────────────────────┘  │
//!            └──────────────────────┬───────────────────────┘
//!                                   ▼
//!                          aggregated fill result
//! ```
//!
//! ## Guarantees
//!
//! The multi-venue path is all-or-nothing *at reservation time*: no hold
//! is left pending after a failed reserve phase. The commit phase is
//! best-effort-atomic; a partial commit across independent venues cannot
//! be undone here and surfaces as
//! [`RouteError::PartialExecutionConflict`]. The single-venue path
//! ([`SmartOrderRouter::reserve_at`]) is explicitly weaker: the caller
//! owns the window between reserve and commit and may observe expiry.

pub mod aggregator;
pub mod coordinator;
pub mod error;
pub mod planner;
pub mod router;

// Re-export main types
pub use aggregator::{AggregatorConfig, QuoteAggregator, QuoteSnapshot};
pub use coordinator::{CoordinatorConfig, HoldHandle, ReservationCoordinator};
pub use error::{Result, RouteError};
pub use planner::AllocationPlanner;
pub use router::{ExecutionResult, RouteRequest, RouterConfig, SmartOrderRouter};
