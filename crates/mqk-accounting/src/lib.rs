//! mqk-accounting
//!
//! Trade-stream position accounting for a single instrument.
//! - Fee normalization shared by both strategies
//! - Weighted-average-cost position with signed flips
//! - FIFO lot distribution with profit-first matching and pending sells
//! - Average-cost PnL report
//! - Pure deterministic logic (no IO, no time, no exchange wiring)

mod error;
mod fixedpoint;
mod types;

pub mod distribution;
pub mod fee;
pub mod lot;
pub mod pnl;
pub mod position;

pub use distribution::{price_band, ConsumeOutcome, DistributionStats, LotDistribution};
pub use error::AccountingError;
pub use fee::{normalize, NormalizedTrade};
pub use fixedpoint::{Fixed, FIXED_SCALE};
pub use lot::{match_sell, Lot, LotSlice, MatchPass, MATCH_POLICY};
pub use pnl::{AverageCostCalculator, AverageCostReport};
pub use position::{classify, Decision, Position, PositionSnapshot, ProfitEvent, Transition};
pub use types::{Market, Side, Trade};
