//! Deep-reorganization guard
//!
//! Scores a peer-delivered chain segment against the local tip and
//! rejects it when adopting it would roll back confirmed history.
//!
//! - [`penalty`] - per-block penalty relative to the tip
//! - [`difficulty`] - difficulty-banded sensitivity multiplier
//! - [`aggregate`] - height-keyed penalty collection and reduction
//! - [`latch`] - process-wide "caught up with the network" flag
//! - [`chain_guard`] - the orchestrator and its verdicts

pub mod aggregate;
pub mod chain_guard;
pub mod difficulty;
pub mod latch;
pub mod penalty;

pub use aggregate::{aggregate, PenaltyEntry, PenaltyMap};
pub use chain_guard::{ChainGuard, GuardReport, GuardStats, Verdict};
pub use difficulty::multiplier;
pub use latch::SyncLatch;
pub use penalty::score;
