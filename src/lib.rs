//! Chain guard - deep-reorganization protection for blockchain nodes
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Reorg Guard
//! - [`guard`] - Segment scoring, sync latch and accept/reject verdicts
//!
//! ## Chain
//! - [`blockchain`] - Block structure, chain reader trait, in-memory chain store
//! - [`sync`] - Peer segment import through the guard
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Reorg Guard
// ============================================================================
pub mod guard;

// ============================================================================
// Chain
// ============================================================================
pub mod blockchain;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;

pub use blockchain::{Block, BlockHeader, Blockchain, CandidateBlock, ChainReader, ChainTip};
pub use error::{ChainError, Result};
pub use guard::{ChainGuard, GuardReport, Verdict};
