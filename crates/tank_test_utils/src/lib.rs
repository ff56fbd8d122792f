//! # Tank Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Roster and battlefield fixtures
//! - Matchup statistics over many seeded battles
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod matchup;

/// Re-export proptest for convenience.
pub use proptest;
