//! Error types for the battle and evolution core.
//!
//! The core has no fatal conditions: bad genes are clamped, unknown
//! scenarios fall back to a default and empty teams are re-synthesized.
//! These errors only surface at the boundary (parsing, serialization and
//! invalid battle state transitions requested by a caller).

use thiserror::Error;

use crate::battle::BattleState;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scenario registry text could not be parsed.
    #[error("Failed to parse scenario registry: {0}")]
    ScenarioParse(#[from] ron::error::SpannedError),

    /// Battle state could not be encoded.
    #[error("Failed to serialize battle state: {0}")]
    Serialization(#[from] bincode::Error),

    /// A battle lifecycle transition was requested from the wrong state.
    #[error("Invalid battle transition: cannot {action} while {state:?}")]
    InvalidTransition {
        /// Requested action.
        action: &'static str,
        /// State the battle was in.
        state: BattleState,
    },
}
