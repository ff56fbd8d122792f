//! # Tank Core
//!
//! Deterministic battle simulation and competitive evolution core for Tank Arena.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (every random draw comes from a seeded [`rng::SeededRng`])
//!
//! This separation enables:
//! - Reproducible battles from a `(scenario, seed)` pair
//! - Headless evolution runs
//! - Determinism testing via battle state hashes
//!
//! ## Crate Structure
//!
//! - [`rng`] - Park–Miller seeded generator
//! - [`math`] - 2D vectors, rectangles and intersection tests
//! - [`genome`] - The fixed 9-gene behavior vector
//! - [`scenario`] - Scenario descriptors and registry
//! - [`battlefield`] - Seeded obstacle and hill generation
//! - [`agent`] - Tank perception and behavior state machine
//! - [`combat`] - Line of sight, firing, projectiles and damage
//! - [`battle`] - Battle orchestrator and win conditions
//! - [`evolution`] - Candidate pool, operators, Red-Queen fitness, generation advance

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod battle;
pub mod battlefield;
pub mod combat;
pub mod error;
pub mod evolution;
pub mod genome;
pub mod math;
pub mod rng;
pub mod scenario;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{BehaviorState, Tank, TankStats};
    pub use crate::battle::{
        Battle, BattleConfig, BattleResult, BattleState, TeamStats, VictoryMode, VictoryType,
    };
    pub use crate::battlefield::{Battlefield, Hill};
    pub use crate::error::{CoreError, Result};
    pub use crate::evolution::{
        advance_generation, Candidate, CandidateId, CandidatePool, EvolutionConfig,
        EvolutionState, FitnessSource, GenerationSummary,
    };
    pub use crate::genome::{Gene, Genome, Team};
    pub use crate::math::{Rect, Vec2};
    pub use crate::rng::SeededRng;
    pub use crate::scenario::{ScenarioDescriptor, ScenarioKind, ScenarioRegistry};
}
