//! Competitive co-evolution of the red and blue populations.
//!
//! - [`pool`] - candidates and the id-keyed candidate pool
//! - [`operators`] - tournament selection, crossover and mutation
//! - [`fitness`] - Red-Queen battle scoring and multi-scenario aggregation
//! - [`engine`] - evolution state, battle bookkeeping and generation advance
//!
//! A typical loop picks rosters with [`EvolutionState::select_roster`], runs
//! a [`crate::battle::Battle`], folds the result in with
//! [`EvolutionState::record_battle`] and, after enough battles, calls
//! [`advance_generation`]. With extra fitness contributors, use the `_with`
//! variants of both.

pub mod engine;
pub mod fitness;
pub mod operators;
pub mod pool;

pub use engine::{
    advance_generation, advance_generation_with, source_breakdown, EvolutionConfig,
    EvolutionState, GenerationSummary, ScenarioTally, TeamSummary,
};
pub use fitness::{BattleScore, FitnessContributor, FitnessSource};
pub use operators::{crossover, mutate, tournament_select, Selection};
pub use pool::{BattleRecord, Candidate, CandidateId, CandidatePool};
