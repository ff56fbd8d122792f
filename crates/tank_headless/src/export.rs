//! JSON export of evolution runs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tank_core::battle::{BattleResult, VictoryType};
use tank_core::evolution::{CandidateId, EvolutionState, FitnessSource, GenerationSummary};
use tank_core::genome::{GenomeTraits, Team};

/// Compact record of one finished battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleDigest {
    /// Generation the battle was fought in.
    pub generation: u32,
    /// Scenario actually used.
    pub scenario_id: String,
    /// Battle seed.
    pub seed: i64,
    /// Winner, `None` for a draw.
    pub winner: Option<Team>,
    /// How it ended.
    pub victory_type: VictoryType,
    /// Simulated seconds.
    pub duration: f64,
    /// Red tanks alive at the end.
    pub red_survivors: usize,
    /// Blue tanks alive at the end.
    pub blue_survivors: usize,
}

impl BattleDigest {
    /// Digest a result.
    #[must_use]
    pub fn new(generation: u32, result: &BattleResult) -> Self {
        Self {
            generation,
            scenario_id: result.scenario_id.clone(),
            seed: result.seed,
            winner: result.winner,
            victory_type: result.victory_type,
            duration: result.duration,
            red_survivors: result.red.survivors,
            blue_survivors: result.blue.survivors,
        }
    }
}

/// Best candidate of a team at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Champion {
    /// Team.
    pub team: Team,
    /// Candidate id.
    pub id: CandidateId,
    /// Final fitness.
    pub fitness: f64,
    /// How the fitness was computed.
    pub fitness_source: FitnessSource,
    /// Battles fought.
    pub battles: u32,
    /// Battles won.
    pub wins: u32,
    /// Genome by trait name.
    pub genome: GenomeTraits,
}

/// Everything an evolution run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Master seed.
    pub seed: i64,
    /// Generation summaries in order.
    pub generations: Vec<GenerationSummary>,
    /// Battles in the order they finished.
    pub battles: Vec<BattleDigest>,
    /// Tasks that failed instead of producing a result.
    pub failed_tasks: u32,
    /// Best candidate per team.
    pub champions: Vec<Champion>,
}

impl RunReport {
    /// Assemble a report, taking champions from the final state.
    #[must_use]
    pub fn new(
        seed: i64,
        generations: Vec<GenerationSummary>,
        battles: Vec<BattleDigest>,
        failed_tasks: u32,
        state: &EvolutionState,
    ) -> Self {
        let champions = Team::BOTH
            .iter()
            .filter_map(|&team| {
                state.pool.best(team).map(|c| Champion {
                    team,
                    id: c.id,
                    fitness: c.fitness,
                    fitness_source: c.fitness_source,
                    battles: c.battles,
                    wins: c.wins,
                    genome: c.genome.into(),
                })
            })
            .collect();
        Self {
            seed,
            generations,
            battles,
            failed_tasks,
            champions,
        }
    }

    /// Wins per team, plus draws.
    #[must_use]
    pub fn tally(&self) -> (u32, u32, u32) {
        self.battles
            .iter()
            .fold((0, 0, 0), |(red, blue, draws), b| match b.winner {
                Some(Team::Red) => (red + 1, blue, draws),
                Some(Team::Blue) => (red, blue + 1, draws),
                None => (red, blue, draws + 1),
            })
    }

    /// Save the report as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        save_json(self, path)
    }

    /// Load a report saved with [`RunReport::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a report.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Write any serializable value as pretty JSON.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
