//! Evolution state, battle bookkeeping and generation advance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::BattleResult;
use crate::genome::{Genome, Team};
use crate::rng::SeededRng;

use super::fitness::{
    evaluate_candidate, fallback_fitness, score_battle, FitnessContributor, FitnessSource,
    ScenarioCounts,
};
use super::operators::{crossover, mutate, tournament_select};
use super::pool::{BattleRecord, CandidateId, CandidatePool};

/// Evolution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Candidates per team after each generation.
    pub pool_size: usize,
    /// Fittest candidates per team carried over unchanged.
    pub elite_count: usize,
    /// Contestants per tournament.
    pub tournament_size: usize,
    /// Probability that an offspring comes from crossover rather than cloning.
    pub crossover_rate: f64,
    /// Uniform jitter added to every crossed-over gene.
    pub crossover_jitter: f64,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Standard deviation of mutation noise.
    pub mutation_std: f64,
    /// Team battles needed in a scenario before it counts for comparison.
    pub min_battles_per_scenario: u32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            elite_count: 2,
            tournament_size: 3,
            crossover_rate: 0.7,
            crossover_jitter: 0.02,
            mutation_rate: 0.1,
            mutation_std: 0.1,
            min_battles_per_scenario: 3,
        }
    }
}

impl EvolutionConfig {
    /// Set the per-team pool size (at least 1).
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Set the elite count.
    #[must_use]
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Set the tournament size.
    #[must_use]
    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size.max(1);
        self
    }

    /// Set mutation probability and noise.
    #[must_use]
    pub fn with_mutation(mut self, rate: f64, std_dev: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self.mutation_std = std_dev.max(0.0);
        self
    }

    /// Set the crossover probability.
    #[must_use]
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the per-scenario trust threshold.
    #[must_use]
    pub fn with_min_battles_per_scenario(mut self, count: u32) -> Self {
        self.min_battles_per_scenario = count;
        self
    }
}

/// Summary of one team at generation end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    /// Best fitness.
    pub best_fitness: f64,
    /// Mean fitness.
    pub average_fitness: f64,
    /// Best candidate.
    pub best_candidate: Option<CandidateId>,
    /// Genome of the best candidate.
    pub best_genome: Option<Genome>,
    /// Candidates before reproduction.
    pub pool_size: usize,
}

/// Observability record for one generation advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Generation that just finished.
    pub generation: u32,
    /// Red summary.
    pub red: TeamSummary,
    /// Blue summary.
    pub blue: TeamSummary,
    /// Battles recorded during the generation.
    pub battles: u32,
    /// Tournaments held.
    pub tournaments: u32,
    /// Offspring produced by crossover.
    pub crossovers: u32,
    /// Offspring with at least one mutated gene.
    pub mutations: u32,
    /// Total genes mutated.
    pub mutated_genes: u32,
    /// Genomes synthesized for empty teams.
    pub synthesized: u32,
    /// Candidates removed.
    pub evicted: u32,
    /// Candidates per team afterwards.
    pub pool_sizes: [usize; 2],
}

impl GenerationSummary {
    /// Summary for a team.
    #[must_use]
    pub fn team(&self, team: Team) -> &TeamSummary {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }
}

/// Battles fought per scenario, per team.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioTally {
    /// Red battles per scenario.
    pub red: ScenarioCounts,
    /// Blue battles per scenario.
    pub blue: ScenarioCounts,
}

impl ScenarioTally {
    /// Counts for a team.
    #[must_use]
    pub fn team(&self, team: Team) -> &ScenarioCounts {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    fn bump(&mut self, team: Team, scenario: &str) {
        let counts = match team {
            Team::Red => &mut self.red,
            Team::Blue => &mut self.blue,
        };
        *counts.entry(scenario.to_string()).or_default() += 1;
    }
}

/// Everything the evolution carries from one generation to the next.
///
/// Passed by value into [`advance_generation`]; there is no global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    /// Current generation, starting at 0.
    pub generation: u32,
    /// Live candidates.
    pub pool: CandidatePool,
    /// Battles per team and scenario.
    pub tally: ScenarioTally,
    /// Battles recorded in the current generation.
    pub battles_this_generation: u32,
    /// Battles recorded overall.
    pub total_battles: u64,
    rng: SeededRng,
}

impl EvolutionState {
    /// Empty state.
    #[must_use]
    pub fn new(seed: i64) -> Self {
        Self {
            generation: 0,
            pool: CandidatePool::new(),
            tally: ScenarioTally::default(),
            battles_this_generation: 0,
            total_battles: 0,
            rng: SeededRng::new(seed),
        }
    }

    /// State with each team filled to the configured pool size.
    #[must_use]
    pub fn seeded(seed: i64, config: &EvolutionConfig) -> Self {
        let mut state = Self::new(seed);
        state.pool.seed_teams(config.pool_size, 0, &mut state.rng);
        state.refresh_fitness(config, &[]);
        tracing::debug!(per_team = config.pool_size, "Seeded candidate pool");
        state
    }

    /// Engine RNG.
    pub fn rng_mut(&mut self) -> &mut SeededRng {
        &mut self.rng
    }

    /// Choose `size` candidates to fight for `team`.
    ///
    /// The least-tested candidates go first (ties by id), cycling when the
    /// team is smaller than the roster. An empty team is refilled with a
    /// synthesized genome first.
    pub fn select_roster(&mut self, team: Team, size: usize) -> Vec<CandidateId> {
        if size == 0 {
            return Vec::new();
        }
        if self.pool.team_size(team) == 0 {
            let genome = Genome::team_biased(team, &mut self.rng);
            let id = self.pool.insert(genome, team, self.generation);
            if let Some(c) = self.pool.get_mut(id) {
                c.fitness = fallback_fitness(&genome, None);
            }
            tracing::warn!(%team, "Team empty at roster selection, synthesized a candidate");
        }

        let mut members: Vec<(u32, CandidateId)> =
            self.pool.team(team).map(|c| (c.battles, c.id)).collect();
        members.sort_unstable();
        members.iter().cycle().take(size).map(|&(_, id)| id).collect()
    }

    /// Genomes for a roster of ids, in roster order.
    ///
    /// Returns `None` if any id is no longer in the pool, so genomes always
    /// line up one-to-one with the ids credited by [`Self::record_battle`].
    #[must_use]
    pub fn roster_genomes(&self, roster: &[CandidateId]) -> Option<Vec<Genome>> {
        roster
            .iter()
            .map(|id| self.pool.get(*id).map(|c| c.genome))
            .collect()
    }

    /// Fold a battle result into the candidates that fought it.
    ///
    /// `red` and `blue` are the rosters in the order their genomes were
    /// handed to the battle. Opponent strength is the opposing roster's mean
    /// fitness before this battle.
    pub fn record_battle(
        &mut self,
        red: &[CandidateId],
        blue: &[CandidateId],
        result: &BattleResult,
        config: &EvolutionConfig,
    ) {
        self.record_battle_with(red, blue, result, config, &[]);
    }

    /// [`Self::record_battle`] with extra fitness contributors.
    ///
    /// Pass the same contributors given to [`advance_generation_with`] so
    /// fitness keeps their blend between advances.
    pub fn record_battle_with(
        &mut self,
        red: &[CandidateId],
        blue: &[CandidateId],
        result: &BattleResult,
        config: &EvolutionConfig,
        contributors: &[Box<dyn FitnessContributor>],
    ) {
        let strength = |pool: &CandidatePool, roster: &[CandidateId]| -> f64 {
            let values: Vec<f64> = roster
                .iter()
                .filter_map(|id| pool.get(*id).map(|c| c.fitness))
                .collect();
            if values.is_empty() {
                0.5
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let red_opponent = strength(&self.pool, blue);
        let blue_opponent = strength(&self.pool, red);

        let sides = [(Team::Red, red, red_opponent), (Team::Blue, blue, blue_opponent)];
        for (team, roster, opponent) in sides {
            let fought = result.tanks_of(team).count();
            if fought != roster.len() {
                tracing::warn!(
                    %team,
                    fought,
                    roster = roster.len(),
                    "Roster does not match battle, skipping credit"
                );
                continue;
            }
            for (report, id) in result.tanks_of(team).zip(roster) {
                let score = score_battle(result, report, opponent);
                if let Some(candidate) = self.pool.get_mut(*id) {
                    candidate.record(BattleRecord {
                        scenario_id: result.scenario_id.clone(),
                        seed: result.seed,
                        generation: self.generation,
                        won: result.winner == Some(team),
                        drawn: result.winner.is_none(),
                        opponent_strength: opponent,
                        score: score.total,
                    });
                }
            }
            if !roster.is_empty() {
                self.tally.bump(team, &result.scenario_id);
            }
        }

        self.battles_this_generation += 1;
        self.total_battles += 1;
        self.refresh_fitness(config, contributors);

        tracing::debug!(
            generation = self.generation,
            scenario = %result.scenario_id,
            winner = ?result.winner,
            red_opponent,
            blue_opponent,
            "Recorded battle"
        );
    }

    /// Recompute every candidate's fitness and fitness source.
    pub fn refresh_fitness(
        &mut self,
        config: &EvolutionConfig,
        contributors: &[Box<dyn FitnessContributor>],
    ) {
        let tally = &self.tally;
        for candidate in self.pool.iter_mut() {
            let (fitness, source) = evaluate_candidate(
                candidate,
                tally.team(candidate.team),
                config.min_battles_per_scenario,
                contributors,
            );
            candidate.fitness = fitness;
            candidate.fitness_source = source;
        }
    }
}

#[derive(Default)]
struct Counters {
    tournaments: u32,
    crossovers: u32,
    mutations: u32,
    mutated_genes: u32,
    synthesized: u32,
    evicted: u32,
}

fn summarize(pool: &CandidatePool, team: Team) -> TeamSummary {
    let best = pool.best(team);
    TeamSummary {
        best_fitness: best.map_or(0.0, |c| c.fitness),
        average_fitness: pool.mean_fitness(team).unwrap_or(0.0),
        best_candidate: best.map(|c| c.id),
        best_genome: best.map(|c| c.genome),
        pool_size: pool.team_size(team),
    }
}

/// Advance one generation with no extra fitness contributors.
#[must_use]
pub fn advance_generation(
    state: EvolutionState,
    config: &EvolutionConfig,
) -> (EvolutionState, GenerationSummary) {
    advance_generation_with(state, config, &[])
}

/// Advance one generation.
///
/// Per team: keep the elites, breed the rest of the pool from tournament
/// winners of the current pool, then evict everyone else. Every team ends
/// with `pool_size` candidates.
#[must_use]
pub fn advance_generation_with(
    mut state: EvolutionState,
    config: &EvolutionConfig,
    contributors: &[Box<dyn FitnessContributor>],
) -> (EvolutionState, GenerationSummary) {
    state.refresh_fitness(config, contributors);

    let red = summarize(&state.pool, Team::Red);
    let blue = summarize(&state.pool, Team::Blue);
    let next_generation = state.generation + 1;
    let pool_size = config.pool_size.max(1);
    let mut counters = Counters::default();

    for team in Team::BOTH {
        let mut ranked: Vec<(f64, CandidateId)> =
            state.pool.team(team).map(|c| (c.fitness, c.id)).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        let elite_count = config.elite_count.min(pool_size).min(ranked.len());

        let mut offspring = Vec::with_capacity(pool_size - elite_count);
        for _ in elite_count..pool_size {
            let a = tournament_select(&state.pool, team, config.tournament_size, &mut state.rng);
            counters.tournaments += 1;
            counters.synthesized += u32::from(a.is_synthesized());

            let (child, parent_fitness) = if state.rng.chance(config.crossover_rate) {
                let b =
                    tournament_select(&state.pool, team, config.tournament_size, &mut state.rng);
                counters.tournaments += 1;
                counters.synthesized += u32::from(b.is_synthesized());
                counters.crossovers += 1;
                (
                    crossover(&a.genome, &b.genome, config.crossover_jitter, &mut state.rng),
                    (a.fitness + b.fitness) / 2.0,
                )
            } else {
                (a.genome, a.fitness)
            };

            let (child, changed) =
                mutate(&child, config.mutation_rate, config.mutation_std, &mut state.rng);
            if changed > 0 {
                counters.mutations += 1;
                counters.mutated_genes += changed;
            }
            offspring.push((child, parent_fitness));
        }

        for (_, id) in ranked.iter().skip(elite_count) {
            state.pool.remove(*id);
            counters.evicted += 1;
        }
        for (genome, parent_fitness) in offspring {
            let id = state.pool.insert(genome, team, next_generation);
            if let Some(c) = state.pool.get_mut(id) {
                c.parent_fitness = Some(parent_fitness);
            }
        }

        if state.pool.team_size(team) == 0 {
            let genome = Genome::team_biased(team, &mut state.rng);
            state.pool.insert(genome, team, next_generation);
            counters.synthesized += 1;
        }
    }

    state.refresh_fitness(config, contributors);

    let summary = GenerationSummary {
        generation: state.generation,
        red,
        blue,
        battles: state.battles_this_generation,
        tournaments: counters.tournaments,
        crossovers: counters.crossovers,
        mutations: counters.mutations,
        mutated_genes: counters.mutated_genes,
        synthesized: counters.synthesized,
        evicted: counters.evicted,
        pool_sizes: [state.pool.team_size(Team::Red), state.pool.team_size(Team::Blue)],
    };

    tracing::info!(
        generation = summary.generation,
        red_best = summary.red.best_fitness,
        blue_best = summary.blue.best_fitness,
        battles = summary.battles,
        "Generation complete"
    );

    state.generation = next_generation;
    state.battles_this_generation = 0;
    (state, summary)
}

/// Count of candidates per fitness source, for reporting.
#[must_use]
pub fn source_breakdown(pool: &CandidatePool) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for c in pool.iter() {
        let key = match c.fitness_source {
            FitnessSource::Measured => "measured",
            FitnessSource::ScenarioComparative => "scenario_comparative",
            FitnessSource::DeterministicFallback => "deterministic_fallback",
        };
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}
