//! Team-relative (Red-Queen) fitness.
//!
//! A battle is scored per tank from four components:
//!
//! | Component | Weight | Measures |
//! |-----------|--------|----------|
//! | outcome   | 0.50   | win/draw/loss, scaled by opponent strength |
//! | combat    | 0.20   | team damage share and own accuracy |
//! | survival  | 0.15   | staying alive and healthy |
//! | objective | 0.15   | team share of hill control |
//!
//! A candidate's fitness aggregates its battle scores. Once enough battles
//! exist across several scenarios, the aggregate also rewards performing
//! evenly everywhere over specializing in one map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::{BattleResult, TankReport};
use crate::genome::{Gene, Genome};

use super::pool::Candidate;

/// Weight of the outcome component.
pub const OUTCOME_WEIGHT: f64 = 0.5;
/// Weight of the combat component.
pub const COMBAT_WEIGHT: f64 = 0.2;
/// Weight of the survival component.
pub const SURVIVAL_WEIGHT: f64 = 0.15;
/// Weight of the objective component.
pub const OBJECTIVE_WEIGHT: f64 = 0.15;

/// Weight of the mean scenario score in multi-scenario fitness.
pub const SCENARIO_MEAN_WEIGHT: f64 = 0.7;
/// Weight of the low-variance term in multi-scenario fitness.
pub const ADAPTABILITY_WEIGHT: f64 = 0.15;
/// Weight of the worst-to-best ratio in multi-scenario fitness.
pub const CONSISTENCY_WEIGHT: f64 = 0.15;

/// Genes used for the fallback estimate.
const CORE_GENES: [Gene; 4] = [Gene::Aggression, Gene::Speed, Gene::Accuracy, Gene::Defense];

/// How a fitness value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitnessSource {
    /// Mean score over battles.
    Measured,
    /// Blend of per-scenario means, adaptability and consistency.
    ScenarioComparative,
    /// No battles yet; estimated from ancestry or the genome.
    #[default]
    DeterministicFallback,
}

/// Per-battle score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleScore {
    /// Outcome after the Red-Queen multiplier.
    pub outcome: f64,
    /// Combat effectiveness.
    pub combat: f64,
    /// Survival.
    pub survival: f64,
    /// Objective play.
    pub objective: f64,
    /// Weighted total in `[0, 1]`.
    pub total: f64,
}

/// Scale applied to a battle outcome for the strength of the opponent.
///
/// Ranges from 1/3 against a zero-fitness opponent to 1 against a perfect
/// one.
#[must_use]
pub fn red_queen_multiplier(opponent_strength: f64) -> f64 {
    (0.5 + opponent_strength.clamp(0.0, 1.0)) / 1.5
}

/// Score one tank's performance in a finished battle.
#[must_use]
pub fn score_battle(
    result: &BattleResult,
    tank: &TankReport,
    opponent_strength: f64,
) -> BattleScore {
    let own = result.team(tank.team);
    let enemy = result.team(tank.team.opponent());

    let outcome = match result.winner {
        Some(w) if w == tank.team => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    } * red_queen_multiplier(opponent_strength);

    let total_damage = own.damage_dealt + enemy.damage_dealt;
    let damage_share = if total_damage > 0.0 {
        own.damage_dealt / total_damage
    } else {
        0.5
    };
    let combat = 0.5 * damage_share + 0.5 * tank.stats.accuracy();

    let survival = if tank.alive {
        0.5 + 0.5 * (tank.health / crate::agent::MAX_HEALTH)
    } else if result.duration > 0.0 {
        0.5 * (tank.stats.survival_time / result.duration)
    } else {
        0.0
    };

    let objective = match result.hill {
        Some(hill) => {
            let held = hill.red_time + hill.blue_time;
            if held > 0.0 {
                own.hill_time / held
            } else {
                0.0
            }
        }
        // Elimination battles have no objective to win or lose
        None => 0.5,
    };

    let outcome = outcome.clamp(0.0, 1.0);
    let combat = combat.clamp(0.0, 1.0);
    let survival = survival.clamp(0.0, 1.0);
    let objective = objective.clamp(0.0, 1.0);
    let total = OUTCOME_WEIGHT * outcome
        + COMBAT_WEIGHT * combat
        + SURVIVAL_WEIGHT * survival
        + OBJECTIVE_WEIGHT * objective;

    BattleScore {
        outcome,
        combat,
        survival,
        objective,
        total: total.clamp(0.0, 1.0),
    }
}

/// Fitness estimate for a candidate without battles.
///
/// Inherits the parents' fitness when known, else half the mean of the core
/// combat genes.
#[must_use]
pub fn fallback_fitness(genome: &Genome, parent_fitness: Option<f64>) -> f64 {
    let value = parent_fitness.unwrap_or_else(|| {
        0.5 * CORE_GENES.iter().map(|&g| genome.get(g)).sum::<f64>() / CORE_GENES.len() as f64
    });
    clamp_fitness(value)
}

/// Clamp to `[0, 1]`; non-finite values become 0.
#[must_use]
pub fn clamp_fitness(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Blend of per-scenario means.
///
/// `0.7 · mean + 0.15 · (1 − min(1, 2σ)) + 0.15 · min/max`.
#[must_use]
pub fn scenario_comparative(scenario_means: &[f64]) -> f64 {
    if scenario_means.is_empty() {
        return 0.0;
    }
    let n = scenario_means.len() as f64;
    let mean = scenario_means.iter().sum::<f64>() / n;
    let variance = scenario_means
        .iter()
        .map(|m| (m - mean).powi(2))
        .sum::<f64>()
        / n;
    let adaptability = 1.0 - (2.0 * variance.sqrt()).min(1.0);
    let max = scenario_means.iter().copied().fold(f64::MIN, f64::max);
    let min = scenario_means.iter().copied().fold(f64::MAX, f64::min);
    let consistency = if max > 0.0 { min / max } else { 0.0 };

    clamp_fitness(
        SCENARIO_MEAN_WEIGHT * mean
            + ADAPTABILITY_WEIGHT * adaptability
            + CONSISTENCY_WEIGHT * consistency,
    )
}

/// Extra fitness term supplied from outside the core.
///
/// A contributor scores a candidate in `[0, 1]` and blends in with its
/// weight; returning `None` skips it for that candidate.
pub trait FitnessContributor: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Blend weight in `[0, 1]`.
    fn weight(&self) -> f64;

    /// Score for a candidate.
    fn score(&self, candidate: &Candidate) -> Option<f64>;
}

/// Blend contributor scores into a base fitness.
///
/// With total contributing weight `w`, the result is
/// `(1 − w) · base + Σ wᵢ · scoreᵢ`. Weights summing above 1 are normalized.
#[must_use]
pub fn blend_contributors(
    base: f64,
    candidate: &Candidate,
    contributors: &[Box<dyn FitnessContributor>],
) -> f64 {
    let terms: Vec<(f64, f64)> = contributors
        .iter()
        .filter_map(|c| {
            let weight = clamp_fitness(c.weight());
            c.score(candidate)
                .map(|s| (weight, clamp_fitness(s)))
                .filter(|(w, _)| *w > 0.0)
        })
        .collect();
    if terms.is_empty() {
        return clamp_fitness(base);
    }
    let total_weight: f64 = terms.iter().map(|(w, _)| w).sum();
    let scale = if total_weight > 1.0 { 1.0 / total_weight } else { 1.0 };
    let extra: f64 = terms.iter().map(|(w, s)| w * scale * s).sum();
    clamp_fitness((1.0 - total_weight * scale) * base + extra)
}

/// Per-team battle counts by scenario.
pub type ScenarioCounts = BTreeMap<String, u32>;

/// Compute a candidate's fitness from its history.
///
/// `team_counts` holds how many battles the candidate's team has fought in
/// each scenario. Scenarios where the team has fewer than `min_per_scenario`
/// battles are not trusted for comparison.
#[must_use]
pub fn evaluate_candidate(
    candidate: &Candidate,
    team_counts: &ScenarioCounts,
    min_per_scenario: u32,
    contributors: &[Box<dyn FitnessContributor>],
) -> (f64, FitnessSource) {
    if candidate.history.is_empty() {
        let base = fallback_fitness(&candidate.genome, candidate.parent_fitness);
        return (
            blend_contributors(base, candidate, contributors),
            FitnessSource::DeterministicFallback,
        );
    }

    let mut by_scenario: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    for record in &candidate.history {
        let entry = by_scenario.entry(record.scenario_id.as_str()).or_default();
        entry.0 += record.score;
        entry.1 += 1;
    }

    let trusted: Vec<f64> = by_scenario
        .iter()
        .filter(|(id, _)| team_counts.get(**id).copied().unwrap_or(0) >= min_per_scenario)
        .map(|(_, (sum, n))| sum / f64::from(*n))
        .collect();

    let (base, source) = if trusted.len() >= 2 {
        (scenario_comparative(&trusted), FitnessSource::ScenarioComparative)
    } else {
        let sum: f64 = candidate.history.iter().map(|r| r.score).sum();
        (
            clamp_fitness(sum / candidate.history.len() as f64),
            FitnessSource::Measured,
        )
    };

    (blend_contributors(base, candidate, contributors), source)
}
