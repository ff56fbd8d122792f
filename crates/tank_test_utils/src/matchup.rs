//! Matchup statistics over many seeded battles.
//!
//! Runs the same pair of rosters across a range of seeds and scenarios to
//! check that a behavior trend holds, not just a single lucky battle.

use tank_core::battle::{Battle, BattleConfig, VictoryType};
use tank_core::genome::{Genome, Team};
use tank_core::scenario::ScenarioDescriptor;

/// Aggregate outcome of a batch of battles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchupStats {
    /// Battles run.
    pub total_battles: u32,
    /// Red wins.
    pub red_wins: u32,
    /// Blue wins.
    pub blue_wins: u32,
    /// Draws.
    pub draws: u32,
    /// Battles decided by elimination.
    pub eliminations: u32,
    /// Battles decided on the hill.
    pub hill_victories: u32,
    /// Battles that hit the time limit.
    pub timeouts: u32,
    /// Mean battle duration.
    pub avg_duration: f64,
}

impl MatchupStats {
    /// Red win rate (0.5 with no battles).
    #[must_use]
    pub fn red_win_rate(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.red_wins) / f64::from(self.total_battles)
    }

    /// Blue win rate (0.5 with no battles).
    #[must_use]
    pub fn blue_win_rate(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        f64::from(self.blue_wins) / f64::from(self.total_battles)
    }

    /// Wins for a team.
    #[must_use]
    pub fn wins(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red_wins,
            Team::Blue => self.blue_wins,
        }
    }
}

/// Run `red` against `blue` on every scenario for every seed.
pub fn run_matchup(
    config: BattleConfig,
    scenarios: &[ScenarioDescriptor],
    seeds: std::ops::Range<i64>,
    red: &[Genome],
    blue: &[Genome],
    dt: f64,
) -> MatchupStats {
    let mut stats = MatchupStats::default();
    let mut total_duration = 0.0;

    for scenario in scenarios {
        for seed in seeds.clone() {
            let mut battle = Battle::new(config, scenario, seed, red, blue);
            let Ok(result) = battle.run_to_completion(dt) else {
                continue;
            };
            stats.total_battles += 1;
            total_duration += result.duration;
            match result.winner {
                Some(Team::Red) => stats.red_wins += 1,
                Some(Team::Blue) => stats.blue_wins += 1,
                None => stats.draws += 1,
            }
            match result.victory_type {
                VictoryType::Elimination => stats.eliminations += 1,
                VictoryType::KingOfHill => stats.hill_victories += 1,
                VictoryType::Timeout => stats.timeouts += 1,
            }
        }
    }

    if stats.total_battles > 0 {
        stats.avg_duration = total_duration / f64::from(stats.total_battles);
    }
    tracing::debug!(
        battles = stats.total_battles,
        red = stats.red_wins,
        blue = stats.blue_wins,
        draws = stats.draws,
        "Matchup finished"
    );
    stats
}
