//! Test fixtures and helpers.
//!
//! Pre-built rosters, battlefields and battles for consistent testing.

use tank_core::battle::{Battle, BattleConfig, VictoryMode};
use tank_core::battlefield::Battlefield;
use tank_core::genome::{Gene, Genome};
use tank_core::math::{Rect, Vec2};
use tank_core::scenario::ScenarioDescriptor;

/// `n` copies of a uniform genome.
#[must_use]
pub fn uniform_roster(n: usize, value: f64) -> Vec<Genome> {
    vec![Genome::uniform(value); n]
}

/// Genome that charges and shoots.
#[must_use]
pub fn aggressor() -> Genome {
    Genome::uniform(0.5)
        .with(Gene::Aggression, 1.0)
        .with(Gene::Accuracy, 0.9)
        .with(Gene::Speed, 0.8)
        .with(Gene::RiskTaking, 0.9)
}

/// Genome that heads for the hill and holds it.
#[must_use]
pub fn hill_holder() -> Genome {
    Genome::uniform(0.5)
        .with(Gene::Adaptability, 1.0)
        .with(Gene::Teamwork, 1.0)
        .with(Gene::Speed, 1.0)
}

/// Genome that never engages: zero aggression and accuracy.
#[must_use]
pub fn pacifist() -> Genome {
    Genome::uniform(0.0)
}

/// A ready battle with default settings.
#[must_use]
pub fn duel(scenario: &ScenarioDescriptor, seed: i64, red: &[Genome], blue: &[Genome]) -> Battle {
    Battle::new(BattleConfig::default(), scenario, seed, red, blue)
}

/// Obstacle-free battlefield with a hill in the centre.
#[must_use]
pub fn open_hill_field(config: &BattleConfig) -> Battlefield {
    Battlefield::open(config.width, config.height)
        .with_hill(Vec2::new(config.width / 2.0, config.height / 2.0), config.hill_radius)
}

/// Battlefield split by a solid wall, so the teams can never see each other.
#[must_use]
pub fn walled_field(config: &BattleConfig) -> Battlefield {
    let x = config.width / 2.0 - 10.0;
    Battlefield::open(config.width, config.height)
        .with_obstacle(Rect::new(x, 0.0, 20.0, config.height))
}

/// Centre hill with blue penned behind a wall on the right edge.
///
/// Blue can neither see nor reach the hill, so red holds it unopposed.
#[must_use]
pub fn blue_penned_hill_field(config: &BattleConfig) -> Battlefield {
    let wall_x = config.width - 120.0;
    open_hill_field(config).with_obstacle(Rect::new(wall_x, 0.0, 20.0, config.height))
}

/// Walls boxing a tank at `center` so tightly it cannot move more than a pixel.
#[must_use]
pub fn pen_around(center: Vec2, radius: f64) -> [Rect; 4] {
    let gap = radius + 0.5;
    let span = 2.0 * gap + 20.0;
    [
        Rect::new(center.x - gap - 10.0, center.y - gap - 10.0, 10.0, span),
        Rect::new(center.x + gap, center.y - gap - 10.0, 10.0, span),
        Rect::new(center.x - gap - 10.0, center.y - gap - 10.0, span, 10.0),
        Rect::new(center.x - gap - 10.0, center.y + gap, span, 10.0),
    ]
}

/// Elimination-mode config that ends quickly.
#[must_use]
pub fn quick_elimination() -> BattleConfig {
    BattleConfig::default()
        .with_victory_mode(VictoryMode::Elimination)
        .with_time_limit(20.0)
}
