//! Multi-generation evolution runs across scenarios.

use tank_core::battle::{Battle, BattleConfig};
use tank_core::evolution::fitness::red_queen_multiplier;
use tank_core::evolution::{
    advance_generation, advance_generation_with, Candidate, EvolutionConfig, EvolutionState,
    FitnessContributor, FitnessSource,
};
use tank_core::genome::Team;
use tank_core::scenario::ScenarioRegistry;

fn play_generation(
    state: &mut EvolutionState,
    config: &EvolutionConfig,
    registry: &ScenarioRegistry,
    seed_base: i64,
) {
    let battle_config = BattleConfig::default().with_time_limit(12.0);
    for (i, scenario_id) in ["open_field", "urban"].iter().enumerate() {
        let scenario = registry.resolve(scenario_id);
        for round in 0..3 {
            let red = state.select_roster(Team::Red, 2);
            let blue = state.select_roster(Team::Blue, 2);
            let seed = seed_base + (i as i64) * 100 + round;
            let mut battle = Battle::new(
                battle_config,
                &scenario,
                seed,
                &state.roster_genomes(&red).unwrap(),
                &state.roster_genomes(&blue).unwrap(),
            );
            let result = battle.run_to_completion(0.1).unwrap();
            state.record_battle(&red, &blue, &result, config);
        }
    }
}

#[test]
fn test_generations_advance_and_stay_valid() {
    let config = EvolutionConfig::default();
    let registry = ScenarioRegistry::builtin();
    let mut state = EvolutionState::seeded(2024, &config);

    for generation in 0..3 {
        play_generation(&mut state, &config, &registry, i64::from(generation) * 1000);
        let (next, summary) = advance_generation(state, &config);
        state = next;

        assert_eq!(summary.generation, generation);
        assert_eq!(summary.battles, 6);
        assert_eq!(summary.pool_sizes, [8, 8]);
        assert!(summary.red.best_fitness >= summary.red.average_fitness);
        assert!(summary.blue.best_fitness >= summary.blue.average_fitness);
    }

    assert_eq!(state.generation, 3);
    assert!(state.pool.iter().all(|c| (0.0..=1.0).contains(&c.fitness)));
    assert_eq!(state.tally.team(Team::Red).get("open_field"), Some(&9));
}

#[test]
fn test_scenario_comparative_after_enough_battles() {
    let config = EvolutionConfig::default().with_pool_size(2).with_elite_count(2);
    let registry = ScenarioRegistry::builtin();
    let mut state = EvolutionState::seeded(7, &config);
    play_generation(&mut state, &config, &registry, 0);

    // Both scenarios have three team battles; every candidate fought in both
    let sources: Vec<_> = state.pool.iter().map(|c| c.fitness_source).collect();
    assert!(sources.iter().all(|s| *s == FitnessSource::ScenarioComparative), "{sources:?}");
}

/// Rates every candidate perfect at full weight.
struct Perfect;

impl FitnessContributor for Perfect {
    fn name(&self) -> &str {
        "perfect"
    }
    fn weight(&self) -> f64 {
        1.0
    }
    fn score(&self, _: &Candidate) -> Option<f64> {
        Some(1.0)
    }
}

#[test]
fn test_contributors_survive_recorded_battles() {
    let config = EvolutionConfig::default().with_pool_size(4);
    let registry = ScenarioRegistry::builtin();
    let contributors: Vec<Box<dyn FitnessContributor>> = vec![Box::new(Perfect)];
    let state = EvolutionState::seeded(31, &config);

    let (mut state, _) = advance_generation_with(state, &config, &contributors);
    // Offspring without battles are blended too
    assert!(state.pool.iter().all(|c| (c.fitness - 1.0).abs() < 1e-9));

    let scenario = registry.resolve("open_field");
    let red = state.select_roster(Team::Red, 2);
    let blue = state.select_roster(Team::Blue, 2);
    let mut battle = Battle::new(
        BattleConfig::default().with_time_limit(8.0),
        &scenario,
        17,
        &state.roster_genomes(&red).unwrap(),
        &state.roster_genomes(&blue).unwrap(),
    );
    let result = battle.run_to_completion(0.1).unwrap();
    state.record_battle_with(&red, &blue, &result, &config, &contributors);

    assert_eq!(state.total_battles, 1);
    let fitness: Vec<f64> = state.pool.iter().map(|c| c.fitness).collect();
    assert!(fitness.iter().all(|f| (f - 1.0).abs() < 1e-9), "{fitness:?}");
}

#[test]
fn test_strong_opponent_worth_more() {
    assert!(red_queen_multiplier(0.9) > red_queen_multiplier(0.5));
    assert!(red_queen_multiplier(0.5) > red_queen_multiplier(0.1));
}

#[test]
fn test_state_round_trips_through_ron() {
    let config = EvolutionConfig::default().with_pool_size(3);
    let registry = ScenarioRegistry::builtin();
    let mut state = EvolutionState::seeded(99, &config);
    play_generation(&mut state, &config, &registry, 5);
    let text = ron::to_string(&state).unwrap();
    let restored: EvolutionState = ron::from_str(&text).unwrap();
    assert_eq!(restored.generation, state.generation);
    assert_eq!(restored.pool.len(), state.pool.len());
}
