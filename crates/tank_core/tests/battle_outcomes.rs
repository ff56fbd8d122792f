//! End-to-end win-condition tests.

use tank_core::agent::TANK_RADIUS;
use tank_core::battle::{
    Battle, BattleConfig, BattleState, VictoryMode, VictoryType, DEFAULT_MIN_DURATION,
    DEFAULT_TIME_LIMIT,
};
use tank_core::battlefield::{generate_battlefield, Battlefield, HILL_BUFFER};
use tank_core::genome::Team;
use tank_core::math::Vec2;
use tank_core::scenario::{ScenarioDescriptor, ScenarioRegistry};
use tank_test_utils::fixtures::{
    aggressor, blue_penned_hill_field, hill_holder, pacifist, pen_around, quick_elimination,
    uniform_roster, walled_field,
};

#[test]
fn test_reference_open_field_layout() {
    let layout = generate_battlefield(
        800.0,
        600.0,
        &ScenarioDescriptor::open_field(),
        12345,
        Some(Vec2::new(400.0, 300.0)),
        30.0,
    );
    assert_eq!(layout.obstacles.len(), 8);
    for o in &layout.obstacles {
        assert!(o.x >= 0.0 && o.y >= 0.0 && o.right() <= 800.0 && o.bottom() <= 600.0);
        assert!(o.distance_to_point(Vec2::new(400.0, 300.0)) > 30.0 + HILL_BUFFER);
    }
}

#[test]
fn test_eliminated_team_loses() {
    let registry = ScenarioRegistry::builtin();
    for scenario in registry.iter() {
        for seed in 0..3 {
            let mut battle = Battle::new(
                quick_elimination(),
                scenario,
                seed,
                &[aggressor(); 3],
                &uniform_roster(3, 0.3),
            );
            let result = battle.run_to_completion(0.1).unwrap();
            if result.victory_type != VictoryType::Elimination {
                continue;
            }
            match result.winner {
                Some(winner) => {
                    assert!(result.team(winner).survivors > 0);
                    assert_eq!(result.team(winner.opponent()).survivors, 0);
                }
                None => {
                    assert_eq!(result.red.survivors, 0);
                    assert_eq!(result.blue.survivors, 0);
                }
            }
        }
    }
}

#[test]
fn test_empty_blue_roster_is_eliminated() {
    let mut battle = Battle::new(
        BattleConfig::default(),
        &ScenarioDescriptor::urban(),
        3,
        &uniform_roster(2, 0.5),
        &[],
    );
    let result = battle.run_to_completion(0.05).unwrap();
    assert_eq!(result.winner, Some(Team::Red));
    assert_eq!(result.victory_type, VictoryType::Elimination);
}

#[test]
fn test_wall_between_teams_ends_in_draw() {
    let config = quick_elimination();
    let field = walled_field(&config);
    let mut battle = Battle::on_battlefield(
        config,
        field,
        "walled".to_string(),
        4,
        &[aggressor(); 2],
        &[aggressor(); 2],
    );
    let result = battle.run_to_completion(0.05).unwrap();

    assert_eq!(result.victory_type, VictoryType::Timeout);
    assert_eq!(result.winner, None);
    assert!(result.tanks.iter().all(|t| t.alive && t.stats.shots_fired == 0));
}

#[test]
fn test_unopposed_hill_hold_wins() {
    let config = BattleConfig::default();
    let field = blue_penned_hill_field(&config);
    let mut battle = Battle::on_battlefield(
        config,
        field,
        "penned".to_string(),
        17,
        &[hill_holder(); 3],
        &[pacifist(); 2],
    );
    let result = battle.run_to_completion(0.05).unwrap();
    assert_eq!(result.victory_type, VictoryType::KingOfHill);
    assert_eq!(result.winner, Some(Team::Red));
    let hill = result.hill.unwrap();
    assert!(hill.red_time >= config.hill_win_time);
    assert_eq!(hill.blue_time, 0.0);
    assert!(result.duration >= config.hill_win_time);
    assert!(result.duration < config.time_limit);
}

#[test]
fn test_elimination_mode_ignores_hill() {
    let config = BattleConfig::default()
        .with_victory_mode(VictoryMode::Elimination)
        .with_time_limit(30.0);
    let field = blue_penned_hill_field(&config);
    let mut battle = Battle::on_battlefield(
        config,
        field,
        "penned".to_string(),
        17,
        &[hill_holder(); 3],
        &[pacifist(); 2],
    );
    let result = battle.run_to_completion(0.05).unwrap();
    assert_ne!(result.victory_type, VictoryType::KingOfHill);
}

#[test]
fn test_stalled_battle_times_out_late() {
    let config = BattleConfig::default();
    let red_spawn = Vec2::new(50.0, 300.0);
    let blue_spawn = Vec2::new(750.0, 300.0);
    let mut field = Battlefield::open(config.width, config.height);
    field.obstacles.extend(pen_around(red_spawn, TANK_RADIUS));
    field.obstacles.extend(pen_around(blue_spawn, TANK_RADIUS));

    let mut battle = Battle::on_battlefield(
        config,
        field,
        "pens".to_string(),
        1,
        &uniform_roster(1, 0.5),
        &uniform_roster(1, 0.5),
    );
    assert_eq!(battle.tanks()[0].position, red_spawn);
    assert_eq!(battle.tanks()[1].position, blue_spawn);
    battle.start().unwrap();

    // Well past the time limit, but the battle never started
    while battle.elapsed() < DEFAULT_TIME_LIMIT + 1.0 {
        assert!(battle.step(0.1).is_none(), "premature end at {}", battle.elapsed());
    }
    assert!(!battle.has_started());

    let result = battle.run_to_completion(0.1).unwrap();
    assert_eq!(result.victory_type, VictoryType::Timeout);
    assert!(result.duration >= DEFAULT_TIME_LIMIT + DEFAULT_MIN_DURATION - 1e-6);
    assert!(result.duration < DEFAULT_TIME_LIMIT + DEFAULT_MIN_DURATION + 0.2);
    assert!(result.is_draw());
    assert_eq!(battle.state(), BattleState::Ended);
}

#[test]
fn test_result_serializes() {
    let mut battle = Battle::new(
        quick_elimination(),
        &ScenarioDescriptor::chokepoint(),
        44,
        &uniform_roster(2, 0.6),
        &uniform_roster(2, 0.6),
    );
    let result = battle.run_to_completion(0.1).unwrap();
    let text = ron::to_string(&result).unwrap();
    let back: tank_core::battle::BattleResult = ron::from_str(&text).unwrap();
    assert_eq!(back.winner, result.winner);
    assert_eq!(back.tanks.len(), 4);
}
