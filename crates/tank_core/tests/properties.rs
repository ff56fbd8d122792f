//! Property tests over the core invariants.

use tank_core::battle::{Battle, BattleConfig};
use tank_core::battlefield::{generate_battlefield, HILL_BUFFER};
use tank_core::evolution::fitness::{evaluate_candidate, ScenarioCounts};
use tank_core::evolution::{
    crossover, mutate, tournament_select, BattleRecord, Candidate, CandidateId, CandidatePool,
};
use tank_core::genome::{Genome, Team};
use tank_core::rng::SeededRng;
use tank_core::scenario::ScenarioDescriptor;
use tank_test_utils::determinism::strategies::{
    arb_descriptor, arb_genome, arb_raw_genes, arb_roster, arb_seed, arb_team,
};
use tank_test_utils::proptest::prelude::*;

fn in_unit(genome: &Genome) -> bool {
    genome.values().iter().all(|v| (0.0..=1.0).contains(v))
}

proptest! {
    #[test]
    fn prop_rng_streams_match(seed in arb_seed(), n in 1usize..500) {
        let mut a = SeededRng::new(seed);
        let mut b = SeededRng::new(seed);
        for _ in 0..n {
            let x = a.next_f64();
            prop_assert_eq!(x, b.next_f64());
            prop_assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn prop_operators_stay_in_unit_range(
        a in arb_genome(),
        b in arb_genome(),
        seed in arb_seed(),
        rate in 0.0f64..=1.0,
        std_dev in 0.0f64..2.0,
    ) {
        let mut rng = SeededRng::new(seed);
        let child = crossover(&a, &b, 0.02, &mut rng);
        prop_assert!(in_unit(&child));
        let (mutant, _) = mutate(&a, rate, std_dev, &mut rng);
        prop_assert!(in_unit(&mutant));
    }

    #[test]
    fn prop_raw_genomes_are_sanitized(raw in arb_raw_genes(), seed in arb_seed()) {
        let mut rng = SeededRng::new(seed);
        let genome = Genome::from_raw_or_random(Some(&raw), &mut rng);
        prop_assert!(in_unit(&genome));
    }

    #[test]
    fn prop_obstacles_in_bounds_and_off_hill(descriptor in arb_descriptor(), seed in arb_seed()) {
        let layout = generate_battlefield(800.0, 600.0, &descriptor, seed, None, 30.0);
        for o in &layout.obstacles {
            prop_assert!(o.x >= 0.0 && o.y >= 0.0);
            prop_assert!(o.right() <= 800.0 + 1e-9 && o.bottom() <= 600.0 + 1e-9);
            prop_assert!(o.distance_to_point(layout.hill_center) > 30.0 + HILL_BUFFER);
        }
    }

    #[test]
    fn prop_selection_never_empty(
        red in prop::collection::vec(0.0f64..=1.0, 1..12),
        blue in prop::collection::vec(0.0f64..=1.0, 1..12),
        team in arb_team(),
        size in 1usize..6,
        seed in arb_seed(),
    ) {
        let mut pool = CandidatePool::new();
        let entries = red
            .iter()
            .map(|f| (Team::Red, *f))
            .chain(blue.iter().map(|f| (Team::Blue, *f)));
        for (t, fitness) in entries {
            let id = pool.insert(Genome::uniform(fitness), t, 0);
            pool.get_mut(id).unwrap().fitness = fitness;
        }
        let min = pool.team(team).map(|c| c.fitness).fold(f64::MAX, f64::min);
        let mut rng = SeededRng::new(seed);
        let pick = tournament_select(&pool, team, size, &mut rng);
        let parent = pick.parent.expect("team is not empty");
        prop_assert_eq!(pool.get(parent).unwrap().team, team);
        prop_assert!(pick.fitness >= min);
    }

    #[test]
    fn prop_fitness_is_clamped(
        scores in prop::collection::vec((0usize..4, -1.0f64..2.0), 0..20),
        threshold in 0u32..5,
    ) {
        let ids = ["open_field", "urban", "chokepoint", "fortress"];
        let mut candidate = Candidate::new(CandidateId(0), Genome::default(), Team::Blue, 0);
        let mut counts = ScenarioCounts::new();
        for (scenario, score) in scores {
            candidate.record(BattleRecord {
                scenario_id: ids[scenario].to_string(),
                seed: 0,
                generation: 0,
                won: false,
                drawn: false,
                opponent_strength: 0.5,
                score,
            });
            *counts.entry(ids[scenario].to_string()).or_default() += 1;
        }
        let (fitness, _) = evaluate_candidate(&candidate, &counts, threshold, &[]);
        prop_assert!((0.0..=1.0).contains(&fitness));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_health_never_negative(
        red in arb_roster(3),
        blue in arb_roster(3),
        seed in arb_seed(),
    ) {
        let mut battle = Battle::new(
            BattleConfig::default().with_time_limit(10.0),
            &ScenarioDescriptor::open_field(),
            seed,
            &red,
            &blue,
        );
        battle.start().unwrap();
        for _ in 0..150 {
            battle.step(0.1);
            for tank in battle.tanks() {
                prop_assert!(tank.health >= 0.0);
                prop_assert!(tank.alive == (tank.health > 0.0));
            }
            if let Some(hill) = battle.battlefield().hill {
                prop_assert!(hill.control.red_time >= 0.0 && hill.control.blue_time >= 0.0);
            }
        }
    }

    #[test]
    fn prop_hill_time_monotonic(seed in arb_seed()) {
        let mut battle = Battle::new(
            BattleConfig::default().with_time_limit(15.0),
            &ScenarioDescriptor::fortress(),
            seed,
            &[Genome::uniform(0.8); 2],
            &[Genome::uniform(0.8); 2],
        );
        battle.start().unwrap();
        let mut last = (0.0, 0.0);
        while battle.step(0.1).is_none() {
            let control = battle.battlefield().hill.map(|h| h.control).unwrap_or_default();
            prop_assert!(control.red_time >= last.0 && control.blue_time >= last.1);
            last = (control.red_time, control.blue_time);
        }
    }
}
