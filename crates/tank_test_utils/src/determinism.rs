//! Determinism testing utilities.
//!
//! Battles must be reproducible from `(scenario, seed, rosters)` so that a
//! candidate's fitness can be re-derived and a run can be replayed.
//! Sources of non-determinism to watch for:
//!
//! - **Map iteration order**: the candidate pool is a `BTreeMap`, never a
//!   `HashMap`.
//! - **System randomness**: every draw comes from a seeded
//!   [`tank_core::rng::SeededRng`].
//! - **Update order**: tanks update in roster order, projectiles in firing
//!   order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tank_core::battle::Battle;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// All unique hashes (1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Battle is non-deterministic!\n\
             Runs: {}\n\
             Steps: {}\n\
             Unique hashes: {} (expected 1)\n\
             All hashes: {:?}",
            self.hashes.len(),
            self.steps,
            self.unique_hashes().len(),
            self.hashes
        );
    }
}

/// Run a setup/step/hash cycle several times and compare final hashes.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..steps {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        steps,
    }
}

/// Run a battle twice with identical setup and compare state hashes.
///
/// The battle is started before stepping if it is still ready.
pub fn verify_battle_determinism<F>(setup_fn: F, steps: u64, dt: f64) -> DeterminismResult
where
    F: Fn() -> Battle,
{
    verify_determinism(
        2,
        steps,
        || {
            let mut battle = setup_fn();
            // Already-running battles are fine
            let _ = battle.start();
            battle
        },
        |battle| {
            battle.step(dt);
        },
        Battle::state_hash,
    )
}

/// Step two copies side by side; return the first step whose hashes differ.
pub fn find_first_divergence<F>(setup_fn: F, steps: u64, dt: f64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let mut a = setup_fn();
    let mut b = setup_fn();
    let _ = a.start();
    let _ = b.start();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }
    for step in 1..=steps {
        a.step(dt);
        b.step(dt);
        if a.state_hash() != b.state_hash() {
            tracing::warn!(step, "Battles diverged");
            return Some(step);
        }
    }
    None
}

/// Hash any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for core types.
pub mod strategies {
    use proptest::prelude::*;
    use tank_core::genome::{Genome, Team, GENE_COUNT};
    use tank_core::scenario::{HillPlacement, ScenarioDescriptor, ScenarioKind};

    /// Any valid gene value.
    pub fn arb_gene() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    /// Any valid genome.
    pub fn arb_genome() -> impl Strategy<Value = Genome> {
        proptest::array::uniform9(arb_gene()).prop_map(Genome::new)
    }

    /// Raw gene data that may be out of range or not finite.
    pub fn arb_raw_genes() -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(
            prop_oneof![
                -10.0f64..10.0,
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
            ],
            0..GENE_COUNT * 2,
        )
    }

    /// Battle and generator seeds, including non-positive ones.
    pub fn arb_seed() -> impl Strategy<Value = i64> {
        prop_oneof![
            -1_000_000i64..1_000_000,
            Just(0i64),
            Just(i64::MIN),
            Just(i64::MAX),
        ]
    }

    /// Either team.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        prop_oneof![Just(Team::Red), Just(Team::Blue)]
    }

    /// Any obstacle layout.
    pub fn arb_scenario_kind() -> impl Strategy<Value = ScenarioKind> {
        prop_oneof![
            Just(ScenarioKind::OpenField),
            Just(ScenarioKind::Urban),
            Just(ScenarioKind::Chokepoint),
            Just(ScenarioKind::Fortress),
        ]
    }

    /// Any hill placement hint.
    pub fn arb_hill_placement() -> impl Strategy<Value = HillPlacement> {
        prop_oneof![
            Just(HillPlacement::Center),
            Just(HillPlacement::Jittered),
            Just(HillPlacement::Wide),
        ]
    }

    /// Scenario descriptors with arbitrary counts and size ranges.
    pub fn arb_descriptor() -> impl Strategy<Value = ScenarioDescriptor> {
        (
            arb_scenario_kind(),
            0u32..30,
            10.0f64..80.0,
            10.0f64..80.0,
            arb_hill_placement(),
        )
            .prop_map(|(kind, count, a, b, placement)| {
                ScenarioDescriptor::new("generated", "Generated", kind, count)
                    .with_obstacle_size(a, b)
                    .with_hill_placement(placement)
            })
    }

    /// A team roster of 1 to `max` genomes.
    pub fn arb_roster(max: usize) -> impl Strategy<Value = Vec<Genome>> {
        proptest::collection::vec(arb_genome(), 1..=max.max(1))
    }
}
