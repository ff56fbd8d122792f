//! Arena driver.
//!
//! Owns the evolution state and feeds battle and generation work through an
//! [`EvaluationQueue`]. Because the queue runs one task at a time, the
//! candidate pool is only ever touched by the active task. Observers follow
//! progress by subscribing to [`ArenaEvent`]s.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tank_core::battle::{Battle, BattleResult};
use tank_core::error::CoreError;
use tank_core::evolution::{
    advance_generation, source_breakdown, CandidateId, EvolutionState, GenerationSummary,
};
use tank_core::genome::Team;
use tank_core::scenario::ScenarioRegistry;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::ArenaConfig;
use crate::export::{BattleDigest, RunReport};
use crate::queue::{EvaluationQueue, TaskHandle};

/// Seed stride between generations.
const GENERATION_SEED_STRIDE: i64 = 10_000;

/// Errors from arena tasks.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// The core rejected the battle.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The simulation thread was cancelled before finishing.
    #[error("Battle simulation was cancelled")]
    Cancelled,

    /// A drawn roster named a candidate that is no longer in the pool.
    #[error("Roster references a candidate missing from the pool")]
    StaleRoster,
}

/// A battle to fight with candidates from the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRequest {
    /// Red tanks.
    pub red_size: usize,
    /// Blue tanks.
    pub blue_size: usize,
    /// Scenario id; unknown ids fall back to the default scenario.
    pub scenario_id: String,
    /// Battle seed.
    pub seed: i64,
}

impl BattleRequest {
    /// Even battle of `size` against `size`.
    #[must_use]
    pub fn even(size: usize, scenario_id: &str, seed: i64) -> Self {
        Self {
            red_size: size,
            blue_size: size,
            scenario_id: scenario_id.to_string(),
            seed,
        }
    }
}

/// Progress published to subscribers.
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    /// A battle finished and was folded into the pool.
    BattleFinished {
        /// Generation it counted toward.
        generation: u32,
        /// Red roster, in spawn order.
        red: Vec<CandidateId>,
        /// Blue roster, in spawn order.
        blue: Vec<CandidateId>,
        /// Full result.
        result: Box<BattleResult>,
    },
    /// A generation advanced.
    GenerationAdvanced(Box<GenerationSummary>),
}

#[derive(Debug)]
struct Shared {
    config: ArenaConfig,
    registry: ScenarioRegistry,
    state: Mutex<EvolutionState>,
    events: broadcast::Sender<ArenaEvent>,
}

impl Shared {
    fn publish(&self, event: ArenaEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Evolution driver over an evaluation queue.
#[derive(Debug)]
pub struct Arena {
    shared: Arc<Shared>,
    queue: EvaluationQueue,
}

impl Arena {
    /// Create an arena with a freshly seeded pool.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(config: ArenaConfig, registry: ScenarioRegistry) -> Self {
        let state = EvolutionState::seeded(config.seed, &config.evolution);
        Self::with_state(config, registry, state)
    }

    /// Create an arena that continues from an existing state.
    #[must_use]
    pub fn with_state(
        config: ArenaConfig,
        registry: ScenarioRegistry,
        state: EvolutionState,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        info!(
            seed = config.seed,
            generation = state.generation,
            scenarios = registry.len(),
            "Arena ready"
        );
        Self {
            shared: Arc::new(Shared {
                config,
                registry,
                state: Mutex::new(state),
                events,
            }),
            queue: EvaluationQueue::new(),
        }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.shared.events.subscribe()
    }

    /// Arena configuration.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.shared.config
    }

    /// Whether queued work is still outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.queue.is_running()
    }

    /// Copy of the current evolution state.
    pub async fn snapshot(&self) -> EvolutionState {
        self.shared.state.lock().await.clone()
    }

    /// Queue a battle between pool candidates.
    ///
    /// Rosters are drawn when the task starts, not when it is queued, so a
    /// battle sees the pool as left by everything queued before it.
    pub fn request_battle(&self, request: BattleRequest) -> TaskHandle<BattleResult, ArenaError> {
        let shared = Arc::clone(&self.shared);
        self.queue.submit(async move { fight(&shared, request).await })
    }

    /// Queue a generation advance behind the pending battles.
    ///
    /// The advance works on a copy; the stored state is only replaced once
    /// it succeeds.
    pub fn request_generation_advance(&self) -> TaskHandle<GenerationSummary, ArenaError> {
        let shared = Arc::clone(&self.shared);
        self.queue.submit(async move {
            let mut state = shared.state.lock().await;
            let (next, summary) = advance_generation(state.clone(), &shared.config.evolution);
            *state = next;
            debug!(sources = ?source_breakdown(&state.pool), "Fitness sources after advance");
            drop(state);

            shared.publish(ArenaEvent::GenerationAdvanced(Box::new(summary.clone())));
            Ok(summary)
        })
    }

    /// Run the configured number of generations.
    ///
    /// Each generation queues `battles_per_generation` battles, rotating
    /// through the scenarios, then advances. Failed tasks are logged and
    /// counted; the run carries on.
    pub async fn run(&self) -> RunReport {
        let config = &self.shared.config;
        let rotation = config.rotation(&self.shared.registry);
        let mut summaries = Vec::new();
        let mut battles = Vec::new();
        let mut failed = 0;

        for _ in 0..config.generations {
            let generation = self.shared.state.lock().await.generation;
            let handles: Vec<_> = (0..config.battles_per_generation)
                .map(|index| self.request_battle(self.plan(&rotation, generation, index)))
                .collect();
            for handle in handles {
                match handle.await {
                    Ok(result) => battles.push(BattleDigest::new(generation, &result)),
                    Err(err) => {
                        failed += 1;
                        warn!(generation, %err, "Battle task failed");
                    }
                }
            }
            match self.request_generation_advance().await {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    failed += 1;
                    warn!(generation, %err, "Generation advance failed");
                }
            }
        }

        let state = self.snapshot().await;
        RunReport::new(config.seed, summaries, battles, failed, &state)
    }

    /// Stop the queue after the queued work finishes.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }

    fn plan(&self, rotation: &[String], generation: u32, index: u32) -> BattleRequest {
        let config = &self.shared.config;
        let scenario = if rotation.is_empty() {
            String::new()
        } else {
            rotation[index as usize % rotation.len()].clone()
        };
        let seed = config
            .seed
            .wrapping_add(i64::from(generation).wrapping_mul(GENERATION_SEED_STRIDE))
            .wrapping_add(i64::from(index));
        BattleRequest {
            red_size: config.roster_size,
            blue_size: config.roster_size,
            scenario_id: scenario,
            seed,
        }
    }
}

async fn fight(shared: &Shared, request: BattleRequest) -> Result<BattleResult, ArenaError> {
    let descriptor = shared.registry.resolve(&request.scenario_id);
    let (generation, red_ids, blue_ids, red, blue) = {
        let mut state = shared.state.lock().await;
        let red_ids = state.select_roster(Team::Red, request.red_size);
        let blue_ids = state.select_roster(Team::Blue, request.blue_size);
        let red = state.roster_genomes(&red_ids).ok_or(ArenaError::StaleRoster)?;
        let blue = state.roster_genomes(&blue_ids).ok_or(ArenaError::StaleRoster)?;
        (state.generation, red_ids, blue_ids, red, blue)
    };

    debug!(
        scenario = %descriptor.id,
        seed = request.seed,
        red = red.len(),
        blue = blue.len(),
        "Starting battle"
    );

    let battle_config = shared.config.battle;
    let dt = shared.config.dt;
    let seed = request.seed;
    let simulation = tokio::task::spawn_blocking(move || {
        Battle::new(battle_config, &descriptor, seed, &red, &blue).run_to_completion(dt)
    });
    let result = match simulation.await {
        Ok(outcome) => outcome?,
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(_) => return Err(ArenaError::Cancelled),
    };

    shared
        .state
        .lock()
        .await
        .record_battle(&red_ids, &blue_ids, &result, &shared.config.evolution);

    shared.publish(ArenaEvent::BattleFinished {
        generation,
        red: red_ids,
        blue: blue_ids,
        result: Box::new(result.clone()),
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tank_core::battle::BattleConfig;
    use tank_core::evolution::EvolutionConfig;

    fn small_config() -> ArenaConfig {
        ArenaConfig::default()
            .with_seed(9)
            .with_schedule(1, 2)
            .with_roster_size(2)
            .with_battle(BattleConfig::default().with_time_limit(10.0))
            .with_evolution(EvolutionConfig::default().with_pool_size(4))
    }

    #[tokio::test]
    async fn test_plan_rotates_scenarios() {
        let arena = Arena::new(small_config(), ScenarioRegistry::builtin());
        let rotation = vec!["urban".to_string(), "fortress".to_string()];
        let first = arena.plan(&rotation, 0, 0);
        let second = arena.plan(&rotation, 0, 1);
        let third = arena.plan(&rotation, 1, 2);
        assert_eq!(first.scenario_id, "urban");
        assert_eq!(second.scenario_id, "fortress");
        assert_eq!(third.scenario_id, "urban");
        assert_eq!(second.seed, first.seed + 1);
        assert_eq!(third.seed, 9 + GENERATION_SEED_STRIDE + 2);
        assert_eq!(first.red_size, 2);
    }

    #[tokio::test]
    async fn test_battle_updates_pool_and_publishes() {
        let arena = Arena::new(small_config(), ScenarioRegistry::builtin());
        let mut events = arena.subscribe();

        let result = arena
            .request_battle(BattleRequest::even(2, "open_field", 5))
            .await
            .unwrap();
        assert_eq!(result.scenario_id, "open_field");
        assert_eq!(result.tanks.len(), 4);

        match events.recv().await.unwrap() {
            ArenaEvent::BattleFinished { red, blue, result, .. } => {
                assert_eq!(red.len(), 2);
                assert_eq!(blue.len(), 2);
                assert_eq!(result.seed, 5);
            }
            other => panic!("unexpected {other:?}"),
        }

        let state = arena.snapshot().await;
        assert_eq!(state.total_battles, 1);
        assert!(!arena.is_busy());
    }

    #[tokio::test]
    async fn test_generation_advance_replaces_state() {
        let arena = Arena::new(small_config(), ScenarioRegistry::builtin());
        let mut events = arena.subscribe();
        arena
            .request_battle(BattleRequest::even(2, "urban", 8))
            .await
            .unwrap();
        let before = arena.snapshot().await;

        let summary = arena.request_generation_advance().await.unwrap();
        assert_eq!(summary.generation, 0);
        assert_eq!(summary.battles, 1);

        let after = arena.snapshot().await;
        assert_eq!(after.generation, before.generation + 1);
        assert_eq!(after.total_battles, before.total_battles);
        assert_eq!(after.pool.team_size(Team::Red), 4);
        assert_eq!(after.pool.team_size(Team::Blue), 4);
        assert_ne!(after.pool, before.pool);

        let mut advanced = None;
        while let Ok(event) = events.try_recv() {
            if let ArenaEvent::GenerationAdvanced(s) = event {
                advanced = Some(s);
            }
        }
        assert_eq!(advanced.map(|s| s.generation), Some(0));
    }

    #[tokio::test]
    async fn test_unknown_scenario_falls_back() {
        let arena = Arena::new(small_config(), ScenarioRegistry::builtin());
        let result = arena
            .request_battle(BattleRequest::even(1, "volcano", 3))
            .await
            .unwrap();
        assert_eq!(result.scenario_id, "open_field");
    }
}
