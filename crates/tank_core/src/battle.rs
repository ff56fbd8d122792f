//! Battle orchestrator.
//!
//! A [`Battle`] owns the battlefield, the tanks of both teams, projectiles in
//! flight and the battle RNG. It moves through `Ready → Running ⇄ Paused →
//! Ended` and produces exactly one [`BattleResult`] when it ends.
//!
//! # Determinism
//!
//! Given the same configuration, scenario, seed and rosters, a battle stepped
//! with the same sequence of `dt` values always reaches the same state:
//! - Every random draw comes from the battle's [`SeededRng`]
//! - Tanks update in roster order (red first, then blue)
//! - Projectiles resolve in firing order
//!
//! # Example
//!
//! ```
//! use tank_core::battle::{Battle, BattleConfig};
//! use tank_core::genome::Genome;
//! use tank_core::scenario::ScenarioDescriptor;
//!
//! let red = vec![Genome::uniform(0.6); 2];
//! let blue = vec![Genome::uniform(0.4); 2];
//! let mut battle = Battle::new(
//!     BattleConfig::default(),
//!     &ScenarioDescriptor::open_field(),
//!     42,
//!     &red,
//!     &blue,
//! );
//! let result = battle.run_to_completion(0.05).unwrap();
//! assert!(result.duration > 0.0);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::agent::{BehaviorState, Tank, TankStats, WorldView, TANK_RADIUS};
use crate::battlefield::{
    generate_battlefield, Battlefield, Hill, DEFAULT_HEIGHT, DEFAULT_HILL_RADIUS, DEFAULT_WIDTH,
};
use crate::combat::{advance_projectiles, separate_tanks, try_fire, Projectile};
use crate::error::{CoreError, Result};
use crate::genome::{Genome, Team};
use crate::math::Vec2;
use crate::rng::SeededRng;
use crate::scenario::ScenarioDescriptor;

/// Largest time step a single `step` call will simulate.
pub const DEFAULT_MAX_DT: f64 = 0.1;

/// Seconds of uninterrupted sole control needed to win the hill.
pub const DEFAULT_HILL_WIN_TIME: f64 = 10.0;

/// Battle time limit in seconds.
pub const DEFAULT_TIME_LIMIT: f64 = 120.0;

/// No timeout is declared before this many seconds.
pub const DEFAULT_MIN_DURATION: f64 = 5.0;

/// A tank must move this far from its spawn for the battle to count as started.
pub const START_MOVEMENT_THRESHOLD: f64 = 5.0;

/// Distance of spawn columns from the left and right edges.
const SPAWN_MARGIN: f64 = 50.0;

/// How the battle is won besides elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VictoryMode {
    /// Last team standing wins; no hill.
    Elimination,
    /// Holding the hill alone long enough also wins.
    #[default]
    KingOfHill,
}

/// Tunable battle parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Canvas width.
    pub width: f64,
    /// Canvas height.
    pub height: f64,
    /// Victory mode.
    pub victory_mode: VictoryMode,
    /// Largest simulated step.
    pub max_dt: f64,
    /// Continuous hill control needed to win.
    pub hill_win_time: f64,
    /// Time limit.
    pub time_limit: f64,
    /// Minimum duration before a timeout may be declared.
    pub min_duration: f64,
    /// Hill radius.
    pub hill_radius: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            victory_mode: VictoryMode::default(),
            max_dt: DEFAULT_MAX_DT,
            hill_win_time: DEFAULT_HILL_WIN_TIME,
            time_limit: DEFAULT_TIME_LIMIT,
            min_duration: DEFAULT_MIN_DURATION,
            hill_radius: DEFAULT_HILL_RADIUS,
        }
    }
}

impl BattleConfig {
    /// Set the canvas size.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the victory mode.
    #[must_use]
    pub fn with_victory_mode(mut self, mode: VictoryMode) -> Self {
        self.victory_mode = mode;
        self
    }

    /// Set the time limit.
    #[must_use]
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = seconds;
        self
    }

    /// Set the minimum duration before a timeout.
    #[must_use]
    pub fn with_min_duration(mut self, seconds: f64) -> Self {
        self.min_duration = seconds;
        self
    }

    /// Set the continuous hill control needed to win.
    #[must_use]
    pub fn with_hill_win_time(mut self, seconds: f64) -> Self {
        self.hill_win_time = seconds;
        self
    }

    /// Set the largest simulated step.
    #[must_use]
    pub fn with_max_dt(mut self, dt: f64) -> Self {
        self.max_dt = dt;
        self
    }
}

/// Battle lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleState {
    /// Set up, not yet started.
    Ready,
    /// Advancing on `step`.
    Running,
    /// Suspended; `step` does nothing.
    Paused,
    /// Finished; the result is available.
    Ended,
}

/// How a battle was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryType {
    /// One or both teams were destroyed.
    Elimination,
    /// A team held the hill long enough.
    KingOfHill,
    /// The time limit was reached.
    Timeout,
}

/// Aggregate statistics for one team.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    /// Team.
    pub team: Team,
    /// Roster size.
    pub tanks: usize,
    /// Tanks alive at the end.
    pub survivors: usize,
    /// Sum of remaining health.
    pub total_health: f64,
    /// Sum of starting health.
    pub max_health: f64,
    /// Damage dealt by the team.
    pub damage_dealt: f64,
    /// Damage received by the team.
    pub damage_taken: f64,
    /// Shots fired.
    pub shots_fired: u32,
    /// Shots that hit.
    pub shots_hit: u32,
    /// Enemies destroyed.
    pub kills: u32,
    /// Sole hill control time.
    pub hill_time: f64,
}

impl TeamStats {
    fn collect(team: Team, tanks: &[Tank], hill: Option<&Hill>) -> Self {
        let mut stats = Self {
            team,
            tanks: 0,
            survivors: 0,
            total_health: 0.0,
            max_health: 0.0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            shots_fired: 0,
            shots_hit: 0,
            kills: 0,
            hill_time: hill.map_or(0.0, |h| h.control.time_for(team)),
        };
        for t in tanks.iter().filter(|t| t.team == team) {
            stats.tanks += 1;
            stats.survivors += usize::from(t.alive);
            stats.total_health += t.health;
            stats.max_health += t.profile.max_health;
            stats.damage_dealt += t.stats.damage_dealt;
            stats.damage_taken += t.stats.damage_taken;
            stats.shots_fired += t.stats.shots_fired;
            stats.shots_hit += t.stats.shots_hit;
            stats.kills += t.stats.kills;
        }
        stats
    }

    /// Team hit ratio.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.shots_fired == 0 {
            0.0
        } else {
            f64::from(self.shots_hit) / f64::from(self.shots_fired)
        }
    }
}

/// Final report for one tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankReport {
    /// Roster index.
    pub id: usize,
    /// Team.
    pub team: Team,
    /// Genome the tank fought with.
    pub genome: Genome,
    /// Alive at the end.
    pub alive: bool,
    /// Remaining health.
    pub health: f64,
    /// State at the end.
    pub final_state: BehaviorState,
    /// Cumulative statistics.
    pub stats: TankStats,
}

/// Hill control breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HillReport {
    /// Hill centre.
    pub center: Vec2,
    /// Hill radius.
    pub radius: f64,
    /// Red sole-control time.
    pub red_time: f64,
    /// Blue sole-control time.
    pub blue_time: f64,
    /// Time both teams were on the hill.
    pub contested_time: f64,
    /// Holder when the battle ended.
    pub final_controller: Option<Team>,
}

/// Outcome of a finished battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResult {
    /// Winning team; `None` is a draw.
    pub winner: Option<Team>,
    /// How the battle was decided.
    pub victory_type: VictoryType,
    /// Battle time in seconds.
    pub duration: f64,
    /// Red aggregate.
    pub red: TeamStats,
    /// Blue aggregate.
    pub blue: TeamStats,
    /// Per-tank reports in roster order.
    pub tanks: Vec<TankReport>,
    /// Hill breakdown, for king-of-the-hill battles.
    pub hill: Option<HillReport>,
    /// Scenario the battlefield came from.
    pub scenario_id: String,
    /// Battle seed.
    pub seed: i64,
}

impl BattleResult {
    /// Aggregate for a team.
    #[must_use]
    pub fn team(&self, team: Team) -> &TeamStats {
        match team {
            Team::Red => &self.red,
            Team::Blue => &self.blue,
        }
    }

    /// Whether nobody won.
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }

    /// Reports for one team's tanks.
    pub fn tanks_of(&self, team: Team) -> impl Iterator<Item = &TankReport> {
        self.tanks.iter().filter(move |t| t.team == team)
    }
}

/// Snapshot of everything the win conditions look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalInputs {
    /// Live red tanks.
    pub red_alive: usize,
    /// Live blue tanks.
    pub blue_alive: usize,
    /// Remaining red health.
    pub red_health: f64,
    /// Remaining blue health.
    pub blue_health: f64,
    /// Current sole hill holder.
    pub hill_controller: Option<Team>,
    /// How long the holder has held the hill without interruption.
    pub continuous_hill_time: f64,
    /// Battle time.
    pub elapsed: f64,
    /// Whether any tank has moved away from its spawn.
    pub started: bool,
}

/// Evaluate win conditions in priority order.
///
/// Returns `(winner, victory type)` when the battle is over.
#[must_use]
pub fn check_outcome(
    inputs: &TerminalInputs,
    config: &BattleConfig,
) -> Option<(Option<Team>, VictoryType)> {
    match (inputs.red_alive, inputs.blue_alive) {
        (0, 0) => return Some((None, VictoryType::Elimination)),
        (0, _) => return Some((Some(Team::Blue), VictoryType::Elimination)),
        (_, 0) => return Some((Some(Team::Red), VictoryType::Elimination)),
        _ => {}
    }

    if config.victory_mode == VictoryMode::KingOfHill {
        if let Some(team) = inputs.hill_controller {
            if inputs.continuous_hill_time >= config.hill_win_time {
                return Some((Some(team), VictoryType::KingOfHill));
            }
        }
    }

    // A stalled battle still ends, just later
    let timeout_due = inputs.elapsed >= config.time_limit
        && inputs.elapsed >= config.min_duration
        && (inputs.started || inputs.elapsed >= config.time_limit + config.min_duration);
    if timeout_due {
        let winner = if (inputs.red_health - inputs.blue_health).abs() < 1e-9 {
            None
        } else if inputs.red_health > inputs.blue_health {
            Some(Team::Red)
        } else {
            Some(Team::Blue)
        };
        return Some((winner, VictoryType::Timeout));
    }

    None
}

#[derive(Serialize)]
struct Snapshot<'a> {
    state: BattleState,
    elapsed: f64,
    started: bool,
    rng: &'a SeededRng,
    tanks: &'a [Tank],
    projectiles: &'a [Projectile],
    hill: Option<&'a Hill>,
}

/// A single battle between a red and a blue roster.
#[derive(Debug, Clone)]
pub struct Battle {
    config: BattleConfig,
    scenario_id: String,
    seed: i64,
    field: Battlefield,
    tanks: Vec<Tank>,
    projectiles: Vec<Projectile>,
    rng: SeededRng,
    state: BattleState,
    elapsed: f64,
    started: bool,
    steps: u64,
    result: Option<BattleResult>,
}

impl Battle {
    /// Set up a battle on a battlefield generated from `descriptor` and `seed`.
    #[must_use]
    pub fn new(
        config: BattleConfig,
        descriptor: &ScenarioDescriptor,
        seed: i64,
        red: &[Genome],
        blue: &[Genome],
    ) -> Self {
        let layout = generate_battlefield(
            config.width,
            config.height,
            descriptor,
            seed,
            None,
            config.hill_radius,
        );
        let field = Battlefield {
            width: config.width,
            height: config.height,
            obstacles: layout.obstacles,
            hill: (config.victory_mode == VictoryMode::KingOfHill)
                .then(|| Hill::new(layout.hill_center, config.hill_radius)),
        };
        Self::on_battlefield(config, field, descriptor.id.clone(), seed, red, blue)
    }

    /// Set up a battle on a prepared battlefield.
    #[must_use]
    pub fn on_battlefield(
        config: BattleConfig,
        field: Battlefield,
        scenario_id: String,
        seed: i64,
        red: &[Genome],
        blue: &[Genome],
    ) -> Self {
        let mut tanks = Vec::with_capacity(red.len() + blue.len());
        for (team, roster) in [(Team::Red, red), (Team::Blue, blue)] {
            for (slot, genome) in roster.iter().enumerate() {
                let position = spawn_point(&field, team, slot, roster.len());
                let heading = match team {
                    Team::Red => 0.0,
                    Team::Blue => std::f64::consts::PI,
                };
                tanks.push(Tank::new(tanks.len(), team, *genome, position, heading));
            }
        }

        Self {
            config,
            scenario_id,
            seed,
            field,
            tanks,
            projectiles: Vec::new(),
            // Offset so the battle stream differs from the layout stream
            rng: SeededRng::new(seed).fork(0x7A11),
            state: BattleState::Ready,
            elapsed: 0.0,
            started: false,
            steps: 0,
            result: None,
        }
    }

    /// Begin the battle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the battle is ready.
    pub fn start(&mut self) -> Result<()> {
        self.transition("start", BattleState::Ready, BattleState::Running)?;
        tracing::debug!(
            scenario = %self.scenario_id,
            seed = self.seed,
            tanks = self.tanks.len(),
            "Battle started"
        );
        Ok(())
    }

    /// Suspend a running battle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the battle is running.
    pub fn pause(&mut self) -> Result<()> {
        self.transition("pause", BattleState::Running, BattleState::Paused)
    }

    /// Continue a paused battle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] unless the battle is paused.
    pub fn resume(&mut self) -> Result<()> {
        self.transition("resume", BattleState::Paused, BattleState::Running)
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: BattleState,
        to: BattleState,
    ) -> Result<()> {
        if self.state != from {
            return Err(CoreError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Advance the battle by `dt` seconds (clamped to the configured maximum).
    ///
    /// Does nothing unless the battle is running or when `dt` is not a
    /// positive finite number. Returns the result on the step that ends the
    /// battle.
    pub fn step(&mut self, dt: f64) -> Option<BattleResult> {
        if self.state != BattleState::Running || !dt.is_finite() || dt <= 0.0 {
            return None;
        }
        let dt = dt.min(self.config.max_dt);
        self.elapsed += dt;
        self.steps += 1;

        self.update_tanks(dt);

        advance_projectiles(&mut self.projectiles, &mut self.tanks, &self.field, dt);
        separate_tanks(&mut self.tanks, &self.field);

        self.update_hill(dt);

        if !self.started {
            self.started = self
                .tanks
                .iter()
                .any(|t| t.position.distance(t.spawn) > START_MOVEMENT_THRESHOLD);
        }

        let (winner, victory_type) = check_outcome(&self.terminal_inputs(), &self.config)?;
        Some(self.finish(winner, victory_type))
    }

    fn update_tanks(&mut self, dt: f64) {
        let hill_mode =
            self.config.victory_mode == VictoryMode::KingOfHill && self.field.hill.is_some();

        for i in 0..self.tanks.len() {
            if !self.tanks[i].alive {
                continue;
            }
            let intent = {
                let view = WorldView {
                    tanks: &self.tanks,
                    field: &self.field,
                    hill_mode,
                    time: self.elapsed,
                };
                self.tanks[i].think(&view, dt, &mut self.rng)
            };
            self.tanks[i].act(&intent, dt, &self.field);

            if let Some(target) = intent.fire_target {
                let shot = try_fire(&mut self.tanks, i, target, &self.field, &mut self.rng);
                if let Some(shot) = shot {
                    self.projectiles.push(shot);
                }
            }
        }
    }

    fn update_hill(&mut self, dt: f64) {
        if self.config.victory_mode != VictoryMode::KingOfHill {
            return;
        }
        let Some(hill) = self.field.hill.as_mut() else {
            return;
        };
        let mut present = [0usize; 2];
        for t in self.tanks.iter().filter(|t| t.alive && hill.contains(t.position)) {
            present[usize::from(t.team == Team::Blue)] += 1;
        }
        hill.update_control(present[0], present[1], dt);
    }

    fn terminal_inputs(&self) -> TerminalInputs {
        let alive = |team: Team| self.tanks.iter().filter(|t| t.alive && t.team == team).count();
        let health = |team: Team| {
            self.tanks
                .iter()
                .filter(|t| t.team == team)
                .map(|t| t.health)
                .sum::<f64>()
        };
        let control = self.field.hill.map(|h| h.control).unwrap_or_default();
        TerminalInputs {
            red_alive: alive(Team::Red),
            blue_alive: alive(Team::Blue),
            red_health: health(Team::Red),
            blue_health: health(Team::Blue),
            hill_controller: control.controller,
            continuous_hill_time: control.continuous_time,
            elapsed: self.elapsed,
            started: self.started,
        }
    }

    fn finish(&mut self, winner: Option<Team>, victory_type: VictoryType) -> BattleResult {
        self.state = BattleState::Ended;
        self.projectiles.clear();

        let hill = self.field.hill.as_ref();
        let result = BattleResult {
            winner,
            victory_type,
            duration: self.elapsed,
            red: TeamStats::collect(Team::Red, &self.tanks, hill),
            blue: TeamStats::collect(Team::Blue, &self.tanks, hill),
            tanks: self
                .tanks
                .iter()
                .map(|t| TankReport {
                    id: t.id,
                    team: t.team,
                    genome: t.genome,
                    alive: t.alive,
                    health: t.health,
                    final_state: t.state,
                    stats: t.stats,
                })
                .collect(),
            hill: hill.map(|h| HillReport {
                center: h.center,
                radius: h.radius,
                red_time: h.control.red_time,
                blue_time: h.control.blue_time,
                contested_time: h.control.contested_time,
                final_controller: h.control.controller,
            }),
            scenario_id: self.scenario_id.clone(),
            seed: self.seed,
        };

        tracing::debug!(
            scenario = %self.scenario_id,
            seed = self.seed,
            winner = ?winner,
            victory = ?victory_type,
            duration = self.elapsed,
            steps = self.steps,
            "Battle ended"
        );

        self.result = Some(result.clone());
        result
    }

    /// Run until the battle ends, starting or resuming it as needed.
    ///
    /// The loop is bounded: if the win conditions somehow never fire, the
    /// battle is closed as a timeout once the step budget is spent.
    ///
    /// # Errors
    ///
    /// Never fails for a battle in a valid state; the `Result` carries
    /// lifecycle errors from `start`/`resume`.
    pub fn run_to_completion(&mut self, dt: f64) -> Result<BattleResult> {
        match self.state {
            BattleState::Ended => {
                if let Some(result) = &self.result {
                    return Ok(result.clone());
                }
            }
            BattleState::Ready => self.start()?,
            BattleState::Paused => self.resume()?,
            BattleState::Running => {}
        }

        let dt = if dt.is_finite() && dt > 0.0 {
            dt.min(self.config.max_dt)
        } else {
            self.config.max_dt
        };
        let horizon = self.config.time_limit + self.config.min_duration;
        let budget = (horizon / dt).ceil() as u64 + 16;

        for _ in 0..budget {
            if let Some(result) = self.step(dt) {
                return Ok(result);
            }
        }

        let inputs = self.terminal_inputs();
        let winner = match inputs.red_health.total_cmp(&inputs.blue_health) {
            std::cmp::Ordering::Greater => Some(Team::Red),
            std::cmp::Ordering::Less => Some(Team::Blue),
            std::cmp::Ordering::Equal => None,
        };
        tracing::warn!(steps = self.steps, "Battle step budget exhausted; closing as timeout");
        Ok(self.finish(winner, VictoryType::Timeout))
    }

    /// Encode the full mutable battle state.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn serialize_state(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            state: self.state,
            elapsed: self.elapsed,
            started: self.started,
            rng: &self.rng,
            tanks: &self.tanks,
            projectiles: &self.projectiles,
            hill: self.field.hill.as_ref(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Digest of the full battle state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.steps.hash(&mut hasher);
        match self.serialize_state() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => tracing::warn!(%err, "Battle state hash computed without snapshot"),
        }
        hasher.finish()
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> BattleState {
        self.state
    }

    /// Battle time in seconds.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Whether any tank has left its spawn.
    #[must_use]
    pub const fn has_started(&self) -> bool {
        self.started
    }

    /// All tanks in roster order.
    #[must_use]
    pub fn tanks(&self) -> &[Tank] {
        &self.tanks
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// The battlefield.
    #[must_use]
    pub const fn battlefield(&self) -> &Battlefield {
        &self.field
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// The result, once ended.
    #[must_use]
    pub const fn result(&self) -> Option<&BattleResult> {
        self.result.as_ref()
    }
}

/// Spawn position for slot `slot` of `count` on `team`'s edge.
fn spawn_point(field: &Battlefield, team: Team, slot: usize, count: usize) -> Vec2 {
    let x = match team {
        Team::Red => SPAWN_MARGIN,
        Team::Blue => field.width - SPAWN_MARGIN,
    };
    let y = field.height * (slot + 1) as f64 / (count + 1) as f64;
    let base = Vec2::new(x, y);
    if field.is_free(base, TANK_RADIUS) {
        return base;
    }

    // Spiral outward until clear of obstacles
    for ring in 1..=30 {
        let distance = f64::from(ring) * TANK_RADIUS;
        for k in 0..8 {
            let angle = f64::from(k) * std::f64::consts::FRAC_PI_4;
            let candidate = base + Vec2::from_angle(angle).scale(distance);
            if field.is_free(candidate, TANK_RADIUS) {
                return candidate;
            }
        }
    }
    base
}
