//! Tank perception and the behavior state machine.
//!
//! Each tank is derived from a [`Genome`] at battle start. Every update it
//! re-perceives the battlefield; on a fixed decision interval it re-runs the
//! transition policy. Thinking ([`Tank::think`]) only reads the world and
//! returns an [`Intent`]; acting ([`Tank::act`]) applies it. The split keeps
//! the borrow of the whole roster immutable while one tank plans.

use serde::{Deserialize, Serialize};

use crate::battlefield::Battlefield;
use crate::combat::line_of_sight;
use crate::genome::{Gene, Genome, Team};
use crate::math::Vec2;
use crate::rng::SeededRng;

/// Collision radius of a tank.
pub const TANK_RADIUS: f64 = 12.0;

/// Health every tank starts with.
pub const MAX_HEALTH: f64 = 100.0;

/// Seconds of battle time between behavior decisions.
pub const DECISION_INTERVAL: f64 = 0.25;

/// Allies farther than this count as "not nearby".
pub const GROUP_RADIUS: f64 = 150.0;

/// Health ratio below which retreat is considered.
pub const LOW_HEALTH_RATIO: f64 = 0.3;

/// Patrol waypoints closer than this are considered reached.
const WAYPOINT_REACHED: f64 = 20.0;

/// Behavior states of the finite-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    /// Wander between waypoints looking for contact.
    #[default]
    Patrol,
    /// Engage the current target.
    Attack,
    /// Fall back away from the nearest enemy.
    Retreat,
    /// Close in on allies.
    Group,
    /// Move onto the hill.
    SeekHill,
    /// Hold the hill and fire on intruders.
    DefendHill,
}

/// Combat stats derived from a genome.
///
/// Each value is a fixed function of specific genes:
/// - move speed from `speed`
/// - fire rate and damage from `aggression`
/// - range and base accuracy from `accuracy`
/// - damage reduction from `defense`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    /// Starting and maximum health.
    pub max_health: f64,
    /// Pixels per second.
    pub move_speed: f64,
    /// Shots per second.
    pub fire_rate: f64,
    /// Damage per hit before reduction.
    pub damage: f64,
    /// Weapon range in pixels.
    pub range: f64,
    /// Base hit probability at point blank.
    pub accuracy: f64,
    /// Fraction of incoming damage ignored.
    pub damage_reduction: f64,
    /// Distance at which a visible enemy triggers an attack.
    pub engagement_range: f64,
}

impl CombatProfile {
    /// Derive stats from a genome.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let aggression = genome.get(Gene::Aggression);
        let accuracy = genome.get(Gene::Accuracy);
        let range = 150.0 + 100.0 * accuracy;
        Self {
            max_health: MAX_HEALTH,
            move_speed: 40.0 + 60.0 * genome.get(Gene::Speed),
            fire_rate: 0.5 + 1.5 * aggression,
            damage: 10.0 + 15.0 * aggression,
            range,
            accuracy: 0.5 + 0.45 * accuracy,
            damage_reduction: 0.3 * genome.get(Gene::Defense),
            engagement_range: range * (0.6 + 0.4 * aggression),
        }
    }

    /// Seconds between shots.
    #[must_use]
    pub fn cooldown(&self) -> f64 {
        1.0 / self.fire_rate
    }
}

/// Cumulative per-tank battle statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TankStats {
    /// Shots fired (hits and misses).
    pub shots_fired: u32,
    /// Shots that struck an enemy.
    pub shots_hit: u32,
    /// Damage inflicted.
    pub damage_dealt: f64,
    /// Damage received.
    pub damage_taken: f64,
    /// Enemies destroyed.
    pub kills: u32,
    /// Seconds alive.
    pub survival_time: f64,
    /// Number of behavior state changes.
    pub state_changes: u32,
    /// Total distance moved.
    pub distance_travelled: f64,
    /// Seconds spent on the hill.
    pub time_on_hill: f64,
}

impl TankStats {
    /// Hit ratio, 0 when no shots were fired.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.shots_fired == 0 {
            0.0
        } else {
            f64::from(self.shots_hit) / f64::from(self.shots_fired)
        }
    }
}

/// What a tank currently knows about the battlefield.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Perception {
    /// Indices of live enemies.
    pub enemies: Vec<usize>,
    /// Indices of live enemies in line of sight.
    pub visible_enemies: Vec<usize>,
    /// Indices of live allies (excluding self).
    pub allies: Vec<usize>,
    /// Nearest visible enemy, else nearest enemy overall.
    pub target: Option<usize>,
    /// Whether `target` is in line of sight.
    pub target_visible: bool,
    /// Distance to `target`.
    pub target_distance: f64,
    /// Distance to the nearest live ally.
    pub nearest_ally_distance: Option<f64>,
    /// Mean position of live allies.
    pub ally_centroid: Option<Vec2>,
    /// Distance to the hill centre, when there is a hill.
    pub hill_distance: Option<f64>,
    /// Whether this tank is on the hill.
    pub on_hill: bool,
    /// Team currently holding the hill alone.
    pub hill_controller: Option<Team>,
}

/// Shared read-only view handed to [`Tank::think`].
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    /// Every tank in the battle, dead or alive.
    pub tanks: &'a [Tank],
    /// The battlefield.
    pub field: &'a Battlefield,
    /// Whether the hill objective is in play.
    pub hill_mode: bool,
    /// Battle time in seconds.
    pub time: f64,
}

/// Planned behavior for one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intent {
    /// State after this update.
    pub state: BehaviorState,
    /// Whether the decision policy ran this update.
    pub decided: bool,
    /// Where to move, if anywhere.
    pub destination: Option<Vec2>,
    /// Sideways motion as a fraction of move speed (signed).
    pub strafe: f64,
    /// Target to shoot at, if the state fires.
    pub fire_target: Option<usize>,
    /// New patrol waypoint, if one was picked.
    pub waypoint: Option<Vec2>,
    /// Speed multiplier for this update.
    pub speed_factor: f64,
}

/// A tank in a running battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    /// Index in the battle roster.
    pub id: usize,
    /// Team.
    pub team: Team,
    /// Behavior genome (never modified).
    pub genome: Genome,
    /// Derived combat stats.
    pub profile: CombatProfile,
    /// Current position.
    pub position: Vec2,
    /// Facing in radians.
    pub heading: f64,
    /// Current health, never below 0.
    pub health: f64,
    /// Current behavior state.
    pub state: BehaviorState,
    /// Whether the tank is alive.
    pub alive: bool,
    /// Seconds until the weapon is ready.
    pub cooldown: f64,
    /// Seconds since the last decision.
    pub decision_timer: f64,
    /// Current patrol waypoint.
    pub waypoint: Option<Vec2>,
    /// Spawn position, used to detect that the battle has started.
    pub spawn: Vec2,
    /// Cumulative statistics.
    pub stats: TankStats,
}

impl Tank {
    /// Create a tank at `position`, facing `heading`.
    #[must_use]
    pub fn new(id: usize, team: Team, genome: Genome, position: Vec2, heading: f64) -> Self {
        let profile = CombatProfile::from_genome(&genome);
        Self {
            id,
            team,
            genome,
            profile,
            position,
            heading,
            health: profile.max_health,
            state: BehaviorState::Patrol,
            alive: true,
            cooldown: 0.0,
            // Decide on the very first update
            decision_timer: DECISION_INTERVAL,
            waypoint: None,
            spawn: position,
            stats: TankStats::default(),
        }
    }

    /// Health as a fraction of maximum.
    #[must_use]
    pub fn health_ratio(&self) -> f64 {
        (self.health / self.profile.max_health).clamp(0.0, 1.0)
    }

    /// Hit probability before distance penalty, including the learning bonus.
    ///
    /// Tanks with a high `learning` gene sharpen their aim over their first
    /// twenty shots, up to +0.1.
    #[must_use]
    pub fn effective_accuracy(&self) -> f64 {
        let practice = (f64::from(self.stats.shots_fired) / 20.0).min(1.0);
        (self.profile.accuracy + 0.1 * self.genome.get(Gene::Learning) * practice).min(1.0)
    }

    /// Apply incoming damage. Returns true if this hit destroyed the tank.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if !self.alive {
            return false;
        }
        let amount = amount.max(0.0);
        let applied = amount.min(self.health);
        self.health = (self.health - amount).max(0.0);
        self.stats.damage_taken += applied;
        if self.health <= 0.0 {
            self.alive = false;
            return true;
        }
        false
    }

    /// Recompute what this tank knows about the battlefield.
    #[must_use]
    pub fn perceive(&self, world: &WorldView<'_>) -> Perception {
        let mut perception = Perception::default();

        for other in world.tanks {
            if other.id == self.id || !other.alive {
                continue;
            }
            if other.team == self.team {
                perception.allies.push(other.id);
            } else {
                perception.enemies.push(other.id);
                if line_of_sight(self.position, other.position, &world.field.obstacles) {
                    perception.visible_enemies.push(other.id);
                }
            }
        }

        let nearest = |ids: &[usize]| -> Option<(usize, f64)> {
            ids.iter()
                .map(|&i| (i, self.position.distance(world.tanks[i].position)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        };

        if let Some((id, dist)) = nearest(&perception.visible_enemies) {
            perception.target = Some(id);
            perception.target_distance = dist;
            perception.target_visible = true;
        } else if let Some((id, dist)) = nearest(&perception.enemies) {
            perception.target = Some(id);
            perception.target_distance = dist;
        }

        perception.nearest_ally_distance = nearest(&perception.allies).map(|(_, d)| d);
        perception.ally_centroid =
            Vec2::centroid(perception.allies.iter().map(|&i| world.tanks[i].position));

        if let Some(hill) = world.field.hill.as_ref() {
            perception.hill_distance = Some(self.position.distance(hill.center));
            perception.on_hill = hill.contains(self.position);
            perception.hill_controller = hill.control.controller;
        }

        perception
    }

    /// Run the transition policy.
    ///
    /// Priority: retreat, attack, hill objective, regroup, patrol.
    #[must_use]
    pub fn decide(&self, perception: &Perception, hill_mode: bool) -> BehaviorState {
        let g = &self.genome;
        let defense = g.get(Gene::Defense);
        let risk = g.get(Gene::RiskTaking);
        let teamwork = g.get(Gene::Teamwork);

        if self.health_ratio() < LOW_HEALTH_RATIO && defense * (1.0 - 0.5 * risk) > 0.35 {
            return BehaviorState::Retreat;
        }

        if perception.target_visible && perception.target_distance <= self.profile.engagement_range
        {
            return BehaviorState::Attack;
        }

        if hill_mode {
            if let Some(hill_distance) = perception.hill_distance {
                let priority = (g.get(Gene::Adaptability) + teamwork) / 2.0;
                if perception.on_hill && priority >= 0.3 {
                    return BehaviorState::DefendHill;
                }
                let interest_radius = 250.0 + 250.0 * priority;
                let enemy_holds = perception.hill_controller == Some(self.team.opponent());
                if (priority > 0.35 && hill_distance <= interest_radius)
                    || (enemy_holds && risk > 0.5)
                {
                    return BehaviorState::SeekHill;
                }
            }
        }

        let isolated = perception
            .nearest_ally_distance
            .is_some_and(|d| d > GROUP_RADIUS);
        if isolated && teamwork > 0.6 {
            return BehaviorState::Group;
        }

        BehaviorState::Patrol
    }

    /// Plan this update without mutating anything but the RNG.
    pub fn think(&self, world: &WorldView<'_>, dt: f64, rng: &mut SeededRng) -> Intent {
        let perception = self.perceive(world);
        let decided = self.decision_timer + dt >= DECISION_INTERVAL;
        let state = if decided {
            self.decide(&perception, world.hill_mode)
        } else {
            self.state
        };

        let mut intent = Intent {
            state,
            decided,
            destination: None,
            strafe: 0.0,
            fire_target: None,
            waypoint: None,
            speed_factor: 1.0,
        };

        let target_pos = perception.target.map(|i| world.tanks[i].position);

        match state {
            BehaviorState::Patrol => {
                let reached = self
                    .waypoint
                    .map_or(true, |w| w.distance(self.position) < WAYPOINT_REACHED);
                let waypoint = if reached {
                    let fresh = self.pick_waypoint(world.field, target_pos, rng);
                    intent.waypoint = Some(fresh);
                    fresh
                } else {
                    self.waypoint.unwrap_or(self.position)
                };
                intent.destination = Some(waypoint);
            }
            BehaviorState::Attack => {
                if let Some(target) = target_pos {
                    let preferred = self.profile.range * 0.7;
                    let dist = perception.target_distance;
                    if dist > preferred {
                        intent.destination = Some(target);
                    } else if dist < preferred * 0.6 {
                        let away = (self.position - target).normalize().scale(preferred);
                        intent.destination = Some(self.position + away);
                    }
                    intent.strafe =
                        self.strafe_direction(world.time) * self.genome.get(Gene::Evasion);
                    if perception.target_visible && dist <= self.profile.range {
                        intent.fire_target = perception.target;
                    }
                }
            }
            BehaviorState::Retreat => {
                let away = target_pos.map_or(Vec2::ZERO, |t| (self.position - t).normalize());
                let toward_allies = perception
                    .ally_centroid
                    .map_or(Vec2::ZERO, |c| (c - self.position).normalize());
                let direction = (away.scale(0.7) + toward_allies.scale(0.3)).normalize();
                if direction != Vec2::ZERO {
                    intent.destination = Some(self.position + direction.scale(100.0));
                }
            }
            BehaviorState::Group => {
                intent.destination = perception.ally_centroid;
            }
            BehaviorState::SeekHill => {
                intent.destination = world.field.hill.map(|h| h.center);
            }
            BehaviorState::DefendHill => {
                if let Some(hill) = world.field.hill.as_ref() {
                    if self.position.distance(hill.center) > hill.radius * 0.5 {
                        intent.destination = Some(hill.center);
                    }
                }
                intent.speed_factor = 0.6;
                if perception.target_visible && perception.target_distance <= self.profile.range {
                    intent.fire_target = perception.target;
                }
            }
        }

        intent
    }

    /// Apply an intent: state bookkeeping, movement and timers.
    pub fn act(&mut self, intent: &Intent, dt: f64, field: &Battlefield) {
        if !self.alive {
            return;
        }

        if intent.state != self.state {
            self.state = intent.state;
            self.stats.state_changes += 1;
        }
        if intent.decided {
            self.decision_timer = 0.0;
        } else {
            self.decision_timer += dt;
        }
        if let Some(w) = intent.waypoint {
            self.waypoint = Some(w);
        }

        let speed = self.profile.move_speed * intent.speed_factor;
        let mut velocity = Vec2::ZERO;
        if let Some(dest) = intent.destination {
            let to_dest = dest - self.position;
            let dist = to_dest.length();
            if dist > 1.0 {
                velocity = to_dest.normalize().scale(speed.min(dist / dt.max(1e-6)));
            }
        }
        if intent.strafe != 0.0 {
            let facing = Vec2::from_angle(self.heading);
            velocity = velocity + facing.perpendicular().scale(intent.strafe * speed * 0.5);
        }

        self.move_by(velocity.scale(dt), field);

        self.cooldown = (self.cooldown - dt).max(0.0);
        self.stats.survival_time += dt;
        if field.hill.as_ref().is_some_and(|h| h.contains(self.position)) {
            self.stats.time_on_hill += dt;
        }
    }

    /// Move by `delta`, sliding along obstacles and canvas edges.
    pub fn move_by(&mut self, delta: Vec2, field: &Battlefield) {
        if delta == Vec2::ZERO {
            return;
        }
        let start = self.position;
        let candidates = [
            start + delta,
            Vec2::new(start.x + delta.x, start.y),
            Vec2::new(start.x, start.y + delta.y),
        ];
        if let Some(next) = candidates
            .into_iter()
            .find(|&p| field.is_free(p, TANK_RADIUS))
        {
            let moved = next - start;
            if moved != Vec2::ZERO {
                self.heading = moved.angle();
            }
            self.stats.distance_travelled += moved.length();
            self.position = next;
        }
    }

    /// Sign of sideways motion; alternates every two seconds, offset per tank.
    fn strafe_direction(&self, time: f64) -> f64 {
        let phase = (time / 2.0) as i64 + self.id as i64;
        if phase % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    /// Pick a patrol waypoint.
    ///
    /// Aggressive tanks tend to patrol toward the enemy they know about.
    fn pick_waypoint(&self, field: &Battlefield, enemy: Option<Vec2>, rng: &mut SeededRng) -> Vec2 {
        let hunt = enemy.filter(|_| rng.chance(0.3 + 0.6 * self.genome.get(Gene::Aggression)));
        for _ in 0..10 {
            let candidate = match hunt {
                Some(e) => e + Vec2::new(rng.range(-150.0, 150.0), rng.range(-150.0, 150.0)),
                None => Vec2::new(
                    rng.range(TANK_RADIUS, field.width - TANK_RADIUS),
                    rng.range(TANK_RADIUS, field.height - TANK_RADIUS),
                ),
            };
            if field.is_free(candidate, TANK_RADIUS) {
                return candidate;
            }
        }
        Vec2::new(field.width / 2.0, field.height / 2.0)
    }
}
