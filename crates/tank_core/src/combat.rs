//! Line of sight, firing, projectiles and hit resolution.
//!
//! Shots are real projectiles: the hit roll decides where a shot is aimed,
//! not whether it lands. A well-aimed shell can still be stopped by cover on
//! its way to the target.

use serde::{Deserialize, Serialize};

use crate::agent::{Tank, TANK_RADIUS};
use crate::battlefield::Battlefield;
use crate::genome::{Gene, Team};
use crate::math::{segment_circle_entry, wrap_angle, Rect, Vec2};
use crate::rng::SeededRng;

/// Projectile speed in pixels per second.
pub const PROJECTILE_SPEED: f64 = 400.0;

/// Projectiles expire after travelling this multiple of the shooter's range.
pub const PROJECTILE_RANGE_FACTOR: f64 = 1.2;

/// Minimum fraction of clear sight rays needed to fire.
pub const MIN_FIRE_CLEARANCE: f64 = 1.0 / 3.0;

/// Hit chance lost at maximum range, as a fraction of accuracy.
pub const DISTANCE_PENALTY: f64 = 0.4;

/// Hit chance bounds.
pub const HIT_CHANCE_BOUNDS: (f64, f64) = (0.05, 0.95);

/// Fraction of damage a defense gene of 1.0 absorbs.
pub const MAX_DAMAGE_REDUCTION: f64 = 0.3;

/// Whether the segment between two points is free of obstacles.
#[must_use]
pub fn line_of_sight(from: Vec2, to: Vec2, obstacles: &[Rect]) -> bool {
    !obstacles.iter().any(|o| o.intersects_segment(from, to))
}

/// Fraction of three parallel sight rays (centre and both target edges) that
/// are unobstructed.
#[must_use]
pub fn sight_clearance(from: Vec2, to: Vec2, half_width: f64, obstacles: &[Rect]) -> f64 {
    let offset = (to - from).normalize().perpendicular().scale(half_width);
    let rays = [
        (from, to),
        (from + offset, to + offset),
        (from - offset, to - offset),
    ];
    let clear = rays
        .iter()
        .filter(|(a, b)| line_of_sight(*a, *b, obstacles))
        .count();
    clear as f64 / rays.len() as f64
}

/// Probability that a shot is aimed on target.
#[must_use]
pub fn hit_chance(accuracy: f64, distance: f64, range: f64) -> f64 {
    let falloff = if range > 0.0 {
        1.0 - DISTANCE_PENALTY * (distance / range).clamp(0.0, 1.0)
    } else {
        1.0 - DISTANCE_PENALTY
    };
    (accuracy * falloff).clamp(HIT_CHANCE_BOUNDS.0, HIT_CHANCE_BOUNDS.1)
}

/// Damage after the defender's reduction.
#[must_use]
pub fn mitigated_damage(raw: f64, defender_defense: f64) -> f64 {
    raw * (1.0 - MAX_DAMAGE_REDUCTION * defender_defense.clamp(0.0, 1.0))
}

/// A shell in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Index of the firing tank.
    pub owner: usize,
    /// Team of the firing tank.
    pub team: Team,
    /// Current position.
    pub position: Vec2,
    /// Unit direction of travel.
    pub direction: Vec2,
    /// Raw damage on impact.
    pub damage: f64,
    /// Distance covered so far.
    pub travelled: f64,
    /// Distance after which the shell expires.
    pub max_distance: f64,
}

/// How a projectile's flight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileFate {
    /// Still travelling.
    Flying,
    /// Struck the tank with this index.
    HitTank(usize),
    /// Struck an obstacle.
    HitObstacle,
    /// Reached its maximum distance.
    Expired,
    /// Left the battlefield.
    OutOfBounds,
}

/// Damage dealt by one projectile impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    /// Firing tank.
    pub attacker: usize,
    /// Tank hit.
    pub defender: usize,
    /// Damage applied after reduction.
    pub damage: f64,
    /// Whether the hit destroyed the defender.
    pub killed: bool,
}

impl Projectile {
    /// Advance by `dt` and report how the flight ended, if it did.
    ///
    /// Tank and obstacle impacts are resolved by the earliest contact along
    /// this step's path; only opposing live tanks can be hit.
    #[must_use]
    pub fn advance(&mut self, dt: f64, tanks: &[Tank], field: &Battlefield) -> ProjectileFate {
        let remaining = (self.max_distance - self.travelled).max(0.0);
        let step = (PROJECTILE_SPEED * dt).min(remaining);
        let start = self.position;
        let end = start + self.direction.scale(step);

        let tank_hit = tanks
            .iter()
            .filter(|t| t.alive && t.team != self.team)
            .filter_map(|t| {
                segment_circle_entry(start, end, t.position, TANK_RADIUS).map(|s| (s, t.id))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let obstacle_hit = field
            .obstacles
            .iter()
            .filter_map(|o| o.segment_entry(start, end))
            .min_by(f64::total_cmp);

        let fate = match (tank_hit, obstacle_hit) {
            (Some((s, id)), Some(o)) if s <= o => Some((s, ProjectileFate::HitTank(id))),
            (Some((s, id)), None) => Some((s, ProjectileFate::HitTank(id))),
            (_, Some(o)) => Some((o, ProjectileFate::HitObstacle)),
            (None, None) => None,
        };

        if let Some((s, fate)) = fate {
            self.position = start + (end - start).scale(s);
            self.travelled += step * s;
            return fate;
        }

        self.position = end;
        self.travelled += step;

        if self.travelled >= self.max_distance - f64::EPSILON {
            ProjectileFate::Expired
        } else if !field.in_bounds(self.position) {
            ProjectileFate::OutOfBounds
        } else {
            ProjectileFate::Flying
        }
    }
}

/// Attempt a shot from `shooter` at `target`.
///
/// Returns the spawned projectile, or `None` when the weapon is cooling down,
/// the target is dead or out of range, or too little of it is visible. A
/// shot that will miss still consumes the cooldown.
pub fn try_fire(
    tanks: &mut [Tank],
    shooter: usize,
    target: usize,
    field: &Battlefield,
    rng: &mut SeededRng,
) -> Option<Projectile> {
    let (target_pos, target_alive, target_team) = {
        let t = tanks.get(target)?;
        (t.position, t.alive, t.team)
    };
    let s = tanks.get_mut(shooter)?;
    if !s.alive || !target_alive || s.cooldown > 0.0 || s.team == target_team {
        return None;
    }

    let distance = s.position.distance(target_pos);
    if distance > s.profile.range {
        return None;
    }
    if sight_clearance(s.position, target_pos, TANK_RADIUS, &field.obstacles) < MIN_FIRE_CLEARANCE
    {
        return None;
    }

    let chance = hit_chance(s.effective_accuracy(), distance, s.profile.range);
    let on_target = rng.chance(chance);
    let silhouette = (TANK_RADIUS / distance.max(TANK_RADIUS)).atan();
    let spread = if on_target {
        rng.range(-0.4, 0.4) * silhouette
    } else {
        let side = if rng.chance(0.5) { 1.0 } else { -1.0 };
        side * (silhouette * 1.5 + rng.range(0.0, 0.15))
    };

    let direction = Vec2::from_angle(wrap_angle((target_pos - s.position).angle() + spread));
    s.cooldown = s.profile.cooldown();
    s.heading = direction.angle();
    s.stats.shots_fired += 1;

    Some(Projectile {
        owner: shooter,
        team: s.team,
        position: s.position + direction.scale(TANK_RADIUS + 1.0),
        direction,
        damage: s.profile.damage,
        travelled: 0.0,
        max_distance: s.profile.range * PROJECTILE_RANGE_FACTOR,
    })
}

/// Apply a projectile impact and update both tanks' statistics.
pub fn apply_hit(
    tanks: &mut [Tank],
    attacker: usize,
    defender: usize,
    raw_damage: f64,
) -> Option<HitEvent> {
    let target = tanks.get_mut(defender)?;
    if !target.alive {
        return None;
    }
    let before = target.health;
    let damage = mitigated_damage(raw_damage, target.genome.get(Gene::Defense));
    let killed = target.take_damage(damage);
    let dealt = before - target.health;

    if let Some(shooter) = tanks.get_mut(attacker) {
        shooter.stats.shots_hit += 1;
        shooter.stats.damage_dealt += dealt;
        if killed {
            shooter.stats.kills += 1;
        }
    }

    Some(HitEvent {
        attacker,
        defender,
        damage: dealt,
        killed,
    })
}

/// Advance every projectile, resolve impacts and drop finished shells.
pub fn advance_projectiles(
    projectiles: &mut Vec<Projectile>,
    tanks: &mut [Tank],
    field: &Battlefield,
    dt: f64,
) -> Vec<HitEvent> {
    let mut hits = Vec::new();
    let mut flying = Vec::with_capacity(projectiles.len());

    for mut projectile in projectiles.drain(..) {
        match projectile.advance(dt, tanks, field) {
            ProjectileFate::Flying => flying.push(projectile),
            ProjectileFate::HitTank(defender) => {
                if let Some(hit) = apply_hit(tanks, projectile.owner, defender, projectile.damage) {
                    if hit.killed {
                        tracing::debug!(attacker = hit.attacker, defender, "Tank destroyed");
                    }
                    hits.push(hit);
                }
            }
            ProjectileFate::HitObstacle
            | ProjectileFate::Expired
            | ProjectileFate::OutOfBounds => {}
        }
    }

    *projectiles = flying;
    hits
}

/// Push overlapping live tanks apart.
///
/// Each tank of an overlapping pair moves half the overlap along the line
/// between them, when the new spot is free.
pub fn separate_tanks(tanks: &mut [Tank], field: &Battlefield) {
    let min_distance = TANK_RADIUS * 2.0;
    for i in 0..tanks.len() {
        for j in (i + 1)..tanks.len() {
            if !tanks[i].alive || !tanks[j].alive {
                continue;
            }
            let delta = tanks[j].position - tanks[i].position;
            let distance = delta.length();
            if distance >= min_distance {
                continue;
            }
            let axis = if distance > f64::EPSILON {
                delta.scale(1.0 / distance)
            } else {
                // Coincident: split along x, lower index to the left
                Vec2::new(1.0, 0.0)
            };
            let push = axis.scale((min_distance - distance) / 2.0);

            let a = tanks[i].position - push;
            if field.is_free(a, TANK_RADIUS) {
                tanks[i].position = a;
            }
            let b = tanks[j].position + push;
            if field.is_free(b, TANK_RADIUS) {
                tanks[j].position = b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Genome;

    fn tank(id: usize, team: Team, x: f64, y: f64) -> Tank {
        Tank::new(id, team, Genome::uniform(0.5), Vec2::new(x, y), 0.0)
    }

    #[test]
    fn test_line_of_sight_blocked_by_wall() {
        let wall = [Rect::new(90.0, 0.0, 20.0, 200.0)];
        assert!(!line_of_sight(Vec2::new(0.0, 50.0), Vec2::new(200.0, 50.0), &wall));
        assert!(line_of_sight(Vec2::new(0.0, 250.0), Vec2::new(200.0, 250.0), &wall));
    }

    #[test]
    fn test_clearance_partial_cover() {
        // Wall covers only the upper edge ray
        let wall = [Rect::new(90.0, 30.0, 20.0, 15.0)];
        let clearance = sight_clearance(Vec2::new(0.0, 50.0), Vec2::new(200.0, 50.0), 12.0, &wall);
        assert!((clearance - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(sight_clearance(Vec2::new(0.0, 50.0), Vec2::new(200.0, 50.0), 12.0, &[]), 1.0);
    }

    #[test]
    fn test_hit_chance_bounds() {
        assert!((hit_chance(0.9, 0.0, 200.0) - 0.9).abs() < 1e-12);
        assert!((hit_chance(0.9, 200.0, 200.0) - 0.54).abs() < 1e-12);
        assert_eq!(hit_chance(1.0, 0.0, 200.0), 0.95);
        assert_eq!(hit_chance(0.0, 100.0, 200.0), 0.05);
    }

    #[test]
    fn test_fire_requires_range_and_cooldown() {
        let field = Battlefield::open(800.0, 600.0);
        let mut tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Blue, 700.0, 100.0)];
        let mut rng = SeededRng::new(3);
        assert!(try_fire(&mut tanks, 0, 1, &field, &mut rng).is_none());

        tanks[1].position = Vec2::new(200.0, 100.0);
        let shot = try_fire(&mut tanks, 0, 1, &field, &mut rng);
        assert!(shot.is_some());
        assert_eq!(tanks[0].stats.shots_fired, 1);
        assert!(tanks[0].cooldown > 0.0);
        // Cooling down
        assert!(try_fire(&mut tanks, 0, 1, &field, &mut rng).is_none());
    }

    #[test]
    fn test_no_friendly_fire() {
        let field = Battlefield::open(800.0, 600.0);
        let mut tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Red, 150.0, 100.0)];
        let mut rng = SeededRng::new(3);
        assert!(try_fire(&mut tanks, 0, 1, &field, &mut rng).is_none());
        assert!(try_fire(&mut tanks, 0, 0, &field, &mut rng).is_none());
    }

    #[test]
    fn test_fire_blocked_by_cover() {
        let field =
            Battlefield::open(800.0, 600.0).with_obstacle(Rect::new(140.0, 50.0, 20.0, 100.0));
        let mut tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Blue, 200.0, 100.0)];
        let mut rng = SeededRng::new(3);
        assert!(try_fire(&mut tanks, 0, 1, &field, &mut rng).is_none());
        assert_eq!(tanks[0].stats.shots_fired, 0);
    }

    #[test]
    fn test_projectile_hits_enemy_not_ally() {
        let field = Battlefield::open(800.0, 600.0);
        let tanks = vec![
            tank(0, Team::Red, 100.0, 100.0),
            tank(1, Team::Red, 150.0, 100.0),
            tank(2, Team::Blue, 200.0, 100.0),
        ];
        let mut p = Projectile {
            owner: 0,
            team: Team::Red,
            position: Vec2::new(113.0, 100.0),
            direction: Vec2::new(1.0, 0.0),
            damage: 10.0,
            travelled: 0.0,
            max_distance: 300.0,
        };
        assert_eq!(p.advance(0.5, &tanks, &field), ProjectileFate::HitTank(2));
        assert!((p.position.x - 188.0).abs() < 1e-9);
    }

    #[test]
    fn test_projectile_stopped_by_obstacle_first() {
        let field =
            Battlefield::open(800.0, 600.0).with_obstacle(Rect::new(150.0, 50.0, 10.0, 100.0));
        let tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Blue, 200.0, 100.0)];
        let mut p = Projectile {
            owner: 0,
            team: Team::Red,
            position: Vec2::new(113.0, 100.0),
            direction: Vec2::new(1.0, 0.0),
            damage: 10.0,
            travelled: 0.0,
            max_distance: 300.0,
        };
        assert_eq!(p.advance(0.5, &tanks, &field), ProjectileFate::HitObstacle);
    }

    #[test]
    fn test_projectile_expires_and_leaves_field() {
        let field = Battlefield::open(800.0, 600.0);
        let mut p = Projectile {
            owner: 0,
            team: Team::Red,
            position: Vec2::new(400.0, 300.0),
            direction: Vec2::new(0.0, 1.0),
            damage: 10.0,
            travelled: 0.0,
            max_distance: 30.0,
        };
        assert_eq!(p.advance(0.05, &[], &field), ProjectileFate::Flying);
        assert_eq!(p.advance(0.05, &[], &field), ProjectileFate::Expired);

        let mut out = Projectile {
            position: Vec2::new(790.0, 300.0),
            direction: Vec2::new(1.0, 0.0),
            max_distance: 500.0,
            ..p
        };
        out.travelled = 0.0;
        assert_eq!(out.advance(0.1, &[], &field), ProjectileFate::OutOfBounds);
    }

    #[test]
    fn test_apply_hit_credits_kill() {
        let mut tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Blue, 200.0, 100.0)];
        tanks[1].health = 5.0;
        let hit = apply_hit(&mut tanks, 0, 1, 50.0).unwrap();
        assert!(hit.killed);
        assert_eq!(hit.damage, 5.0);
        assert_eq!(tanks[0].stats.kills, 1);
        assert_eq!(tanks[0].stats.shots_hit, 1);
        assert_eq!(tanks[1].health, 0.0);
        // Dead tanks absorb nothing
        assert!(apply_hit(&mut tanks, 0, 1, 50.0).is_none());
    }

    #[test]
    fn test_defense_reduces_damage() {
        assert_eq!(mitigated_damage(20.0, 0.0), 20.0);
        assert!((mitigated_damage(20.0, 1.0) - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_separate_overlapping_tanks() {
        let field = Battlefield::open(800.0, 600.0);
        let mut tanks = vec![tank(0, Team::Red, 100.0, 100.0), tank(1, Team::Blue, 110.0, 100.0)];
        separate_tanks(&mut tanks, &field);
        let d = tanks[0].position.distance(tanks[1].position);
        assert!((d - 2.0 * TANK_RADIUS).abs() < 1e-9);
    }
}
