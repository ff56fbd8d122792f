//! Seeded battlefield generation: obstacles and the king-of-the-hill zone.
//!
//! Generates one of four obstacle layouts:
//! - Open field (scattered cover, centre kept clear)
//! - Urban (jittered grid with streets)
//! - Chokepoint (walls with narrow passages)
//! - Fortress (broken ring wall around the hill plus an inner keep)
//!
//! Every layout guarantees that obstacles lie inside the canvas and never
//! intrude on the hill buffer zone.

use serde::{Deserialize, Serialize};

use crate::genome::Team;
use crate::math::{Rect, Vec2};
use crate::rng::SeededRng;
use crate::scenario::{ScenarioDescriptor, ScenarioKind};

/// Default canvas width in pixels.
pub const DEFAULT_WIDTH: f64 = 800.0;

/// Default canvas height in pixels.
pub const DEFAULT_HEIGHT: f64 = 600.0;

/// Default hill radius in pixels.
pub const DEFAULT_HILL_RADIUS: f64 = 30.0;

/// Clearance kept between obstacles and the hill edge.
pub const HILL_BUFFER: f64 = 10.0;

/// Placement attempts per open-field obstacle.
const OPEN_FIELD_MAX_TRIES: u32 = 50;

/// Fraction of urban grid cells left empty as streets.
const URBAN_STREET_CHANCE: f64 = 0.3;

/// Passage width range for chokepoint walls.
const CHOKEPOINT_GAP: (f64, f64) = (80.0, 120.0);

/// Number of segments around the fortress ring.
const FORTRESS_SEGMENTS: u32 = 12;

/// Chance that a fortress ring segment is left open as a gate.
const FORTRESS_GATE_CHANCE: f64 = 0.25;

/// Accumulated control of the hill.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HillControl {
    /// Total seconds red held the hill alone.
    pub red_time: f64,
    /// Total seconds blue held the hill alone.
    pub blue_time: f64,
    /// Team currently holding the hill alone.
    pub controller: Option<Team>,
    /// Seconds the current controller has held it without interruption.
    pub continuous_time: f64,
    /// Seconds during which both teams were inside.
    pub contested_time: f64,
}

impl HillControl {
    /// Total control time for a team.
    #[must_use]
    pub fn time_for(&self, team: Team) -> f64 {
        match team {
            Team::Red => self.red_time,
            Team::Blue => self.blue_time,
        }
    }
}

/// Circular king-of-the-hill objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hill {
    /// Centre.
    pub center: Vec2,
    /// Radius.
    pub radius: f64,
    /// Control bookkeeping.
    pub control: HillControl,
}

impl Hill {
    /// New hill with no control history.
    #[must_use]
    pub fn new(center: Vec2, radius: f64) -> Self {
        Self {
            center,
            radius,
            control: HillControl::default(),
        }
    }

    /// Whether a point is on the hill.
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.distance_squared(self.center) <= self.radius * self.radius
    }

    /// Advance control time given how many live tanks of each team are on the hill.
    ///
    /// Exactly one team present extends its control; both present marks the
    /// hill contested; either case other than sole control resets the
    /// continuous timer. Returns the team now holding the hill alone.
    pub fn update_control(
        &mut self,
        red_present: usize,
        blue_present: usize,
        dt: f64,
    ) -> Option<Team> {
        let holder = match (red_present > 0, blue_present > 0) {
            (true, false) => Some(Team::Red),
            (false, true) => Some(Team::Blue),
            (true, true) => {
                self.control.contested_time += dt;
                None
            }
            (false, false) => None,
        };

        match holder {
            Some(team) => {
                match team {
                    Team::Red => self.control.red_time += dt,
                    Team::Blue => self.control.blue_time += dt,
                }
                if self.control.controller == Some(team) {
                    self.control.continuous_time += dt;
                } else {
                    self.control.continuous_time = dt;
                }
            }
            None => self.control.continuous_time = 0.0,
        }
        self.control.controller = holder;
        holder
    }

    /// Whether an obstacle intrudes on the hill plus its buffer zone.
    #[must_use]
    pub fn overlaps(&self, obstacle: &Rect) -> bool {
        rect_overlaps_hill(obstacle, self.center, self.radius)
    }
}

/// Overlap test used by every layout: the nearest point of the obstacle must
/// be farther than `radius + HILL_BUFFER` from the hill centre.
#[must_use]
pub fn rect_overlaps_hill(obstacle: &Rect, hill_center: Vec2, hill_radius: f64) -> bool {
    obstacle.distance_to_point(hill_center) <= hill_radius + HILL_BUFFER
}

/// Output of the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLayout {
    /// Obstacles, all inside the canvas and clear of the hill buffer.
    pub obstacles: Vec<Rect>,
    /// Hill centre (the supplied one, or a generated one).
    pub hill_center: Vec2,
}

/// Generate obstacles and a hill position for a scenario.
///
/// The same `(width, height, descriptor, seed, hill_center)` always
/// produces the same layout.
#[must_use]
pub fn generate_battlefield(
    width: f64,
    height: f64,
    descriptor: &ScenarioDescriptor,
    seed: i64,
    hill_center: Option<Vec2>,
    hill_radius: f64,
) -> GeneratedLayout {
    let mut rng = SeededRng::new(seed);

    let hill_center = hill_center.unwrap_or_else(|| {
        let jitter = descriptor.hill_placement.max_jitter();
        Vec2::new(
            width / 2.0 + rng.range(-jitter, jitter),
            height / 2.0 + rng.range(-jitter, jitter),
        )
    });

    let ctx = LayoutContext {
        width,
        height,
        hill_center,
        hill_radius,
        count: descriptor.obstacle_count,
        size: descriptor.obstacle_size,
    };

    let raw = match descriptor.kind {
        ScenarioKind::OpenField => open_field(&ctx, &mut rng),
        ScenarioKind::Urban => urban(&ctx, &mut rng),
        ScenarioKind::Chokepoint => chokepoint(&ctx, &mut rng),
        ScenarioKind::Fortress => fortress(&ctx, &mut rng),
    };

    let obstacles: Vec<Rect> = raw
        .into_iter()
        .map(|r| r.clamped_to(width, height))
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .filter(|r| !rect_overlaps_hill(r, hill_center, hill_radius))
        .collect();

    tracing::debug!(
        scenario = %descriptor.id,
        seed,
        requested = descriptor.obstacle_count,
        generated = obstacles.len(),
        "Generated battlefield"
    );

    GeneratedLayout {
        obstacles,
        hill_center,
    }
}

struct LayoutContext {
    width: f64,
    height: f64,
    hill_center: Vec2,
    hill_radius: f64,
    count: u32,
    size: (f64, f64),
}

impl LayoutContext {
    fn random_size(&self, rng: &mut SeededRng) -> (f64, f64) {
        let (min, max) = self.size;
        let w = rng.range(min, max).min(self.width);
        let h = rng.range(min, max).min(self.height);
        (w, h)
    }

    fn random_rect(&self, rng: &mut SeededRng) -> Rect {
        let (w, h) = self.random_size(rng);
        Rect::new(
            rng.range(0.0, self.width - w),
            rng.range(0.0, self.height - h),
            w,
            h,
        )
    }

    fn hits_hill(&self, r: &Rect) -> bool {
        rect_overlaps_hill(r, self.hill_center, self.hill_radius)
    }
}

fn open_field(ctx: &LayoutContext, rng: &mut SeededRng) -> Vec<Rect> {
    let central_third = Rect::new(
        ctx.width / 3.0,
        ctx.height / 3.0,
        ctx.width / 3.0,
        ctx.height / 3.0,
    );

    let mut obstacles = Vec::with_capacity(ctx.count as usize);
    for _ in 0..ctx.count {
        let mut placed = None;
        for attempt in 0..OPEN_FIELD_MAX_TRIES {
            let candidate = ctx.random_rect(rng);
            let clear = !candidate.intersects(&central_third) && !ctx.hits_hill(&candidate);
            if clear || attempt + 1 == OPEN_FIELD_MAX_TRIES {
                // Last attempt is taken as-is; the final hill filter still applies
                placed = Some(candidate);
                break;
            }
        }
        obstacles.extend(placed);
    }
    obstacles
}

fn urban(ctx: &LayoutContext, rng: &mut SeededRng) -> Vec<Rect> {
    if ctx.count == 0 {
        return Vec::new();
    }

    // Grid with roughly `count` cells, shaped like the canvas
    let aspect = ctx.width / ctx.height;
    let cols = ((f64::from(ctx.count) * aspect).sqrt().ceil() as u32).max(1);
    let rows = ctx.count.div_ceil(cols).max(1);
    let cell_w = ctx.width / f64::from(cols);
    let cell_h = ctx.height / f64::from(rows);
    let padding = 6.0;

    let mut obstacles = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if obstacles.len() as u32 >= ctx.count {
                return obstacles;
            }
            if rng.chance(URBAN_STREET_CHANCE) {
                continue;
            }

            let (w, h) = ctx.random_size(rng);
            let w = w.min(cell_w - 2.0 * padding).max(1.0);
            let h = h.min(cell_h - 2.0 * padding).max(1.0);
            let slack_x = (cell_w - w - 2.0 * padding).max(0.0);
            let slack_y = (cell_h - h - 2.0 * padding).max(0.0);
            let block = Rect::new(
                f64::from(col) * cell_w + padding + rng.range(0.0, slack_x),
                f64::from(row) * cell_h + padding + rng.range(0.0, slack_y),
                w,
                h,
            );

            if !ctx.hits_hill(&block) {
                obstacles.push(block);
            }
        }
    }
    obstacles
}

fn chokepoint(ctx: &LayoutContext, rng: &mut SeededRng) -> Vec<Rect> {
    let wall_count = if rng.chance(0.5) { 2 } else { 3 };
    let thickness = ctx.size.0;
    let mut obstacles = Vec::new();

    for i in 0..wall_count {
        let horizontal = rng.chance(0.5);
        let fraction = f64::from(i + 1) / f64::from(wall_count + 1);
        let gap = rng.range(CHOKEPOINT_GAP.0, CHOKEPOINT_GAP.1);

        if horizontal {
            let y = (ctx.height * fraction + rng.range(-20.0, 20.0) - thickness / 2.0)
                .clamp(0.0, ctx.height - thickness);
            let gap_start = rng.range(40.0, (ctx.width - gap - 40.0).max(40.0));
            obstacles.push(Rect::new(0.0, y, gap_start, thickness));
            obstacles.push(Rect::new(
                gap_start + gap,
                y,
                ctx.width - gap_start - gap,
                thickness,
            ));
        } else {
            let x = (ctx.width * fraction + rng.range(-20.0, 20.0) - thickness / 2.0)
                .clamp(0.0, ctx.width - thickness);
            let gap_start = rng.range(40.0, (ctx.height - gap - 40.0).max(40.0));
            obstacles.push(Rect::new(x, 0.0, thickness, gap_start));
            obstacles.push(Rect::new(
                x,
                gap_start + gap,
                thickness,
                ctx.height - gap_start - gap,
            ));
        }
    }

    let fillers = ctx.count.saturating_sub(wall_count * 2);
    for _ in 0..fillers {
        obstacles.push(ctx.random_rect(rng));
    }

    obstacles
}

fn fortress(ctx: &LayoutContext, rng: &mut SeededRng) -> Vec<Rect> {
    let ring_radius = ctx.hill_radius + HILL_BUFFER + 80.0;
    let keep_radius = ring_radius * 0.6;
    let mut obstacles = Vec::new();

    for i in 0..FORTRESS_SEGMENTS {
        if rng.chance(FORTRESS_GATE_CHANCE) {
            continue;
        }
        let angle = f64::from(i) / f64::from(FORTRESS_SEGMENTS) * std::f64::consts::TAU;
        let at = ctx.hill_center + Vec2::from_angle(angle).scale(ring_radius);
        let (w, h) = ctx.random_size(rng);
        obstacles.push(Rect::new(at.x - w / 2.0, at.y - h / 2.0, w, h));
    }

    let keep = ctx.count.saturating_sub(FORTRESS_SEGMENTS);
    for _ in 0..keep {
        let angle = rng.range(0.0, std::f64::consts::TAU);
        let inner = ctx.hill_radius + HILL_BUFFER;
        let dist = rng.range(inner, keep_radius.max(inner + 1.0));
        let at = ctx.hill_center + Vec2::from_angle(angle).scale(dist);
        let (w, h) = ctx.random_size(rng);
        let (w, h) = (w * 0.6, h * 0.6);
        obstacles.push(Rect::new(at.x - w / 2.0, at.y - h / 2.0, w, h));
    }

    obstacles
}

/// The battlefield a battle is fought on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battlefield {
    /// Canvas width.
    pub width: f64,
    /// Canvas height.
    pub height: f64,
    /// Axis-aligned obstacles.
    pub obstacles: Vec<Rect>,
    /// King-of-the-hill zone, if the battle uses one.
    pub hill: Option<Hill>,
}

impl Battlefield {
    /// Empty battlefield with no obstacles and no hill.
    #[must_use]
    pub fn open(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            obstacles: Vec::new(),
            hill: None,
        }
    }

    /// Generate a battlefield from a scenario descriptor and seed.
    #[must_use]
    pub fn generate(
        width: f64,
        height: f64,
        descriptor: &ScenarioDescriptor,
        seed: i64,
        with_hill: bool,
    ) -> Self {
        let layout =
            generate_battlefield(width, height, descriptor, seed, None, DEFAULT_HILL_RADIUS);
        Self {
            width,
            height,
            obstacles: layout.obstacles,
            hill: with_hill.then(|| Hill::new(layout.hill_center, DEFAULT_HILL_RADIUS)),
        }
    }

    /// Add an obstacle.
    #[must_use]
    pub fn with_obstacle(mut self, obstacle: Rect) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// Set the hill.
    #[must_use]
    pub fn with_hill(mut self, center: Vec2, radius: f64) -> Self {
        self.hill = Some(Hill::new(center, radius));
        self
    }

    /// Whether a point is inside the canvas.
    #[must_use]
    pub fn in_bounds(&self, p: Vec2) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }

    /// Whether a circle of `radius` at `p` overlaps any obstacle.
    #[must_use]
    pub fn blocked(&self, p: Vec2, radius: f64) -> bool {
        self.obstacles.iter().any(|o| o.intersects_circle(p, radius))
    }

    /// Whether a circle at `p` is inside the canvas and clear of obstacles.
    #[must_use]
    pub fn is_free(&self, p: Vec2, radius: f64) -> bool {
        p.x >= radius
            && p.y >= radius
            && p.x <= self.width - radius
            && p.y <= self.height - radius
            && !self.blocked(p, radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioRegistry;

    fn check_invariants(layout: &GeneratedLayout, w: f64, h: f64, radius: f64) {
        for o in &layout.obstacles {
            assert!(o.within_bounds(w, h), "obstacle out of bounds: {o:?}");
            assert!(
                o.distance_to_point(layout.hill_center) > radius + HILL_BUFFER,
                "obstacle {o:?} overlaps hill at {:?}",
                layout.hill_center
            );
        }
    }

    #[test]
    fn test_open_field_reference_layout() {
        let layout = generate_battlefield(
            800.0,
            600.0,
            &ScenarioDescriptor::open_field(),
            12345,
            Some(Vec2::new(400.0, 300.0)),
            30.0,
        );
        assert_eq!(layout.obstacles.len(), 8);
        assert_eq!(layout.hill_center, Vec2::new(400.0, 300.0));
        check_invariants(&layout, 800.0, 600.0, 30.0);
    }

    #[test]
    fn test_all_scenarios_respect_invariants() {
        let registry = ScenarioRegistry::builtin();
        for descriptor in registry.iter() {
            for seed in 0..40 {
                let layout = generate_battlefield(800.0, 600.0, descriptor, seed, None, 30.0);
                check_invariants(&layout, 800.0, 600.0, 30.0);
            }
        }
    }

    #[test]
    fn test_determinism() {
        let d = ScenarioDescriptor::urban();
        let a = generate_battlefield(800.0, 600.0, &d, 42, None, 30.0);
        let b = generate_battlefield(800.0, 600.0, &d, 42, None, 30.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let d = ScenarioDescriptor::open_field();
        let a = generate_battlefield(800.0, 600.0, &d, 1, None, 30.0);
        let b = generate_battlefield(800.0, 600.0, &d, 2, None, 30.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hill_jitter_bounded() {
        let d = ScenarioDescriptor::open_field();
        for seed in 0..50 {
            let layout = generate_battlefield(800.0, 600.0, &d, seed, None, 30.0);
            assert!((layout.hill_center.x - 400.0).abs() <= 50.0);
            assert!((layout.hill_center.y - 300.0).abs() <= 50.0);
        }
        let centered =
            generate_battlefield(800.0, 600.0, &ScenarioDescriptor::fortress(), 9, None, 30.0);
        assert_eq!(centered.hill_center, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_chokepoint_has_walls() {
        let d = ScenarioDescriptor::chokepoint();
        let layout =
            generate_battlefield(800.0, 600.0, &d, 77, Some(Vec2::new(100.0, 100.0)), 30.0);
        // At least one long wall survives when the hill sits in a corner
        assert!(layout
            .obstacles
            .iter()
            .any(|o| o.width >= 200.0 || o.height >= 200.0));
    }

    #[test]
    fn test_urban_count_capped() {
        let d = ScenarioDescriptor::urban();
        for seed in 0..20 {
            let layout = generate_battlefield(800.0, 600.0, &d, seed, None, 30.0);
            assert!(layout.obstacles.len() <= d.obstacle_count as usize);
        }
    }

    #[test]
    fn test_hill_control_accumulates() {
        let mut hill = Hill::new(Vec2::new(100.0, 100.0), 30.0);
        assert_eq!(hill.update_control(1, 0, 0.5), Some(Team::Red));
        assert_eq!(hill.update_control(2, 0, 0.5), Some(Team::Red));
        assert!((hill.control.continuous_time - 1.0).abs() < 1e-12);

        // Contested resets the continuous timer, not the total
        assert_eq!(hill.update_control(1, 1, 0.5), None);
        assert_eq!(hill.control.continuous_time, 0.0);
        assert!((hill.control.red_time - 1.0).abs() < 1e-12);
        assert!((hill.control.contested_time - 0.5).abs() < 1e-12);

        assert_eq!(hill.update_control(0, 1, 0.25), Some(Team::Blue));
        assert!((hill.control.continuous_time - 0.25).abs() < 1e-12);
        assert!((hill.control.blue_time - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_battlefield_is_free() {
        let field =
            Battlefield::open(200.0, 200.0).with_obstacle(Rect::new(50.0, 50.0, 20.0, 20.0));
        assert!(field.is_free(Vec2::new(20.0, 20.0), 10.0));
        assert!(!field.is_free(Vec2::new(60.0, 60.0), 10.0));
        assert!(!field.is_free(Vec2::new(5.0, 100.0), 10.0));
    }
}
