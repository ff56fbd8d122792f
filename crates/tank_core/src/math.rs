//! Geometry utilities for the battlefield.
//!
//! Positions are plain `f64` pairs in canvas pixels. Every random input to
//! the simulation comes from [`crate::rng::SeededRng`], so the same inputs
//! always replay the same arithmetic.

use serde::{Deserialize, Serialize};

/// 2D vector in canvas space (x grows right, y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Vec2 {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector pointing at `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Angle of this vector in radians.
    #[must_use]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scale by a scalar.
    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Perpendicular vector (rotated 90 degrees).
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Mean of a set of points, or `None` when empty.
    #[must_use]
    pub fn centroid(points: impl IntoIterator<Item = Self>) -> Option<Self> {
        let mut sum = Self::ZERO;
        let mut count = 0usize;
        for p in points {
            sum = sum + p;
            count += 1;
        }
        (count > 0).then(|| sum.scale(1.0 / count as f64))
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width (non-negative).
    pub width: f64,
    /// Height (non-negative).
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether a point lies inside (edges inclusive).
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Whether this rectangle lies fully inside `[0, width] x [0, height]`.
    #[must_use]
    pub fn within_bounds(&self, width: f64, height: f64) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= width && self.bottom() <= height
    }

    /// Whether two rectangles overlap (touching edges do not count).
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Nearest point of the rectangle to `p`.
    #[must_use]
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.x, self.right()),
            p.y.clamp(self.y, self.bottom()),
        )
    }

    /// Distance from `p` to the nearest point of the rectangle (0 inside).
    #[must_use]
    pub fn distance_to_point(&self, p: Vec2) -> f64 {
        self.closest_point(p).distance(p)
    }

    /// Whether a circle overlaps this rectangle.
    #[must_use]
    pub fn intersects_circle(&self, center: Vec2, radius: f64) -> bool {
        self.closest_point(center).distance_squared(center) < radius * radius
    }

    /// Shrink or move the rectangle so that it lies fully inside the canvas.
    #[must_use]
    pub fn clamped_to(&self, width: f64, height: f64) -> Self {
        let w = self.width.min(width).max(0.0);
        let h = self.height.min(height).max(0.0);
        Self::new(
            self.x.clamp(0.0, width - w),
            self.y.clamp(0.0, height - h),
            w,
            h,
        )
    }

    /// First parameter `t ∈ [0, 1]` at which the segment `a → b` enters the
    /// rectangle (Liang–Barsky clipping), or `None` if it never does.
    #[must_use]
    pub fn segment_entry(&self, a: Vec2, b: Vec2) -> Option<f64> {
        let d = b - a;
        let mut t_min = 0.0_f64;
        let mut t_max = 1.0_f64;

        let checks = [
            (-d.x, a.x - self.x),
            (d.x, self.right() - a.x),
            (-d.y, a.y - self.y),
            (d.y, self.bottom() - a.y),
        ];

        for (p, q) in checks {
            if p.abs() < f64::EPSILON {
                if q < 0.0 {
                    return None;
                }
            } else {
                let t = q / p;
                if p < 0.0 {
                    t_min = t_min.max(t);
                } else {
                    t_max = t_max.min(t);
                }
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }

    /// Whether the segment `a → b` touches the rectangle.
    #[must_use]
    pub fn intersects_segment(&self, a: Vec2, b: Vec2) -> bool {
        self.segment_entry(a, b).is_some()
    }
}

/// First parameter `t ∈ [0, 1]` at which segment `a → b` comes within
/// `radius` of `center`, or `None`.
#[must_use]
pub fn segment_circle_entry(a: Vec2, b: Vec2, center: Vec2, radius: f64) -> Option<f64> {
    let d = b - a;
    let f = a - center;
    let qa = d.dot(d);
    let c = f.dot(f) - radius * radius;

    if c <= 0.0 {
        // Segment starts inside the circle
        return Some(0.0);
    }
    if qa <= f64::EPSILON {
        return None;
    }

    let qb = 2.0 * f.dot(d);
    let discriminant = qb * qb - 4.0 * qa * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-qb - discriminant.sqrt()) / (2.0 * qa);
    (0.0..=1.0).contains(&t).then_some(t)
}

/// Wrap an angle into `(-PI, PI]`.
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let mut a = angle % tau;
    if a <= -std::f64::consts::PI {
        a += tau;
    } else if a > std::f64::consts::PI {
        a -= tau;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(3.0, 0.0);
        let b = Vec2::new(0.0, 4.0);
        assert_eq!(a.distance_squared(b), 25.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_vec2_normalize() {
        let n = Vec2::new(3.0, 4.0).normalize();
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_centroid() {
        let c = Vec2::centroid([Vec2::new(0.0, 0.0), Vec2::new(10.0, 20.0)]);
        assert_eq!(c, Some(Vec2::new(5.0, 10.0)));
        assert_eq!(Vec2::centroid(Vec::new()), None);
    }

    #[test]
    fn test_rect_closest_point_distance() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(r.distance_to_point(Vec2::new(15.0, 15.0)), 0.0);
        assert_eq!(r.distance_to_point(Vec2::new(0.0, 15.0)), 10.0);
        assert_eq!(r.distance_to_point(Vec2::new(33.0, 34.0)), 5.0);
    }

    #[test]
    fn test_segment_crosses_rect() {
        let r = Rect::new(40.0, 40.0, 20.0, 20.0);
        assert!(r.intersects_segment(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0)));
        assert!(!r.intersects_segment(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0)));
        // Segment stopping short of the rectangle
        assert!(!r.intersects_segment(Vec2::new(0.0, 50.0), Vec2::new(30.0, 50.0)));

        let t = r
            .segment_entry(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0))
            .unwrap();
        assert!((t - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_vertical_segment_parallel_to_edge() {
        let r = Rect::new(40.0, 40.0, 20.0, 20.0);
        assert!(r.intersects_segment(Vec2::new(50.0, 0.0), Vec2::new(50.0, 100.0)));
        assert!(!r.intersects_segment(Vec2::new(70.0, 0.0), Vec2::new(70.0, 100.0)));
    }

    #[test]
    fn test_segment_circle_entry() {
        let t = segment_circle_entry(
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(50.0, 0.0),
            10.0,
        )
        .unwrap();
        assert!((t - 0.4).abs() < 1e-12);

        assert!(segment_circle_entry(
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(50.0, 30.0),
            10.0,
        )
        .is_none());
    }

    #[test]
    fn test_clamped_to_bounds() {
        let r = Rect::new(790.0, -5.0, 40.0, 30.0).clamped_to(800.0, 600.0);
        assert!(r.within_bounds(800.0, 600.0));
        assert_eq!(r.width, 40.0);
    }

    #[test]
    fn test_wrap_angle() {
        let a = wrap_angle(2.5 * std::f64::consts::PI);
        assert!((a - 0.5 * std::f64::consts::PI).abs() < 1e-9);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-12);
    }
}
