//! Convex screen polygons and exact overlap tests.
//!
//! Footprints are small (rectangles, the occasional hexagon), so the
//! separating-axis test is run directly on every edge normal without any
//! precomputation.

use crate::bounds::Aabb2;

use super::Vec2;

/// Separation below this is treated as touching, not overlapping.
const OVERLAP_EPS: f64 = 1e-9;

/// Convex polygon in screen pixels.
///
/// Vertices may wind in either direction. Degenerate polygons (fewer than 3
/// vertices) are still tested on their bounding box so points and segments
/// remain usable as footprints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvexPolygon {
    points: Vec<Vec2>,
}

impl ConvexPolygon {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle centered on the origin.
    pub fn centered_rect(width: f64, height: f64) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        Self::new(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }

    pub fn from_aabb(b: &Aabb2) -> Self {
        Self::new(vec![
            Vec2::new(b.min[0], b.min[1]),
            Vec2::new(b.max[0], b.min[1]),
            Vec2::new(b.max[0], b.max[1]),
            Vec2::new(b.min[0], b.max[1]),
        ])
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Aabb2 {
        Aabb2::from_points(self.points.iter())
    }

    pub fn translated(&self, by: Vec2) -> Self {
        Self::new(self.points.iter().map(|p| *p + by).collect())
    }

    /// Rotates about the origin (clockwise on a y-down screen).
    pub fn rotated(&self, angle: f64) -> Self {
        if angle == 0.0 {
            return self.clone();
        }
        Self::new(self.points.iter().map(|p| p.rotate(angle)).collect())
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.is_finite())
    }

    /// Point-in-polygon for convex polygons (boundary counts as inside).
    pub fn contains(&self, p: Vec2) -> bool {
        if self.points.len() < 3 {
            return self.bounds().contains(p);
        }
        let mut sign = 0.0_f64;
        for (a, b) in edges(&self.points) {
            let cross = (b - a).perp().dot(p - a);
            if cross.abs() <= OVERLAP_EPS {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Exact interior overlap test.
    ///
    /// Polygons that only share an edge or a vertex do not intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.points.is_empty() || other.points.is_empty() {
            return false;
        }
        if !self.bounds().overlaps(&other.bounds()) {
            return false;
        }
        if self.points.len() < 3 || other.points.len() < 3 {
            // Bounding boxes already overlap with positive area.
            return true;
        }

        for poly in [self, other] {
            for (a, b) in edges(&poly.points) {
                let axis = (b - a).perp();
                if axis.dot(axis) <= 0.0 {
                    continue;
                }
                let (min_a, max_a) = project(&self.points, axis);
                let (min_b, max_b) = project(&other.points, axis);
                let scale = axis.length();
                if (min_b - max_a) / scale >= -OVERLAP_EPS || (min_a - max_b) / scale >= -OVERLAP_EPS
                {
                    return false;
                }
            }
        }
        true
    }
}

fn edges(points: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

fn project(points: &[Vec2], axis: Vec2) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in points {
        let d = p.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}
