use crate::math::Vec2;

/// Axis-aligned screen rectangle (pixels).
///
/// Convention: `min` is inclusive, `max` is inclusive; an empty box has
/// `min > max` on some axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Aabb2::new([0.0, 0.0], [width, height])
    }

    pub fn empty() -> Self {
        Aabb2::new(
            [f64::INFINITY, f64::INFINITY],
            [f64::NEG_INFINITY, f64::NEG_INFINITY],
        )
    }

    /// Bounds of a point set; `empty()` for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Self {
        let mut out = Self::empty();
        for p in points {
            out.min[0] = out.min[0].min(p.x);
            out.min[1] = out.min[1].min(p.y);
            out.max[0] = out.max[0].max(p.x);
            out.max[1] = out.max[1].max(p.y);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        !(self.min[0] <= self.max[0] && self.min[1] <= self.max[1])
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).max(0.0)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        )
    }

    /// Grows each side by `fraction` of the box's own size on that axis.
    pub fn expanded_by_fraction(&self, fraction: f64) -> Self {
        let dx = self.width() * fraction;
        let dy = self.height() * fraction;
        self.expanded(dx, dy)
    }

    pub fn expanded(&self, dx: f64, dy: f64) -> Self {
        Aabb2::new(
            [self.min[0] - dx, self.min[1] - dy],
            [self.max[0] + dx, self.max[1] + dy],
        )
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min[0] && p.x <= self.max[0] && p.y >= self.min[1] && p.y <= self.max[1]
    }

    /// True when the interiors overlap; boxes that only share an edge do not.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min[0] < other.max[0]
            && other.min[0] < self.max[0]
            && self.min[1] < other.max[1]
            && other.min[1] < self.max[1]
    }

    /// True when the closed boxes share at least one point.
    pub fn touches(&self, other: &Self) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }
}
