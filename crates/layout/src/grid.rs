use foundation::bounds::Aabb2;
use foundation::math::ConvexPolygon;

use crate::config::MAX_GRID_CELLS;

/// Per-pass uniform grid of placed screen polygons.
///
/// Each polygon is registered in every cell its bounding box spans, so an
/// overlap test only compares against local neighbors. Polygons reaching past
/// the grid bounds are clamped into the edge cells, which keeps the test exact
/// (edge cells just get more crowded).
///
/// Ordering contract:
/// - Polygon indices are assigned in insertion order.
/// - `query` returns indices in ascending order.
#[derive(Debug, Clone)]
pub struct OverlapGrid {
    bounds: Aabb2,
    cells_x: usize,
    cells_y: usize,
    cell_w: f64,
    cell_h: f64,
    cells: Vec<Vec<usize>>,
    polygons: Vec<(ConvexPolygon, Aabb2)>,
    seen: Vec<u32>,
    epoch: u32,
}

impl OverlapGrid {
    pub fn new(bounds: Aabb2, cells_per_axis: usize) -> Self {
        let n = cells_per_axis.clamp(1, MAX_GRID_CELLS);
        let cell_w = if bounds.width() > 0.0 {
            bounds.width() / n as f64
        } else {
            1.0
        };
        let cell_h = if bounds.height() > 0.0 {
            bounds.height() / n as f64
        } else {
            1.0
        };
        Self {
            bounds,
            cells_x: n,
            cells_y: n,
            cell_w,
            cell_h,
            cells: vec![Vec::new(); n * n],
            polygons: Vec::new(),
            seen: Vec::new(),
            epoch: 0,
        }
    }

    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygon(&self, index: usize) -> Option<&ConvexPolygon> {
        self.polygons.get(index).map(|(p, _)| p)
    }

    pub fn polygons(&self) -> impl Iterator<Item = &ConvexPolygon> {
        self.polygons.iter().map(|(p, _)| p)
    }

    /// Registers `polygon` unless it overlaps an already registered one.
    ///
    /// Returns `false` and leaves the grid unchanged on overlap, or when the
    /// polygon is empty or non-finite.
    pub fn insert(&mut self, polygon: ConvexPolygon) -> bool {
        if polygon.is_empty() || !polygon.is_finite() {
            return false;
        }
        if self.collides(&polygon) {
            return false;
        }
        self.register(polygon);
        true
    }

    /// Registers `polygon` without testing it. Returns `None` for empty or
    /// non-finite polygons.
    pub fn force_insert(&mut self, polygon: ConvexPolygon) -> Option<usize> {
        if polygon.is_empty() || !polygon.is_finite() {
            return None;
        }
        Some(self.register(polygon))
    }

    /// True when `polygon` overlaps any registered polygon.
    pub fn collides(&mut self, polygon: &ConvexPolygon) -> bool {
        let bounds = polygon.bounds();
        let Some(span) = self.cell_span(&bounds) else {
            return false;
        };
        let epoch = self.next_epoch();

        for cy in span.1..=span.3 {
            for cx in span.0..=span.2 {
                for &idx in &self.cells[cy * self.cells_x + cx] {
                    if self.seen[idx] == epoch {
                        continue;
                    }
                    self.seen[idx] = epoch;
                    let (other, other_bounds) = &self.polygons[idx];
                    if other_bounds.overlaps(&bounds) && other.intersects(polygon) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Indices of registered polygons whose bounds touch `rect`.
    pub fn query(&mut self, rect: &Aabb2) -> Vec<usize> {
        let Some(span) = self.cell_span(rect) else {
            return Vec::new();
        };
        let epoch = self.next_epoch();

        let mut out = Vec::new();
        for cy in span.1..=span.3 {
            for cx in span.0..=span.2 {
                for &idx in &self.cells[cy * self.cells_x + cx] {
                    if self.seen[idx] == epoch {
                        continue;
                    }
                    self.seen[idx] = epoch;
                    if self.polygons[idx].1.touches(rect) {
                        out.push(idx);
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    fn register(&mut self, polygon: ConvexPolygon) -> usize {
        let bounds = polygon.bounds();
        let idx = self.polygons.len();
        if let Some(span) = self.cell_span(&bounds) {
            for cy in span.1..=span.3 {
                for cx in span.0..=span.2 {
                    self.cells[cy * self.cells_x + cx].push(idx);
                }
            }
        }
        self.polygons.push((polygon, bounds));
        self.seen.push(0);
        idx
    }

    fn next_epoch(&mut self) -> u32 {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Wrapped: stale stamps could alias the new epoch.
            self.seen.iter_mut().for_each(|s| *s = 0);
            self.epoch = 1;
        }
        self.epoch
    }

    /// Inclusive `(min_x, min_y, max_x, max_y)` cell range for `b`.
    fn cell_span(&self, b: &Aabb2) -> Option<(usize, usize, usize, usize)> {
        if b.is_empty() || !(b.min[0].is_finite() && b.min[1].is_finite()) {
            return None;
        }
        if !(b.max[0].is_finite() && b.max[1].is_finite()) {
            return None;
        }
        let cell = |v: f64, origin: f64, size: f64, n: usize| -> usize {
            let c = ((v - origin) / size).floor();
            if c <= 0.0 {
                0
            } else {
                (c as usize).min(n - 1)
            }
        };
        Some((
            cell(b.min[0], self.bounds.min[0], self.cell_w, self.cells_x),
            cell(b.min[1], self.bounds.min[1], self.cell_h, self.cells_y),
            cell(b.max[0], self.bounds.min[0], self.cell_w, self.cells_x),
            cell(b.max[1], self.bounds.min[1], self.cell_h, self.cells_y),
        ))
    }
}
