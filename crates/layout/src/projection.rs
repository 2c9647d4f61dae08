//! World-to-screen projection and visibility culling.

use foundation::bounds::Aabb2;
use foundation::math::{Mat4, Vec2, Vec3, wrap_angle};

use crate::candidate::{Anchor, LayoutCandidate};
use crate::view::{ViewMode, ViewState};

/// Clip-space `w` at or below this is behind the camera.
const W_EPS: f64 = 1e-9;
/// Rotation reference segments are this fraction of the eye distance long.
const REACH_FRACTION: f64 = 1e-3;

/// Why a candidate is invisible this pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Rejection {
    Disabled,
    OutsideWindow,
    OutOfRange,
    BackFacing,
    /// Anchor or projection is degenerate (non-finite, behind the camera).
    Degenerate,
    Offscreen,
}

impl Rejection {
    pub fn name(self) -> &'static str {
        match self {
            Rejection::Disabled => "disabled",
            Rejection::OutsideWindow => "outside_window",
            Rejection::OutOfRange => "out_of_range",
            Rejection::BackFacing => "back_facing",
            Rejection::Degenerate => "degenerate",
            Rejection::Offscreen => "offscreen",
        }
    }
}

/// A visible candidate's projected anchor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenAnchor {
    pub screen_pos: Vec2,
    pub world_anchor: Vec3,
    /// Radians clockwise from screen up.
    pub rotation: f64,
    /// Index of the view offset that produced `screen_pos`.
    pub offset_index: usize,
}

pub struct Projector<'a> {
    view: &'a ViewState,
    bounds: Aabb2,
    camera_height: f64,
    transforms: Vec<Mat4>,
}

impl<'a> Projector<'a> {
    /// `margin_fraction` grows the screen on every side before culling.
    pub fn new(view: &'a ViewState, margin_fraction: f64) -> Self {
        let transforms = view
            .offsets()
            .iter()
            .map(|offset| view.view_proj.mul(offset))
            .collect();
        Self {
            view,
            bounds: view.screen_rect().expanded_by_fraction(margin_fraction),
            camera_height: view.camera_height(),
            transforms,
        }
    }

    /// Expanded screen rectangle used for culling and the overlap grid.
    pub fn bounds(&self) -> Aabb2 {
        self.bounds
    }

    /// Screen position of `p` through view offset `offset_index`.
    pub fn project(&self, p: Vec3, offset_index: usize) -> Option<Vec2> {
        let m = self.transforms.get(offset_index)?;
        let [x, y, _, w] = m.transform_point4(p);
        if !(w > W_EPS) || !x.is_finite() || !y.is_finite() || !w.is_finite() {
            return None;
        }
        let (nx, ny) = (x / w, y / w);
        let [sw, sh] = self.view.screen_size_px;
        let s = Vec2::new((nx * 0.5 + 0.5) * sw, (0.5 - ny * 0.5) * sh);
        s.is_finite().then_some(s)
    }

    /// Runs the visibility tests in order, then projects the anchor.
    pub fn evaluate(
        &self,
        candidate: &LayoutCandidate,
        enabled: bool,
    ) -> Result<ScreenAnchor, Rejection> {
        if !enabled {
            return Err(Rejection::Disabled);
        }
        if !candidate.enable_window.contains(self.view.time) {
            return Err(Rejection::OutsideWindow);
        }
        if !candidate.visible_range.contains(self.camera_height) {
            return Err(Rejection::OutOfRange);
        }
        let anchor = candidate
            .anchor
            .reference_point()
            .ok_or(Rejection::Degenerate)?;

        if let ViewMode::Globe(ellipsoid) = self.view.mode
            && let Some(normal) = ellipsoid.surface_normal(anchor)
            && normal.dot(self.view.eye - anchor) < 0.0
        {
            return Err(Rejection::BackFacing);
        }

        let mut projected_any = false;
        let mut hit = None;
        for index in 0..self.transforms.len() {
            if let Some(s) = self.project(anchor, index) {
                projected_any = true;
                if self.bounds.contains(s) {
                    hit = Some((index, s));
                    break;
                }
            }
        }
        let Some((offset_index, screen_pos)) = hit else {
            return Err(if projected_any {
                Rejection::Offscreen
            } else {
                Rejection::Degenerate
            });
        };

        let mut rotation = self.screen_rotation(candidate, anchor, screen_pos, offset_index);
        if candidate.keep_upright {
            rotation = keep_upright(rotation);
        }

        Ok(ScreenAnchor {
            screen_pos,
            world_anchor: anchor,
            rotation,
            offset_index,
        })
    }

    fn screen_rotation(
        &self,
        candidate: &LayoutCandidate,
        anchor: Vec3,
        screen_pos: Vec2,
        offset_index: usize,
    ) -> f64 {
        let reach = reach_length(self.view.eye, anchor);
        match &candidate.anchor {
            Anchor::Path(_) => {
                let Some(dir) = candidate.anchor.path_direction() else {
                    return candidate.rotation;
                };
                match self.screen_delta(anchor, dir, reach, screen_pos, offset_index) {
                    // Along-path text runs with the path, so measure from +x.
                    Some(d) => d.y.atan2(d.x),
                    None => candidate.rotation,
                }
            }
            Anchor::Point(_) => {
                if candidate.rotation == 0.0 {
                    return 0.0;
                }
                let Some((east, north)) = self.local_frame(anchor) else {
                    return candidate.rotation;
                };
                let (s, c) = candidate.rotation.sin_cos();
                let dir = north.scale(c) + east.scale(s);
                match self.screen_delta(anchor, dir, reach, screen_pos, offset_index) {
                    Some(d) => d.x.atan2(-d.y),
                    None => candidate.rotation,
                }
            }
        }
    }

    fn screen_delta(
        &self,
        anchor: Vec3,
        dir: Vec3,
        reach: f64,
        screen_pos: Vec2,
        offset_index: usize,
    ) -> Option<Vec2> {
        let tip = self.project(anchor + dir.scale(reach), offset_index)?;
        let d = tip - screen_pos;
        (d.length() > 1e-12).then_some(d)
    }

    /// Local (east, north) at `anchor`.
    fn local_frame(&self, anchor: Vec3) -> Option<(Vec3, Vec3)> {
        match self.view.mode {
            ViewMode::Flat => Some((Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0))),
            ViewMode::Globe(ellipsoid) => ellipsoid.east_north(anchor),
        }
    }
}

fn reach_length(eye: Vec3, anchor: Vec3) -> f64 {
    let d = (eye - anchor).length() * REACH_FRACTION;
    if d.is_finite() && d > 0.0 { d } else { REACH_FRACTION }
}

/// Flips angles pointing into the lower half-plane by half a turn.
pub fn keep_upright(rotation: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    let a = wrap_angle(rotation);
    if a > FRAC_PI_2 && a < 3.0 * FRAC_PI_2 {
        wrap_angle(a + PI)
    } else {
        a
    }
}
