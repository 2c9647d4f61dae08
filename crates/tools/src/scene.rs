//! JSON scene files replayed by `declutter run`.
//!
//! A scene names a camera (flat or globe, optionally animated), an initial
//! candidate list, and frame-indexed edit events.

use foundation::math::{Ellipsoid, Geodetic, Mat4, Vec3};
use foundation::time::{Time, TimeSpan};
use layout::{LayoutCandidate, Placement, PlacementMask, ViewState, VisibleRange};
use serde::Deserialize;

const MEAN_EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub camera: Camera,
    #[serde(default)]
    pub candidates: Vec<CandidateDef>,
    #[serde(default)]
    pub override_identities: Vec<String>,
    #[serde(default)]
    pub events: Vec<SceneEvent>,
}

impl Scene {
    pub fn from_json_str(s: &str) -> Result<Self, String> {
        serde_json::from_str(s).map_err(|e| format!("scene json: {e}"))
    }

    /// Candidates of `defs`, resolved against the scene camera.
    pub fn resolve(&self, defs: &[CandidateDef]) -> Result<Vec<LayoutCandidate>, String> {
        let ellipsoid = self.camera.ellipsoid();
        defs
            .iter()
            .enumerate()
            .map(|(i, c)| c.to_candidate(ellipsoid).map_err(|e| format!("candidate {i}: {e}")))
            .collect()
    }

    pub fn events_at(&self, frame: usize) -> impl Iterator<Item = &SceneEvent> {
        self.events.iter().filter(move |e| e.frame == frame)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Camera {
    /// Top-down orthographic view over the xy plane.
    Flat {
        screen: [f64; 2],
        center: [f64; 2],
        #[serde(default = "one")]
        units_per_px: f64,
        #[serde(default = "default_height")]
        height: f64,
        #[serde(default)]
        pan_per_s: [f64; 2],
    },
    /// Perspective view of a sphere, looking at its center.
    Globe {
        screen: [f64; 2],
        #[serde(default = "earth_radius")]
        radius: f64,
        lat_deg: f64,
        lon_deg: f64,
        altitude: f64,
        #[serde(default = "default_fov")]
        fov_deg: f64,
        #[serde(default)]
        orbit_deg_per_s: f64,
    },
}

fn one() -> f64 {
    1.0
}

fn default_height() -> f64 {
    1000.0
}

fn earth_radius() -> f64 {
    MEAN_EARTH_RADIUS_M
}

fn default_fov() -> f64 {
    45.0
}

impl Camera {
    fn ellipsoid(&self) -> Option<Ellipsoid> {
        match self {
            Camera::Flat { .. } => None,
            Camera::Globe { radius, .. } => Some(Ellipsoid::sphere(*radius)),
        }
    }

    /// Camera snapshot at scene time `t`.
    pub fn view_at(&self, t: f64) -> Result<ViewState, String> {
        match *self {
            Camera::Flat {
                screen,
                center,
                units_per_px,
                height,
                pan_per_s,
            } => {
                let cx = center[0] + pan_per_s[0] * t;
                let cy = center[1] + pan_per_s[1] * t;
                let hw = screen[0] * units_per_px * 0.5;
                let hh = screen[1] * units_per_px * 0.5;
                let vp = Mat4::orthographic(cx - hw, cx + hw, cy - hh, cy + hh, -height, height);
                Ok(ViewState::flat(vp, screen, Vec3::new(cx, cy, height)).at(Time(t)))
            }
            Camera::Globe {
                screen,
                radius,
                lat_deg,
                lon_deg,
                altitude,
                fov_deg,
                orbit_deg_per_s,
            } => {
                let ellipsoid = Ellipsoid::sphere(radius);
                let geo = Geodetic::from_degrees(lat_deg, lon_deg + orbit_deg_per_s * t, altitude);
                let eye = ellipsoid.to_ecef(geo);
                let view = Mat4::look_at(eye, Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0))
                    .ok_or_else(|| "globe camera cannot sit on a pole".to_string())?;
                let near = (altitude * 0.01).max(1.0);
                let proj = Mat4::perspective(
                    fov_deg.to_radians(),
                    screen[0] / screen[1],
                    near,
                    altitude + 2.0 * radius,
                );
                Ok(ViewState::globe(proj.mul(&view), screen, eye, ellipsoid).at(Time(t)))
            }
        }
    }
}

/// One candidate. Exactly one of `position`, `geodetic_deg` and `path` must
/// be given.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateDef {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    /// `[lat, lon, altitude]` on the globe camera's sphere.
    #[serde(default)]
    pub geodetic_deg: Option<[f64; 3]>,
    #[serde(default)]
    pub path: Option<Vec<[f64; 3]>>,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub importance: f64,
    /// Placement names; defaults to center only.
    #[serde(default)]
    pub placements: Vec<String>,
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default)]
    pub keep_upright: bool,
    #[serde(default)]
    pub visible_range: Option<[f64; 2]>,
    #[serde(default)]
    pub enable_window: Option<[f64; 2]>,
    #[serde(default = "no_group")]
    pub cluster_group: i32,
    #[serde(default)]
    pub merge_tag: Option<String>,
}

fn no_group() -> i32 {
    -1
}

impl CandidateDef {
    pub fn to_candidate(&self, ellipsoid: Option<Ellipsoid>) -> Result<LayoutCandidate, String> {
        let mut c = match (&self.position, &self.geodetic_deg, &self.path) {
            (Some(p), None, None) => LayoutCandidate::point(vec3(*p), self.width, self.height),
            (None, Some([lat, lon, alt]), None) => {
                let ellipsoid =
                    ellipsoid.ok_or_else(|| "geodetic_deg needs a globe camera".to_string())?;
                let at = ellipsoid.to_ecef(Geodetic::from_degrees(*lat, *lon, *alt));
                LayoutCandidate::point(at, self.width, self.height)
            }
            (None, None, Some(path)) => LayoutCandidate::path(
                path.iter().copied().map(vec3).collect(),
                self.width,
                self.height,
            ),
            _ => return Err("exactly one of position, geodetic_deg, path".to_string()),
        };

        c = c
            .with_importance(self.importance)
            .with_placements(placement_mask(&self.placements)?)
            .with_rotation(self.rotation_deg.to_radians(), self.keep_upright)
            .with_cluster_group(self.cluster_group);
        if let Some(identity) = &self.identity {
            c = c.with_identity(identity.clone());
        }
        if let Some([min, max]) = self.visible_range {
            c = c.with_visible_range(VisibleRange::new(min, max));
        }
        if let Some([start, end]) = self.enable_window {
            c = c.with_enable_window(TimeSpan::new(Time(start), Time(end)));
        }
        if let Some(tag) = &self.merge_tag {
            c = c.with_merge_tag(tag.clone());
        }
        Ok(c)
    }
}

fn vec3(p: [f64; 3]) -> Vec3 {
    Vec3::new(p[0], p[1], p[2])
}

fn placement_mask(names: &[String]) -> Result<PlacementMask, String> {
    if names.is_empty() {
        return Ok(PlacementMask::CENTER);
    }
    names.iter().try_fold(PlacementMask::NONE, |mask, name| {
        Placement::from_name(name)
            .map(|p| mask.with(p))
            .ok_or_else(|| format!("unknown placement: {name}"))
    })
}

/// Edits applied just before the pass of `frame`.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneEvent {
    pub frame: usize,
    #[serde(default)]
    pub add: Vec<CandidateDef>,
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub max_display_objects: Option<i64>,
}
