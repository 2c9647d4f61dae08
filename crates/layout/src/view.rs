use foundation::bounds::Aabb2;
use foundation::math::{Ellipsoid, Mat4, Vec3};
use foundation::time::Time;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ViewMode {
    /// Planar map: z is height, +y is north.
    Flat,
    /// Globe in ECEF coordinates over the given ellipsoid.
    Globe(Ellipsoid),
}

/// Camera snapshot a pass is laid out against.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub view_proj: Mat4,
    /// Extra model transforms tried in order (wrapped map copies). Empty means
    /// identity only.
    pub view_offsets: Vec<Mat4>,
    pub screen_size_px: [f64; 2],
    pub eye: Vec3,
    pub mode: ViewMode,
    pub time: Time,
}

impl ViewState {
    pub fn flat(view_proj: Mat4, screen_size_px: [f64; 2], eye: Vec3) -> Self {
        Self {
            view_proj,
            view_offsets: Vec::new(),
            screen_size_px,
            eye,
            mode: ViewMode::Flat,
            time: Time::default(),
        }
    }

    pub fn globe(
        view_proj: Mat4,
        screen_size_px: [f64; 2],
        eye: Vec3,
        ellipsoid: Ellipsoid,
    ) -> Self {
        Self {
            mode: ViewMode::Globe(ellipsoid),
            ..Self::flat(view_proj, screen_size_px, eye)
        }
    }

    pub fn at(mut self, time: Time) -> Self {
        self.time = time;
        self
    }

    pub fn with_offsets(mut self, offsets: Vec<Mat4>) -> Self {
        self.view_offsets = offsets;
        self
    }

    pub fn screen_rect(&self) -> Aabb2 {
        Aabb2::from_size(self.screen_size_px[0], self.screen_size_px[1])
    }

    /// Height of the camera used against visibility ranges.
    pub fn camera_height(&self) -> f64 {
        match self.mode {
            ViewMode::Flat => self.eye.z,
            ViewMode::Globe(ellipsoid) => ellipsoid.height_above(self.eye),
        }
    }

    pub fn offsets(&self) -> &[Mat4] {
        if self.view_offsets.is_empty() {
            std::slice::from_ref(&Mat4::IDENTITY)
        } else {
            &self.view_offsets
        }
    }

    /// Same camera, possibly at a different time.
    pub fn same_camera(&self, other: &ViewState) -> bool {
        self.view_proj == other.view_proj
            && self.view_offsets == other.view_offsets
            && self.screen_size_px == other.screen_size_px
            && self.eye == other.eye
            && self.mode == other.mode
    }
}

#[cfg(test)]
mod tests {
    use super::{ViewMode, ViewState};
    use foundation::math::{Ellipsoid, Mat4, Vec3};
    use foundation::time::Time;

    #[test]
    fn camera_height_follows_mode() {
        let flat = ViewState::flat(Mat4::IDENTITY, [100.0, 100.0], Vec3::new(0.0, 0.0, 250.0));
        assert_eq!(flat.camera_height(), 250.0);

        let sphere = Ellipsoid::sphere(1000.0);
        let globe = ViewState::globe(
            Mat4::IDENTITY,
            [100.0, 100.0],
            Vec3::new(1500.0, 0.0, 0.0),
            sphere,
        );
        assert!((globe.camera_height() - 500.0).abs() < 1e-6);
        assert_eq!(globe.mode, ViewMode::Globe(sphere));
    }

    #[test]
    fn offsets_default_to_identity_and_time_is_not_camera() {
        let v = ViewState::flat(Mat4::IDENTITY, [10.0, 10.0], Vec3::ZERO);
        assert_eq!(v.offsets(), &[Mat4::IDENTITY]);
        let later = v.clone().at(Time(5.0));
        assert!(v.same_camera(&later));
        let moved = ViewState::flat(Mat4::IDENTITY, [10.0, 10.0], Vec3::new(1.0, 0.0, 0.0));
        assert!(!v.same_camera(&moved));
    }
}
