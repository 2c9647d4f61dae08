use super::Vec3;

/// Row-major 4x4 matrix.
///
/// Points are column vectors: `clip = m * [x, y, z, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    pub rows: [[f64; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self { rows }
    }

    pub fn translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.rows[0][3] = t.x;
        m.rows[1][3] = t.y;
        m.rows[2][3] = t.z;
        m
    }

    pub fn scale(s: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.rows[0][0] = s.x;
        m.rows[1][1] = s.y;
        m.rows[2][2] = s.z;
        m
    }

    /// Orthographic projection mapping the box to the `[-1, 1]` xy clip cube
    /// and `[0, 1]` depth.
    pub fn orthographic(
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    ) -> Self {
        let w = right - left;
        let h = top - bottom;
        let d = far - near;
        Self::from_rows([
            [2.0 / w, 0.0, 0.0, -(right + left) / w],
            [0.0, 2.0 / h, 0.0, -(top + bottom) / h],
            [0.0, 0.0, -1.0 / d, -near / d],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Right-handed perspective projection with `[0, 1]` depth.
    pub fn perspective(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fov_y_rad * 0.5).tan();
        let d = near - far;
        Self::from_rows([
            [f / aspect, 0.0, 0.0, 0.0],
            [0.0, f, 0.0, 0.0],
            [0.0, 0.0, far / d, near * far / d],
            [0.0, 0.0, -1.0, 0.0],
        ])
    }

    /// Right-handed view matrix looking from `eye` at `target`.
    ///
    /// Returns `None` when `eye == target` or `up` is parallel to the view
    /// direction.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let f = (target - eye).normalized()?;
        let s = f.cross(up).normalized()?;
        let u = s.cross(f);
        Some(Self::from_rows([
            [s.x, s.y, s.z, -s.dot(eye)],
            [u.x, u.y, u.z, -u.dot(eye)],
            [-f.x, -f.y, -f.z, f.dot(eye)],
            [0.0, 0.0, 0.0, 1.0],
        ]))
    }

    pub fn mul(&self, other: &Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.rows[r][k] * other.rows[k][c]).sum();
            }
        }
        Self { rows: out }
    }

    /// Transforms a point, returning homogeneous `[x, y, z, w]`.
    pub fn transform_point4(&self, p: Vec3) -> [f64; 4] {
        let v = [p.x, p.y, p.z, 1.0];
        let mut out = [0.0; 4];
        for (r, cell) in out.iter_mut().enumerate() {
            *cell = (0..4).map(|k| self.rows[r][k] * v[k]).sum();
        }
        out
    }

    /// Transforms a point assuming an affine matrix (no perspective divide).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let [x, y, z, _] = self.transform_point4(p);
        Vec3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::Mat4;
    use crate::math::Vec3;

    #[test]
    fn identity_is_neutral() {
        let t = Mat4::translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.mul(&Mat4::IDENTITY), t);
        assert_eq!(Mat4::IDENTITY.mul(&t), t);
    }

    #[test]
    fn translation_then_scale_composes_right_to_left() {
        let m = Mat4::scale(Vec3::new(2.0, 2.0, 2.0))
            .mul(&Mat4::translation(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(
            m.transform_point(Vec3::new(1.0, 1.0, 1.0)),
            Vec3::new(4.0, 2.0, 2.0)
        );
    }

    #[test]
    fn orthographic_maps_box_corners_to_clip_cube() {
        let m = Mat4::orthographic(0.0, 100.0, 0.0, 50.0, 0.0, 10.0);
        let [x, y, _, w] = m.transform_point4(Vec3::new(100.0, 50.0, 0.0));
        assert_eq!((x / w, y / w), (1.0, 1.0));
        let [x, y, _, w] = m.transform_point4(Vec3::new(0.0, 0.0, 0.0));
        assert_eq!((x / w, y / w), (-1.0, -1.0));
    }

    #[test]
    fn perspective_puts_points_behind_eye_at_negative_w() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
        )
        .expect("valid view");
        let vp = Mat4::perspective(1.0, 1.0, 0.1, 100.0).mul(&view);
        assert!(vp.transform_point4(Vec3::ZERO)[3] > 0.0);
        assert!(vp.transform_point4(Vec3::new(0.0, 0.0, 20.0))[3] < 0.0);
    }

    #[test]
    fn look_at_rejects_degenerate_input() {
        assert!(Mat4::look_at(Vec3::ZERO, Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)).is_none());
    }
}
