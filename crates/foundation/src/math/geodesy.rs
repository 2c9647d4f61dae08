use super::Vec3;

/// Geodetic coordinates in radians and meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self {
            lat_rad,
            lon_rad,
            alt_m,
        }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians(), alt_m)
    }
}

/// Oblate ellipsoid of revolution centered at the origin, polar axis = +z.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ellipsoid {
    /// Equatorial radius.
    pub a: f64,
    /// Polar radius.
    pub b: f64,
}

impl Ellipsoid {
    /// WGS84 in meters.
    pub const WGS84: Self = Self {
        a: 6_378_137.0,
        b: 6_378_137.0 * (1.0 - 1.0 / 298.257_223_563),
    };

    pub fn sphere(radius: f64) -> Self {
        Self {
            a: radius,
            b: radius,
        }
    }

    /// First eccentricity squared.
    pub fn e2(&self) -> f64 {
        1.0 - (self.b * self.b) / (self.a * self.a)
    }

    /// Second eccentricity squared.
    pub fn ep2(&self) -> f64 {
        (self.a * self.a - self.b * self.b) / (self.b * self.b)
    }

    pub fn to_ecef(&self, geo: Geodetic) -> Vec3 {
        let (sin_lat, cos_lat) = geo.lat_rad.sin_cos();
        let (sin_lon, cos_lon) = geo.lon_rad.sin_cos();
        let e2 = self.e2();

        let n = self.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        Vec3::new(
            (n + geo.alt_m) * cos_lat * cos_lon,
            (n + geo.alt_m) * cos_lat * sin_lon,
            (n * (1.0 - e2) + geo.alt_m) * sin_lat,
        )
    }

    /// Bowring's closed-form inverse; accurate to well below a millimeter for
    /// terrestrial and orbital altitudes.
    pub fn to_geodetic(&self, p: Vec3) -> Geodetic {
        let e2 = self.e2();
        let rho = (p.x * p.x + p.y * p.y).sqrt();
        let lon = p.y.atan2(p.x);

        if rho < 1e-9 {
            // On the polar axis.
            let lat = if p.z >= 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                -std::f64::consts::FRAC_PI_2
            };
            return Geodetic::new(lat, 0.0, p.z.abs() - self.b);
        }

        let theta = (p.z * self.a).atan2(rho * self.b);
        let (sin_t, cos_t) = theta.sin_cos();
        let lat = (p.z + self.ep2() * self.b * sin_t * sin_t * sin_t)
            .atan2(rho - e2 * self.a * cos_t * cos_t * cos_t);

        let sin_lat = lat.sin();
        let n = self.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        Geodetic::new(lat, lon, rho / lat.cos() - n)
    }

    /// Height of `p` above the ellipsoid surface.
    pub fn height_above(&self, p: Vec3) -> f64 {
        self.to_geodetic(p).alt_m
    }

    /// Outward geodetic surface normal through `p`.
    pub fn surface_normal(&self, p: Vec3) -> Option<Vec3> {
        let a2 = self.a * self.a;
        let b2 = self.b * self.b;
        Vec3::new(p.x / a2, p.y / a2, p.z / b2).normalized()
    }

    /// Local east and north unit vectors at `p`.
    ///
    /// At the poles east is undefined; the prime meridian's east (+y) is used.
    pub fn east_north(&self, p: Vec3) -> Option<(Vec3, Vec3)> {
        let up = self.surface_normal(p)?;
        let east = Vec3::new(0.0, 0.0, 1.0)
            .cross(up)
            .normalized()
            .unwrap_or(Vec3::new(0.0, 1.0, 0.0));
        let north = up.cross(east);
        Some((east, north))
    }
}
