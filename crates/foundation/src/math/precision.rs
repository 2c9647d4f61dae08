//! Deterministic float handling.
//!
//! Layout decisions must not depend on NaN payloads, signed zeros, or
//! sub-pixel noise, so sorting keys and change detection go through here.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Equality within `eps`; NaN equals only NaN.
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    a == b || (a - b).abs() <= eps
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let tau = std::f64::consts::TAU;
    let wrapped = angle.rem_euclid(tau);
    // rem_euclid can round up to exactly tau for tiny negative inputs.
    if wrapped >= tau { 0.0 } else { wrapped }
}
