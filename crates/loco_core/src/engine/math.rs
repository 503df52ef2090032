//! Vector and heading helpers
//!
//! World space is `y`-up; the ground plane is `x/z`. Headings are `i16`
//! circle divisions (65536 per turn, wrapping), heading `0` faces `+z` and
//! heading `16384` faces `+x`.

use std::f32::consts::PI;

/// World-space vector (elmos).
pub type Vec3 = nalgebra::Vector3<f32>;

/// Heading units per full circle.
pub const HEADING_CIRCLE: f32 = 65536.0;

/// Heading units per half circle.
pub const HEADING_HALF_CIRCLE: i32 = 32768;

const HEADING_PER_RADIAN: f32 = 32768.0 / PI;

const EPSILON: f32 = 0.0001;

#[inline]
pub fn up() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

/// Drop the vertical component.
#[inline]
pub fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[inline]
pub fn flat_len(v: Vec3) -> f32 {
    (v.x * v.x + v.z * v.z).sqrt()
}

#[inline]
pub fn flat_dist(a: Vec3, b: Vec3) -> f32 {
    flat_len(a - b)
}

#[inline]
pub fn flat_dist_sq(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Normalize, returning the zero vector for degenerate input.
#[inline]
pub fn safe_normalize(v: Vec3) -> Vec3 {
    let len = v.norm();
    if len < EPSILON {
        Vec3::zeros()
    } else {
        v / len
    }
}

/// Normalized ground-plane direction, zero for degenerate input.
#[inline]
pub fn flat_dir(v: Vec3) -> Vec3 {
    safe_normalize(flat(v))
}

/// Heading that faces along `(dx, dz)`.
pub fn heading_from_vector(dx: f32, dz: f32) -> i16 {
    if dx == 0.0 && dz == 0.0 {
        return 0;
    }
    let angle = dx.atan2(dz);
    // 32768 wraps to -32768, which is the same heading
    ((angle * HEADING_PER_RADIAN).round() as i32) as i16
}

/// Unit ground-plane vector for a heading.
pub fn vector_from_heading(heading: i16) -> Vec3 {
    let angle = heading as f32 / HEADING_PER_RADIAN;
    Vec3::new(angle.sin(), 0.0, angle.cos())
}

/// Signed shortest rotation from `from` to `to`.
#[inline]
pub fn heading_delta(from: i16, to: i16) -> i16 {
    to.wrapping_sub(from)
}

/// Step `current` toward `wanted` by at most `max_step` heading units.
pub fn step_heading(current: i16, wanted: i16, max_step: i32) -> i16 {
    let delta = heading_delta(current, wanted) as i32;
    let step = delta.clamp(-max_step, max_step);
    (current as i32 + step) as i16
}

/// Largest whole heading step allowed by a turn rate.
#[inline]
pub fn max_heading_step(turn_rate: f32) -> i32 {
    (turn_rate.max(0.0).floor() as i32).min(HEADING_HALF_CIRCLE)
}

/// Heading pointing the opposite way.
#[inline]
pub fn opposite_heading(heading: i16) -> i16 {
    heading.wrapping_add(i16::MIN)
}

/// Heading units to radians.
#[inline]
pub fn heading_to_radians(units: f32) -> f32 {
    units / HEADING_PER_RADIAN
}
