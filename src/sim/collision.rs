//! Collision response between flying debris
//!
//! Debris are equal unit masses. Two pieces closer than a block size trade
//! the component of their relative velocity along the line between their
//! centers, which is the closed-form equal-mass elastic collision.

use glam::Vec3;

/// Separation used when two centers coincide exactly
pub const COINCIDENT_SEPARATION: Vec3 = Vec3::new(0.0, 0.01, 0.0);

/// Velocity corrections for a colliding pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairResponse {
    pub delta_a: Vec3,
    pub delta_b: Vec3,
}

/// Vector from `b` to `a`, never zero
#[inline]
pub fn separation(pos_a: Vec3, pos_b: Vec3) -> Vec3 {
    let d = pos_a - pos_b;
    if d.length_squared() < f32::EPSILON {
        COINCIDENT_SEPARATION
    } else {
        d
    }
}

/// Rate at which the pair is moving apart along `d` (negative when closing)
#[inline]
pub fn separation_rate(d: Vec3, vel_a: Vec3, vel_b: Vec3) -> f32 {
    (vel_a - vel_b).dot(d)
}

/// Equal-mass elastic response for a pair within `block_size` of each other.
///
/// Returns None when the pair is out of range, or when applying the exchange
/// would not make them separate faster than they do now (they are already
/// moving apart, typically because they collided last frame).
pub fn elastic_response(
    pos_a: Vec3,
    vel_a: Vec3,
    pos_b: Vec3,
    vel_b: Vec3,
    block_size: f32,
) -> Option<PairResponse> {
    let d = separation(pos_a, pos_b);
    let dist_sq = d.length_squared();
    if dist_sq > block_size * block_size {
        return None;
    }

    // Projection of relative velocity onto the separation axis
    let delta = d * (separation_rate(d, vel_a, vel_b) / dist_sq);
    let response = PairResponse {
        delta_a: -delta,
        delta_b: delta,
    };

    let before = separation_rate(d, vel_a, vel_b);
    let after = separation_rate(d, vel_a + response.delta_a, vel_b + response.delta_b);
    if after > before {
        Some(response)
    } else {
        None
    }
}
