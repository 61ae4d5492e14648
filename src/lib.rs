//! Rowfall - settle and debris physics for a falling-block puzzle field
//!
//! Core modules:
//! - `sim`: Deterministic simulation (settle springs, flying debris, collisions)
//! - `settings`: Data-driven tuning loaded from JSON

pub mod settings;
pub mod sim;

pub use settings::{DebrisConfig, QualityPreset, SettleConfig, Settings};

use glam::{Quat, Vec2};

/// Simulation tuning defaults
pub mod consts {
    /// Largest frame dt the driver feeds into the systems
    pub const MAX_FRAME_DT: f32 = 0.25;

    /// Falling integration sub-step (~16 ms)
    pub const FALL_STEP: f32 = 1.0 / 60.0;
    /// Bouncing integration sub-step (~2 ms, spring needs the finer step)
    pub const BOUNCE_STEP: f32 = 1.0 / 500.0;
    /// Smallest integration sub-step accepted from settings
    pub const MIN_SUB_STEP: f32 = 1e-4;
    /// Downward acceleration of settling blocks (rows/s²)
    pub const FALL_GRAVITY: f32 = 40.0;
    /// Spring constant applied to penetration below the resting row
    pub const SPRING_STIFFNESS: f32 = 2500.0;
    /// Linear damping applied while compressed
    pub const SPRING_DAMPING: f32 = 40.0;
    /// Impacts slower than this snap to rest instead of bouncing (rows/s)
    pub const MIN_BOUNCE_SPEED: f32 = 1.0;
    /// Quiescent window before the field reports fully settled (seconds)
    pub const SETTLE_WAIT: f32 = 0.15;
    /// A bouncing block this far above its resting row is falling again
    pub const WRONG_BOUNCE_HEIGHT: f32 = 1.0;
    /// Speed below which a block near the spring's equilibrium counts as stopped
    pub const SETTLE_SPEED: f32 = 1e-3;
    /// Position tolerance for "at rest"
    pub const REST_EPSILON: f32 = 1e-4;

    /// Gravity for line-clear and row-explosion debris (world units/s²)
    pub const LINE_GRAVITY: f32 = -30.0;
    /// Gravity for point-explosion debris
    pub const EXPLOSION_GRAVITY: f32 = -12.0;
    /// Debris further than this below the camera is released
    pub const CULL_DISTANCE: f32 = 30.0;
    /// Debris closer than one block are tested for collision
    pub const BLOCK_SIZE: f32 = 1.0;
    /// Floor for squared distance in the explosion falloff
    pub const EXPLOSION_MIN_DIST_SQ: f32 = 0.25;
    /// Offset used when a sub-cell shares the detonation row or column
    pub const EXPLOSION_TIE_BREAK: f32 = 0.05;

    /// Debris pool capacity (sized for the worst simultaneous clear)
    pub const DEBRIS_POOL_CAPACITY: usize = 256;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Rotation about the view axis by a number of quarter turns
#[inline]
pub fn quarter_turns(turns: u8) -> Quat {
    Quat::from_rotation_z(f32::from(turns % 4) * std::f32::consts::FRAC_PI_2)
}

/// Rotate a cell-local offset (origin at the cell center) by quarter turns
#[inline]
pub fn rotate_quarter(offset: Vec2, turns: u8) -> Vec2 {
    match turns % 4 {
        0 => offset,
        1 => Vec2::new(-offset.y, offset.x),
        2 => -offset,
        _ => Vec2::new(offset.y, -offset.x),
    }
}
