//! Simulation settings and tuning
//!
//! Everything here has a default taken from `consts`; JSON files only need
//! to name the fields they override.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }

    /// Debris pool capacity for this preset
    pub fn debris_capacity(&self) -> usize {
        match self {
            QualityPreset::Low => DEBRIS_POOL_CAPACITY / 4,
            QualityPreset::Medium => DEBRIS_POOL_CAPACITY,
            QualityPreset::High => DEBRIS_POOL_CAPACITY * 2,
        }
    }
}

/// Spring/damper tuning for settling blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Downward acceleration (rows/s²)
    pub gravity: f32,
    pub spring_stiffness: f32,
    pub spring_damping: f32,
    /// Sub-step while strictly falling
    pub fall_step: f32,
    /// Sub-step while the spring is engaged
    pub bounce_step: f32,
    /// Impacts slower than this snap to rest
    pub min_bounce_speed: f32,
    /// Disable to make every landing snap
    pub bounce: bool,
    /// Quiescent window before reporting settled
    pub wait_duration: f32,
    /// Height above the resting row that marks a bounce as stale
    pub wrong_bounce_height: f32,
}

impl SettleConfig {
    /// Clamp the integration sub-steps to a positive floor
    pub fn sanitized(mut self) -> Self {
        if self.fall_step.is_nan() || self.fall_step < MIN_SUB_STEP {
            log::warn!("fall_step {} too small, using {}", self.fall_step, MIN_SUB_STEP);
            self.fall_step = MIN_SUB_STEP;
        }
        if self.bounce_step.is_nan() || self.bounce_step < MIN_SUB_STEP {
            log::warn!("bounce_step {} too small, using {}", self.bounce_step, MIN_SUB_STEP);
            self.bounce_step = MIN_SUB_STEP;
        }
        self
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            gravity: FALL_GRAVITY,
            spring_stiffness: SPRING_STIFFNESS,
            spring_damping: SPRING_DAMPING,
            fall_step: FALL_STEP,
            bounce_step: BOUNCE_STEP,
            min_bounce_speed: MIN_BOUNCE_SPEED,
            bounce: true,
            wait_duration: SETTLE_WAIT,
            wrong_bounce_height: WRONG_BOUNCE_HEIGHT,
        }
    }
}

/// Force model and lifetime tuning for flying debris
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebrisConfig {
    /// Vertical acceleration for line-clear and row-explosion debris
    pub line_gravity: f32,
    /// Vertical acceleration for point-explosion debris
    pub explosion_gravity: f32,
    /// Release distance below the camera
    pub cull_distance: f32,
    /// Collision distance between debris centers
    pub block_size: f32,
    /// Outward push per column of distance from the field center
    pub line_spread: f32,
    /// Range of upward launch speed for line clears
    pub line_lift: (f32, f32),
    /// Range of speed toward the camera
    pub forward_speed: (f32, f32),
    /// Maximum angular speed on any axis for line clears (rad/s)
    pub spin: f32,
    /// Sideways speed for shield knockback
    pub shield_force: f32,
    /// Sideways speed for row-bomb debris
    pub row_explosion_force: f32,
    /// Fraction of an explosion applied to debris already in the air
    pub airborne_factor: f32,
    /// Radius within which airborne debris feel an explosion
    pub airborne_radius: f32,
    /// Floor for squared distance in the explosion falloff
    pub explosion_min_dist_sq: f32,
}

impl Default for DebrisConfig {
    fn default() -> Self {
        Self {
            line_gravity: LINE_GRAVITY,
            explosion_gravity: EXPLOSION_GRAVITY,
            cull_distance: CULL_DISTANCE,
            block_size: BLOCK_SIZE,
            line_spread: 0.6,
            line_lift: (4.0, 9.0),
            forward_speed: (2.0, 6.0),
            spin: 6.0,
            shield_force: 8.0,
            row_explosion_force: 10.0,
            airborne_factor: 0.5,
            airborne_radius: 6.0,
            explosion_min_dist_sq: EXPLOSION_MIN_DIST_SQ,
        }
    }
}

/// Top-level simulation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Quality preset (controls debris pool size)
    pub quality: QualityPreset,
    pub settle: SettleConfig,
    pub debris: DebrisConfig,
}

impl Settings {
    /// Create settings from a quality preset
    pub fn from_preset(preset: QualityPreset) -> Self {
        Self {
            quality: preset,
            ..Self::default()
        }
    }

    /// Debris pool capacity implied by the quality preset
    pub fn debris_capacity(&self) -> usize {
        self.quality.debris_capacity()
    }

    /// Parse settings from JSON, falling back to defaults on error
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Self>(json) {
            Ok(mut settings) => {
                settings.settle = settings.settle.sanitized();
                settings
            }
            Err(e) => {
                log::warn!("Invalid settings JSON ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                log::info!("Loaded settings from {}", path.display());
                Self::from_json(&json)
            }
            Err(e) => {
                log::info!("No settings at {} ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
