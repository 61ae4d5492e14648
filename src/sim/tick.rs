//! Per-frame driver
//!
//! Owns both systems and advances them in order once per rendered frame:
//! bomb idle-spin, settle, then debris. Destruction events from the game
//! logic come in through the `on_*` calls.

use glam::IVec2;

use super::camera::Camera;
use super::debris::DebrisSystem;
use super::grid::{DestroyedSubCell, Field};
use super::settle::{SettleStatus, SettleSystem};
use super::visuals::{AssetTable, BombSpin};
use crate::consts::MAX_FRAME_DT;
use crate::settings::Settings;

/// Settle and debris simulation for one playfield
#[derive(Debug, Clone)]
pub struct FieldSim {
    pub settle: SettleSystem,
    pub debris: DebrisSystem,
    pub bomb_spin: BombSpin,
    pub camera: Camera,
    /// Simulated seconds since init
    pub time: f32,
}

impl FieldSim {
    pub fn new(settings: &Settings, assets: AssetTable) -> Self {
        Self {
            settle: SettleSystem::new(settings.settle.clone()),
            debris: DebrisSystem::new(settings.debris.clone(), settings.debris_capacity(), assets),
            bomb_spin: BombSpin::default(),
            camera: Camera::default(),
            time: 0.0,
        }
    }

    /// Start a level
    pub fn init<F: Field + ?Sized>(&mut self, field: &mut F, seed: u64) {
        self.settle.init(field);
        self.debris.init(seed, field.columns());
        self.bomb_spin.reset();
        self.camera = Camera::default();
        self.time = 0.0;
    }

    /// Restart the current level
    pub fn reset<F: Field + ?Sized>(&mut self, field: &mut F) {
        self.settle.reset(field);
        self.debris.reset();
        self.bomb_spin.reset();
        self.time = 0.0;
        log::info!("Field simulation reset");
    }

    /// Advance one frame
    pub fn tick<F: Field + ?Sized>(&mut self, field: &mut F, dt: f32) -> SettleStatus {
        if dt > MAX_FRAME_DT {
            log::debug!("Frame dt {:.3}s clamped to {:.3}s", dt, MAX_FRAME_DT);
        }
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            log::warn!("Non-finite frame dt {} ignored", dt);
            0.0
        };
        self.time += dt;

        self.bomb_spin.advance(dt);
        let status = self.settle.update(field, dt);
        self.debris.update(dt, &self.camera, self.bomb_spin.rotation());
        status
    }

    /// Lines were cleared and the field already shifted down
    pub fn on_line_clear<F: Field + ?Sized>(&mut self, field: &mut F, destroyed: &[DestroyedSubCell]) -> usize {
        let spawned = self.debris.add_from_line_clear(destroyed);
        self.settle.correct_wrongly_bouncing(field);
        spawned
    }

    /// A bomb went off at `detonation`
    pub fn on_explosion(
        &mut self,
        destroyed: &[DestroyedSubCell],
        detonation: IVec2,
        force_magnitude: f32,
        apply_to_airborne: bool,
    ) -> usize {
        self.debris
            .add_from_explosion(destroyed, detonation, force_magnitude, apply_to_airborne)
    }

    /// A row bomb in `bomb_column` cleared its row and the field shifted down
    pub fn on_row_explosion<F: Field + ?Sized>(
        &mut self,
        field: &mut F,
        destroyed: &[DestroyedSubCell],
        bomb_column: usize,
    ) -> usize {
        let spawned = self.debris.add_from_row_explosion(destroyed, bomb_column);
        self.settle.correct_wrongly_bouncing(field);
        spawned
    }

    /// The shield knocked blocks off the field
    pub fn on_shield<F: Field + ?Sized>(&mut self, field: &F, destroyed: &[DestroyedSubCell]) -> usize {
        self.debris.add_from_shield(destroyed, field.columns())
    }
}
