//! Visual selection for debris
//!
//! Debris reuse the in-field block assets. The set of looks is closed, so it
//! is an enum key into a table the render layer fills in at load time.

use std::collections::HashMap;

use glam::Quat;
use serde::{Deserialize, Serialize};

use super::grid::{Block, BlockKind, BlockShape};
use crate::normalize_angle;

/// Opaque id of a render asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

/// Which asset a block is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualKey {
    Colored { color: u8, shape: BlockShape, lit: bool },
    Gray { shape: BlockShape },
    AsteroidFragment,
    Bomb,
    RowBomb,
}

impl VisualKey {
    /// Brightness at or above this uses the lit variant
    pub const LIT_THRESHOLD: f32 = 0.5;

    pub fn for_block(block: &Block) -> Self {
        match block.kind {
            BlockKind::Normal => VisualKey::Colored {
                color: block.color,
                shape: block.shape,
                lit: block.brightness >= Self::LIT_THRESHOLD,
            },
            BlockKind::Gray => VisualKey::Gray { shape: block.shape },
            BlockKind::AsteroidFragment => VisualKey::AsteroidFragment,
            BlockKind::Bomb => VisualKey::Bomb,
            BlockKind::RowBomb => VisualKey::RowBomb,
        }
    }

    /// Where a debris piece with this look gets its orientation
    pub fn orientation_source(&self) -> OrientationSource {
        match self {
            VisualKey::Bomb => OrientationSource::Fixed(BOMB_ORIENTATION),
            VisualKey::RowBomb => OrientationSource::BombSpin,
            _ => OrientationSource::Integrated,
        }
    }
}

/// Resting orientation of bomb props
pub const BOMB_ORIENTATION: Quat = Quat::IDENTITY;

/// How a debris piece's rotation is produced each frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrientationSource {
    /// Integrate its own angular velocity
    Integrated,
    /// Hold a constant orientation
    Fixed(Quat),
    /// Copy the shared bomb idle-spin
    BombSpin,
}

/// Asset lookup supplied by the render layer
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    assets: HashMap<VisualKey, AssetId>,
}

impl AssetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: VisualKey, asset: AssetId) {
        self.assets.insert(key, asset);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Asset for a key. Missing lit variants fall back to the dim one.
    pub fn resolve(&self, key: VisualKey) -> Option<AssetId> {
        if let Some(&asset) = self.assets.get(&key) {
            return Some(asset);
        }
        match key {
            VisualKey::Colored { color, shape, lit: true } => self
                .assets
                .get(&VisualKey::Colored { color, shape, lit: false })
                .copied(),
            _ => None,
        }
    }
}

/// Idle spin shared by every bomb prop on screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BombSpin {
    /// Current angle about the vertical axis (radians)
    pub angle: f32,
    /// Radians per second
    pub speed: f32,
    /// Fixed lean toward the camera (radians)
    pub tilt: f32,
}

impl Default for BombSpin {
    fn default() -> Self {
        Self {
            angle: 0.0,
            speed: 1.5,
            tilt: 0.3,
        }
    }
}

impl BombSpin {
    pub fn advance(&mut self, dt: f32) {
        self.angle = normalize_angle(self.angle + self.speed * dt);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_x(self.tilt) * Quat::from_rotation_y(self.angle)
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
    }
}
