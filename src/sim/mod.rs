//! Deterministic simulation module
//!
//! All physics lives here. This module must stay pure and deterministic:
//! - Fixed sub-steps only
//! - Seeded RNG only
//! - Stable iteration order (row-major grid, spawn-order debris)
//! - No rendering or platform dependencies

pub mod camera;
pub mod collision;
pub mod debris;
pub mod grid;
pub mod pool;
pub mod settle;
pub mod tick;
pub mod visuals;

pub use camera::Camera;
pub use collision::{PairResponse, elastic_response};
pub use debris::{DebrisSystem, FlyingBlock, ForceKind};
pub use grid::{
    Block, BlockKind, BlockShape, Cell, DestroyedSubCell, Field, Grid, SettleAnimation,
    SettleState, SubCell, SubCellPos, SubSlot,
};
pub use pool::{Transform, VisualHandle, VisualPool, VisualSlot};
pub use settle::{SettleStatus, SettleSystem, advance_sub_cell};
pub use tick::FieldSim;
pub use visuals::{AssetId, AssetTable, BombSpin, OrientationSource, VisualKey};
