//! Flying debris: destroyed blocks tumbling off the field
//!
//! Each destroyed sub-cell becomes a point mass with spin, drawn with a pooled
//! visual. Debris fall under a per-force-kind gravity, bounce off each other
//! with an equal-mass elastic response, and are released once they drop far
//! enough below the camera.

use glam::{IVec2, Quat, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::camera::Camera;
use super::collision::elastic_response;
use super::grid::DestroyedSubCell;
use super::pool::{Transform, VisualHandle, VisualPool};
use super::visuals::{AssetTable, OrientationSource, VisualKey};
use crate::consts::EXPLOSION_TIE_BREAK;
use crate::quarter_turns;
use crate::settings::DebrisConfig;

/// What launched a debris piece; selects its gravity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceKind {
    ClearedLine,
    RowExplosion,
    Explosion,
}

/// A destroyed block in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlyingBlock {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: ForceKind,
    pub orientation: OrientationSource,
    pub key: VisualKey,
    pub visual: VisualHandle,
}

impl FlyingBlock {
    pub fn transform(&self) -> Transform {
        Transform {
            translation: self.position,
            rotation: self.rotation,
            scale: Vec3::ONE,
        }
    }
}

/// Owns the debris pool and simulates every live piece
#[derive(Debug, Clone)]
pub struct DebrisSystem {
    config: DebrisConfig,
    assets: AssetTable,
    pool: VisualPool,
    /// Spawn order
    live: Vec<FlyingBlock>,
    rng: Pcg32,
    field_columns: usize,
    initialized: bool,
}

impl DebrisSystem {
    pub fn new(config: DebrisConfig, capacity: usize, assets: AssetTable) -> Self {
        Self {
            config,
            assets,
            pool: VisualPool::new(capacity),
            live: Vec::with_capacity(capacity),
            rng: Pcg32::seed_from_u64(0),
            field_columns: 0,
            initialized: false,
        }
    }

    /// Seed the RNG and clear any debris from a previous level
    pub fn init(&mut self, seed: u64, field_columns: usize) {
        self.rng = Pcg32::seed_from_u64(seed);
        self.field_columns = field_columns;
        self.initialized = true;
        self.reset();
        log::info!(
            "Debris system ready (seed {}, {} columns, pool {})",
            seed,
            field_columns,
            self.pool.capacity()
        );
    }

    /// Drop every live piece and give all visuals back
    pub fn reset(&mut self) {
        self.live.clear();
        self.pool.reclaim_all();
    }

    pub fn config(&self) -> &DebrisConfig {
        &self.config
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlyingBlock> {
        self.live.iter()
    }

    pub fn pool(&self) -> &VisualPool {
        &self.pool
    }

    /// Debris from cleared lines: thrown outward from the field center, up,
    /// and toward the camera with a random tumble
    pub fn add_from_line_clear(&mut self, cells: &[DestroyedSubCell]) -> usize {
        let budget = self.spawn_budget(cells.len(), "line clear");
        let center_x = self.field_columns as f32 / 2.0;
        let mut spawned = 0;

        for cell in &cells[..budget] {
            let center = cell.center();
            let spread: f32 = self.rng.random_range(0.5..1.0);
            let jitter: f32 = self.rng.random_range(-0.5..0.5);
            let outward = (center.x - center_x) * self.config.line_spread * spread + jitter;
            let velocity = Vec3::new(
                outward,
                random_in(&mut self.rng, self.config.line_lift),
                random_in(&mut self.rng, self.config.forward_speed),
            );
            let spin = self.random_spin(self.config.spin);
            if self.spawn(cell, velocity, spin, ForceKind::ClearedLine) {
                spawned += 1;
            }
        }
        spawned
    }

    /// Debris from a point explosion at grid cell `detonation`.
    ///
    /// Launch speed falls off with the squared distance from the detonation.
    /// With `apply_to_airborne`, debris already in flight nearby get a weaker
    /// push by the same law.
    pub fn add_from_explosion(
        &mut self,
        cells: &[DestroyedSubCell],
        detonation: IVec2,
        force_magnitude: f32,
        apply_to_airborne: bool,
    ) -> usize {
        let origin = detonation.as_vec2() + Vec2::splat(0.5);

        if apply_to_airborne {
            self.push_airborne(origin, force_magnitude);
        }

        let budget = self.spawn_budget(cells.len(), "explosion");
        let mut spawned = 0;
        for cell in &cells[..budget] {
            let offset = self.tie_broken_offset(cell.center() - origin);
            let strength = force_magnitude / offset.length_squared().max(self.config.explosion_min_dist_sq);
            let jitter: f32 = self.rng.random_range(0.8..1.2);
            let radial = offset.normalize() * strength * jitter;
            let velocity = radial.extend(random_in(&mut self.rng, self.config.forward_speed) * 0.5);
            let spin = self.random_spin(strength);
            if self.spawn(cell, velocity, spin, ForceKind::Explosion) {
                spawned += 1;
            }
        }
        spawned
    }

    /// Debris from a row bomb in `bomb_column`: thrown sideways away from it
    pub fn add_from_row_explosion(&mut self, cells: &[DestroyedSubCell], bomb_column: usize) -> usize {
        let budget = self.spawn_budget(cells.len(), "row explosion");
        let bomb_x = bomb_column as f32 + 0.5;
        let mut spawned = 0;

        for cell in &cells[..budget] {
            let dx = cell.center().x - bomb_x;
            let side = if dx.abs() < EXPLOSION_TIE_BREAK {
                self.random_sign()
            } else {
                dx.signum()
            };
            let jitter: f32 = self.rng.random_range(0.7..1.3);
            let velocity = Vec3::new(
                side * self.config.row_explosion_force * jitter,
                random_in(&mut self.rng, self.config.line_lift) * 0.5,
                random_in(&mut self.rng, self.config.forward_speed),
            );
            let spin = self.random_spin(self.config.spin);
            if self.spawn(cell, velocity, spin, ForceKind::RowExplosion) {
                spawned += 1;
            }
        }
        spawned
    }

    /// Debris knocked off by the shield: left half flies left, right half right
    pub fn add_from_shield(&mut self, cells: &[DestroyedSubCell], num_field_columns: usize) -> usize {
        let budget = self.spawn_budget(cells.len(), "shield");
        let middle = num_field_columns as f32 / 2.0;
        let mut spawned = 0;

        for cell in &cells[..budget] {
            let side = if cell.center().x < middle { -1.0 } else { 1.0 };
            let jitter: f32 = self.rng.random_range(0.8..1.2);
            let velocity = Vec3::new(
                side * self.config.shield_force * jitter,
                random_in(&mut self.rng, self.config.line_lift),
                random_in(&mut self.rng, self.config.forward_speed),
            );
            let spin = self.random_spin(self.config.spin);
            if self.spawn(cell, velocity, spin, ForceKind::ClearedLine) {
                spawned += 1;
            }
        }
        spawned
    }

    /// Integrate, cull and collide every live piece, then publish transforms
    pub fn update(&mut self, dt: f32, camera: &Camera, bomb_rotation: Quat) {
        debug_assert!(self.initialized, "DebrisSystem::update called before init");

        let config = &self.config;
        let pool = &mut self.pool;
        let cull_below = camera.y - config.cull_distance;

        self.live.retain_mut(|block| {
            let gravity = match block.force {
                ForceKind::ClearedLine | ForceKind::RowExplosion => config.line_gravity,
                ForceKind::Explosion => config.explosion_gravity,
            };
            block.linear_velocity.y += gravity * dt;
            block.position += block.linear_velocity * dt;
            block.rotation = match block.orientation {
                OrientationSource::Integrated => {
                    (Quat::from_scaled_axis(block.angular_velocity * dt) * block.rotation).normalize()
                }
                OrientationSource::Fixed(rotation) => rotation,
                OrientationSource::BombSpin => bomb_rotation,
            };
            block.position.z = block.position.z.min(camera.near_z);

            if block.position.y < cull_below {
                pool.release(block.visual);
                return false;
            }
            true
        });

        self.resolve_collisions();

        for block in &self.live {
            self.pool.set_transform(block.visual, block.transform());
        }
    }

    /// Single pass of pairwise elastic responses over all live debris
    fn resolve_collisions(&mut self) {
        let block_size = self.config.block_size;
        let mut resolved = 0;

        for j in 1..self.live.len() {
            let (head, tail) = self.live.split_at_mut(j);
            let b = &mut tail[0];
            for a in head.iter_mut() {
                if let Some(response) =
                    elastic_response(a.position, a.linear_velocity, b.position, b.linear_velocity, block_size)
                {
                    a.linear_velocity += response.delta_a;
                    b.linear_velocity += response.delta_b;
                    resolved += 1;
                }
            }
        }

        if resolved > 0 {
            log::trace!("Resolved {} debris collisions", resolved);
        }
    }

    fn push_airborne(&mut self, origin: Vec2, force_magnitude: f32) {
        let radius_sq = self.config.airborne_radius * self.config.airborne_radius;
        let min_dist_sq = self.config.explosion_min_dist_sq;
        let factor = self.config.airborne_factor;

        for i in 0..self.live.len() {
            let raw = self.live[i].position.truncate() - origin;
            if raw.length_squared() > radius_sq {
                continue;
            }
            let offset = self.tie_broken_offset(raw);
            let strength = factor * force_magnitude / offset.length_squared().max(min_dist_sq);
            self.live[i].linear_velocity += (offset.normalize() * strength).extend(0.0);
        }
    }

    /// Nudge offsets that line up with the detonation row or column so the
    /// direction is never degenerate
    fn tie_broken_offset(&mut self, mut offset: Vec2) -> Vec2 {
        if offset.x.abs() < EXPLOSION_TIE_BREAK * 0.5 {
            offset.x = self.random_sign() * EXPLOSION_TIE_BREAK;
        }
        if offset.y.abs() < EXPLOSION_TIE_BREAK * 0.5 {
            offset.y = self.random_sign() * EXPLOSION_TIE_BREAK;
        }
        offset
    }

    fn random_sign(&mut self) -> f32 {
        if self.rng.random_bool(0.5) { 1.0 } else { -1.0 }
    }

    fn random_spin(&mut self, magnitude: f32) -> Vec3 {
        Vec3::new(
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
        ) * magnitude
    }

    /// How many of `requested` spawns fit in the pool
    fn spawn_budget(&self, requested: usize, source: &str) -> usize {
        let available = self.pool.available();
        if requested > available {
            log::warn!(
                "Debris pool exhausted on {}: dropping {} of {} pieces",
                source,
                requested - available,
                requested
            );
        }
        requested.min(available)
    }

    fn spawn(&mut self, cell: &DestroyedSubCell, velocity: Vec3, spin: Vec3, force: ForceKind) -> bool {
        let key = VisualKey::for_block(&cell.block);
        let Some(visual) = self.pool.acquire(self.assets.resolve(key)) else {
            return false;
        };

        let orientation = key.orientation_source();
        let rotation = match orientation {
            OrientationSource::Fixed(rotation) => rotation,
            _ => quarter_turns(cell.block.rotation),
        };
        let block = FlyingBlock {
            position: cell.center().extend(0.0),
            rotation,
            linear_velocity: velocity,
            angular_velocity: spin,
            force,
            orientation,
            key,
            visual,
        };
        self.pool.set_transform(visual, block.transform());
        self.live.push(block);
        true
    }
}

/// Uniform sample from `(lo, hi)`, tolerating an empty range
fn random_in(rng: &mut Pcg32, (lo, hi): (f32, f32)) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}
