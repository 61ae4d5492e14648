//! Settle animation: blocks dropping onto their resting row
//!
//! Each occupied sub-cell runs a small state machine:
//!
//! - `Inactive` → `Falling` as soon as the field shows it above its resting row
//! - `Falling` integrates constant gravity with a coarse fixed sub-step. When a
//!   step would cross the resting row the step is split at the crossing and
//!   the remainder goes to `Bouncing` (or the block snaps if the impact is soft)
//! - `Bouncing` runs a spring/damper below the resting row and plain gravity
//!   above it, with a fine sub-step. It ends when velocity turns from rising to
//!   sinking while at or below the resting row
//!
//! All integration is semi-implicit Euler: velocity first, then position.

use serde::{Deserialize, Serialize};

use super::grid::{Field, SettleState, SubCell, SubCellPos};
use crate::consts::{MIN_SUB_STEP, REST_EPSILON, SETTLE_SPEED};
use crate::settings::SettleConfig;

/// Aggregate status reported to the game loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettleStatus {
    /// Everything stopped recently; holding before reporting settled
    Waiting,
    /// At least one block is falling
    Active,
    /// Nothing falling, at least one block bouncing
    BlocksBouncing,
    /// Fully settled
    #[default]
    Inactive,
}

/// Drives the settle state machine of every occupied sub-cell
#[derive(Debug, Clone)]
pub struct SettleSystem {
    config: SettleConfig,
    status: SettleStatus,
    /// Time left in the quiescent window
    wait_remaining: f32,
    initialized: bool,
}

impl SettleSystem {
    pub fn new(config: SettleConfig) -> Self {
        Self {
            config: config.sanitized(),
            status: SettleStatus::Inactive,
            wait_remaining: 0.0,
            initialized: false,
        }
    }

    pub fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Status computed by the last `update`
    pub fn status(&self) -> SettleStatus {
        self.status
    }

    /// Prepare for a new level
    pub fn init<F: Field + ?Sized>(&mut self, field: &mut F) {
        self.initialized = true;
        self.reset(field);
        log::info!(
            "Settle system ready ({}x{} field)",
            field.columns(),
            field.rows()
        );
    }

    /// Force every sub-cell to rest, dropping any animation in flight
    pub fn reset<F: Field + ?Sized>(&mut self, field: &mut F) {
        for pos in SubCellPos::all(field.columns(), field.rows()) {
            let sub = field.sub_cell_mut(pos);
            if sub.settle.state != SettleState::Inactive || sub.height_above_rest() != 0.0 {
                sub.snap_to_rest();
            }
        }
        field.mark_changed();
        self.status = SettleStatus::Inactive;
        self.wait_remaining = 0.0;
    }

    /// Advance every occupied sub-cell by `dt` seconds
    pub fn update<F: Field + ?Sized>(&mut self, field: &mut F, dt: f32) -> SettleStatus {
        debug_assert!(self.initialized, "SettleSystem::update called before init");

        let mut any_falling = false;
        let mut any_bouncing = false;
        let mut advanced = 0usize;

        for pos in SubCellPos::all(field.columns(), field.rows()) {
            let sub = field.sub_cell_mut(pos);
            if sub.is_empty() {
                continue;
            }
            if advance_sub_cell(sub, dt, &self.config) {
                advanced += 1;
            }
            match sub.settle.state {
                SettleState::Falling => any_falling = true,
                SettleState::Bouncing => any_bouncing = true,
                SettleState::Inactive => {}
            }
        }

        if advanced > 0 {
            field.mark_changed();
        }

        let status = if any_falling {
            SettleStatus::Active
        } else if any_bouncing {
            SettleStatus::BlocksBouncing
        } else {
            self.quiescent_status(dt, advanced > 0)
        };

        if status != self.status {
            log::debug!("Settle status {:?} -> {:?}", self.status, status);
        }
        self.status = status;
        status
    }

    fn quiescent_status(&mut self, dt: f32, moved: bool) -> SettleStatus {
        if moved {
            self.wait_remaining = self.config.wait_duration;
            return SettleStatus::Waiting;
        }
        match self.status {
            SettleStatus::Active | SettleStatus::BlocksBouncing => {
                // Motion just stopped; the first quiet frame always waits
                self.wait_remaining = self.config.wait_duration;
                SettleStatus::Waiting
            }
            SettleStatus::Waiting => {
                self.wait_remaining -= dt;
                if self.wait_remaining > 0.0 {
                    SettleStatus::Waiting
                } else {
                    self.wait_remaining = 0.0;
                    SettleStatus::Inactive
                }
            }
            SettleStatus::Inactive => SettleStatus::Inactive,
        }
    }

    /// Send stale bounces back to `Falling`.
    ///
    /// A line clear can move a block that is still bouncing a full row or more
    /// above its new resting row. Left alone it would float there on gravity
    /// alone and then hit the spring far too fast.
    ///
    /// Height alone marks a stale bounce: a real bounce never leaves the
    /// spring by more than a small fraction of a row, whichever way the block
    /// is moving. Upward velocity is dropped so the block falls from where it
    /// is; downward velocity is kept.
    pub fn correct_wrongly_bouncing<F: Field + ?Sized>(&mut self, field: &mut F) -> usize {
        let mut corrected = 0;
        for pos in SubCellPos::all(field.columns(), field.rows()) {
            let sub = field.sub_cell_mut(pos);
            if sub.is_empty() || sub.settle.state != SettleState::Bouncing {
                continue;
            }
            if sub.height_above_rest() > self.config.wrong_bounce_height {
                sub.settle.state = SettleState::Falling;
                sub.settle.vertical_velocity = sub.settle.vertical_velocity.min(0.0);
                corrected += 1;
            }
        }
        if corrected > 0 {
            log::debug!("Moved {} stale bouncing blocks back to falling", corrected);
            field.mark_changed();
        }
        corrected
    }
}

/// Advance one sub-cell. Returns true if it moved or changed state.
pub fn advance_sub_cell(sub: &mut SubCell, dt: f32, config: &SettleConfig) -> bool {
    let rest = sub.resting_row as f32;

    if sub.settle.state == SettleState::Inactive {
        let height = sub.exact_position.y - rest;
        if height > REST_EPSILON {
            // The rest of this frame is dropped; the fall starts next update
            sub.settle.state = SettleState::Falling;
            sub.settle.vertical_velocity = 0.0;
            return true;
        }
        if height != 0.0 || sub.settle.vertical_velocity != 0.0 {
            sub.snap_to_rest();
            return true;
        }
        return false;
    }

    let mut remaining = dt;
    while remaining > 0.0 {
        match sub.settle.state {
            SettleState::Falling => remaining -= fall_step(sub, rest, remaining, config),
            SettleState::Bouncing => remaining -= bounce_step(sub, rest, remaining, config),
            // Time left after settling is dropped for this frame
            SettleState::Inactive => break,
        }
    }
    true
}

/// One falling sub-step. Returns the time consumed.
fn fall_step(sub: &mut SubCell, rest: f32, remaining: f32, config: &SettleConfig) -> f32 {
    let h = remaining.min(config.fall_step.max(MIN_SUB_STEP));
    let y = sub.exact_position.y;
    let v = sub.settle.vertical_velocity - config.gravity * h;
    let y_next = y + v * h;

    if y_next > rest {
        sub.settle.vertical_velocity = v;
        sub.exact_position.y = y_next;
        return h;
    }

    if !config.bounce || -v < config.min_bounce_speed {
        sub.snap_to_rest();
        return remaining;
    }

    // Split the step where the path meets the resting row
    let travel = y - y_next;
    let fraction = if travel > 0.0 {
        ((y - rest) / travel).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let h_cross = h * fraction;
    sub.settle.vertical_velocity -= config.gravity * h_cross;
    sub.exact_position.y = rest;
    sub.settle.state = SettleState::Bouncing;
    h_cross
}

/// One bouncing sub-step. Returns the time consumed.
fn bounce_step(sub: &mut SubCell, rest: f32, remaining: f32, config: &SettleConfig) -> f32 {
    let h = remaining.min(config.bounce_step.max(MIN_SUB_STEP));
    let y = sub.exact_position.y;
    let v = sub.settle.vertical_velocity;

    let accel = if y <= rest {
        let penetration = rest - y;
        config.spring_stiffness * penetration - config.spring_damping * v - config.gravity
    } else {
        -config.gravity
    };

    let v_next = v + accel * h;
    let y_next = y + v_next * h;
    sub.settle.vertical_velocity = v_next;
    sub.exact_position.y = y_next;

    // Overdamped springs creep toward rest without turning around
    let creeping = v_next.abs() < SETTLE_SPEED
        && rest - y_next <= 2.0 * config.gravity / config.spring_stiffness;
    if y_next <= rest && ((v >= 0.0 && v_next <= 0.0) || creeping) {
        sub.snap_to_rest();
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::grid::{Block, BlockKind, Grid, SubCellPos, SubSlot};
    use proptest::prelude::*;

    fn falling_sub(height: f32) -> SubCell {
        let mut sub = SubCell {
            block: Some(Block::new(BlockKind::Normal, 0)),
            resting_row: 3,
            ..Default::default()
        };
        sub.exact_position.y = 3.0 + height;
        sub.settle.state = SettleState::Falling;
        sub
    }

    /// Run until inactive, returning elapsed simulated time
    fn settle_time(sub: &mut SubCell, dt: f32, limit: f32) -> Option<f32> {
        let config = SettleConfig::default();
        let mut t = 0.0;
        while t < limit {
            advance_sub_cell(sub, dt, &config);
            t += dt;
            if sub.settle.state == SettleState::Inactive {
                return Some(t);
            }
        }
        None
    }

    #[test]
    fn test_drop_settles_exactly_on_rest() {
        let mut sub = falling_sub(5.0);
        let config = SettleConfig::default();
        let mut seen = Vec::new();
        for _ in 0..60 {
            advance_sub_cell(&mut sub, 0.1, &config);
            if seen.last() != Some(&sub.settle.state) {
                seen.push(sub.settle.state);
            }
        }
        assert_eq!(
            seen,
            vec![SettleState::Falling, SettleState::Bouncing, SettleState::Inactive]
        );
        assert_eq!(sub.exact_position.y, 3.0);
        assert_eq!(sub.settle.vertical_velocity, 0.0);
    }

    #[test]
    fn test_soft_landing_snaps_without_bounce() {
        let mut sub = falling_sub(0.001);
        let config = SettleConfig::default();
        advance_sub_cell(&mut sub, 0.1, &config);
        assert_eq!(sub.settle.state, SettleState::Inactive);
        assert_eq!(sub.exact_position.y, 3.0);
    }

    #[test]
    fn test_bounce_disabled_snaps() {
        let mut sub = falling_sub(4.0);
        let config = SettleConfig {
            bounce: false,
            ..Default::default()
        };
        for _ in 0..60 {
            advance_sub_cell(&mut sub, 1.0 / 60.0, &config);
            assert_ne!(sub.settle.state, SettleState::Bouncing);
        }
        assert_eq!(sub.settle.state, SettleState::Inactive);
    }

    #[test]
    fn test_inactive_above_rest_starts_falling() {
        let mut sub = falling_sub(2.0);
        sub.settle.state = SettleState::Inactive;
        let config = SettleConfig::default();
        assert!(advance_sub_cell(&mut sub, 0.01, &config));
        assert_eq!(sub.settle.state, SettleState::Falling);
        assert_eq!(sub.exact_position.y, 5.0);
        assert_eq!(sub.settle.vertical_velocity, 0.0);

        advance_sub_cell(&mut sub, 0.01, &config);
        assert!(sub.settle.vertical_velocity < 0.0);
    }

    #[test]
    fn test_short_shift_never_lands_in_the_same_frame() {
        // One row above rest with a long frame: falling alone would reach
        // the spring within the frame
        let mut sub = falling_sub(0.9);
        sub.settle.state = SettleState::Inactive;
        let start = sub.exact_position.y;
        let config = SettleConfig::default();
        advance_sub_cell(&mut sub, 0.22, &config);
        assert_eq!(sub.settle.state, SettleState::Falling);
        assert_eq!(sub.exact_position.y, start);

        advance_sub_cell(&mut sub, 0.22, &config);
        assert_eq!(sub.settle.state, SettleState::Bouncing);
    }

    #[test]
    fn test_non_positive_steps_still_finish() {
        let config = SettleConfig {
            fall_step: 0.0,
            bounce_step: -1.0,
            ..Default::default()
        };
        let mut sub = falling_sub(0.5);
        for _ in 0..40 {
            advance_sub_cell(&mut sub, 0.25, &config);
        }
        assert_eq!(sub.settle.state, SettleState::Inactive);
        assert_eq!(sub.exact_position.y, 3.0);
    }

    #[test]
    fn test_zero_bounce_step_from_json_returns() {
        let settings = crate::Settings::from_json(r#"{ "settle": { "bounce_step": 0 } }"#);
        assert!(settings.settle.bounce_step > 0.0);

        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(settings.settle);
        system.init(&mut grid);
        grid.drop_from(pos, Block::new(BlockKind::Normal, 1), 0.5);
        let mut status = SettleStatus::Active;
        for _ in 0..40 {
            status = system.update(&mut grid, 0.25);
        }
        assert_eq!(status, SettleStatus::Inactive);
    }

    #[test]
    fn test_inactive_at_rest_is_untouched() {
        let mut sub = falling_sub(0.0);
        sub.settle.state = SettleState::Inactive;
        assert!(!advance_sub_cell(&mut sub, 0.1, &SettleConfig::default()));
    }

    #[test]
    fn test_bounce_compresses_below_rest() {
        let mut sub = falling_sub(3.0);
        let config = SettleConfig::default();
        let mut lowest = f32::MAX;
        for _ in 0..600 {
            advance_sub_cell(&mut sub, 1.0 / 500.0, &config);
            lowest = lowest.min(sub.exact_position.y);
        }
        assert!(lowest < 3.0 - 0.05, "spring never compressed: {}", lowest);
        assert!(lowest > 2.0, "spring too soft: {}", lowest);
    }

    #[test]
    fn test_overdamped_spring_still_settles() {
        let mut sub = falling_sub(2.0);
        let config = SettleConfig {
            spring_damping: 400.0,
            ..Default::default()
        };
        let mut settled = false;
        for _ in 0..600 {
            advance_sub_cell(&mut sub, 1.0 / 60.0, &config);
            if sub.settle.state == SettleState::Inactive {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert_eq!(sub.exact_position.y, 3.0);
    }

    #[test]
    fn test_no_backward_transitions() {
        let mut sub = falling_sub(7.0);
        let config = SettleConfig::default();
        let mut prev = sub.settle.state;
        for _ in 0..200 {
            advance_sub_cell(&mut sub, 1.0 / 30.0, &config);
            let state = sub.settle.state;
            assert!(
                !(prev == SettleState::Bouncing && state == SettleState::Falling),
                "bouncing went back to falling"
            );
            prev = state;
        }
        assert_eq!(prev, SettleState::Inactive);
    }

    fn grid_with_drop(height: f32) -> (Grid, SubCellPos) {
        let mut grid = Grid::new(4, 8);
        let pos = SubCellPos::new(1, 2, SubSlot::First);
        grid.drop_from(pos, Block::new(BlockKind::Normal, 1), height);
        (grid, pos)
    }

    #[test]
    fn test_status_progression_with_wait_window() {
        let (mut grid, _) = grid_with_drop(5.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);
        // init snaps everything, so drop again
        grid.drop_from(SubCellPos::new(1, 2, SubSlot::First), Block::new(BlockKind::Normal, 1), 5.0);

        let mut statuses = Vec::new();
        for _ in 0..200 {
            let status = system.update(&mut grid, 1.0 / 60.0);
            if statuses.last() != Some(&status) {
                statuses.push(status);
            }
        }
        assert_eq!(
            statuses,
            vec![
                SettleStatus::Active,
                SettleStatus::BlocksBouncing,
                SettleStatus::Waiting,
                SettleStatus::Inactive
            ]
        );
    }

    #[test]
    fn test_waiting_holds_for_window() {
        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);
        grid.drop_from(pos, Block::new(BlockKind::Normal, 1), 0.0005);
        grid.sub_cell_mut(pos).settle.state = SettleState::Falling;

        assert_eq!(system.update(&mut grid, 0.01), SettleStatus::Waiting);
        assert_eq!(system.update(&mut grid, 0.1), SettleStatus::Waiting);
        assert_eq!(system.update(&mut grid, 0.1), SettleStatus::Inactive);
    }

    #[test]
    fn test_update_marks_field_changed() {
        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);
        grid.take_changed();

        system.update(&mut grid, 0.1);
        assert!(!grid.take_changed());

        grid.sub_cell_mut(pos).exact_position.y += 2.0;
        system.update(&mut grid, 0.1);
        assert!(grid.take_changed());
    }

    #[test]
    fn test_reset_snaps_everything() {
        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);
        grid.drop_from(pos, Block::new(BlockKind::Normal, 1), 4.0);
        system.update(&mut grid, 0.2);
        assert_eq!(system.status(), SettleStatus::Active);

        system.reset(&mut grid);
        let sub = grid.sub_cell(pos);
        assert_eq!(sub.settle.state, SettleState::Inactive);
        assert_eq!(sub.exact_position.y, 2.0);
        assert_eq!(system.status(), SettleStatus::Inactive);
    }

    #[test]
    fn test_wrongly_bouncing_goes_back_to_falling() {
        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);

        let sub = grid.sub_cell_mut(pos);
        sub.exact_position.y = 2.0 + 1.4;
        sub.settle.state = SettleState::Bouncing;
        sub.settle.vertical_velocity = 3.0;

        // A genuine small bounce is left alone
        let other = SubCellPos::new(2, 2, SubSlot::First);
        grid.place(other, Block::new(BlockKind::Normal, 2));
        let sub = grid.sub_cell_mut(other);
        sub.exact_position.y = 2.3;
        sub.settle.state = SettleState::Bouncing;

        assert_eq!(system.correct_wrongly_bouncing(&mut grid), 1);
        let sub = grid.sub_cell(pos);
        assert_eq!(sub.settle.state, SettleState::Falling);
        assert_eq!(sub.settle.vertical_velocity, 0.0);
        assert_eq!(grid.sub_cell(other).settle.state, SettleState::Bouncing);
    }

    #[test]
    fn test_stale_bounce_keeps_downward_velocity() {
        let (mut grid, pos) = grid_with_drop(0.0);
        let mut system = SettleSystem::new(SettleConfig::default());
        system.init(&mut grid);

        let sub = grid.sub_cell_mut(pos);
        sub.exact_position.y = 2.0 + 1.6;
        sub.settle.state = SettleState::Bouncing;
        sub.settle.vertical_velocity = -4.0;

        assert_eq!(system.correct_wrongly_bouncing(&mut grid), 1);
        let sub = grid.sub_cell(pos);
        assert_eq!(sub.settle.state, SettleState::Falling);
        assert_eq!(sub.settle.vertical_velocity, -4.0);
    }

    #[test]
    fn test_timestep_independence() {
        let mut fine = falling_sub(5.0);
        let mut coarse = falling_sub(5.0);
        let t_fine = settle_time(&mut fine, 1.0 / 60.0, 10.0).expect("fine never settled");
        let t_coarse = settle_time(&mut coarse, 0.1, 10.0).expect("coarse never settled");
        assert_eq!(fine.exact_position.y, coarse.exact_position.y);
        assert!(
            (t_fine - t_coarse).abs() <= 0.2,
            "settle times diverge: {} vs {}",
            t_fine,
            t_coarse
        );
    }

    proptest! {
        #[test]
        fn prop_drop_converges(height in 0.0f32..20.0, dt in 0.001f32..0.25) {
            let mut sub = falling_sub(height);
            let t = settle_time(&mut sub, dt, 30.0);
            prop_assert!(t.is_some(), "no settle for height {} dt {}", height, dt);
            prop_assert_eq!(sub.exact_position.y, 3.0);
            prop_assert_eq!(sub.settle.vertical_velocity, 0.0);
        }

        #[test]
        fn prop_never_inactive_to_bouncing(height in 0.01f32..10.0, dt in 0.005f32..0.25) {
            let mut sub = falling_sub(height);
            sub.settle.state = SettleState::Inactive;
            let config = SettleConfig::default();
            let mut prev = sub.settle.state;
            for _ in 0..400 {
                advance_sub_cell(&mut sub, dt, &config);
                let state = sub.settle.state;
                prop_assert!(!(prev == SettleState::Inactive && state == SettleState::Bouncing));
                prop_assert!(!(prev == SettleState::Bouncing && state == SettleState::Falling));
                prev = state;
            }
        }
    }
}
