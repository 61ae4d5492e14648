//! Camera/scroll state read by the simulation

use serde::{Deserialize, Serialize};

/// What the debris system needs to know about the view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Vertical position of the view center (rows)
    pub y: f32,
    /// Half the visible height (rows)
    pub half_height: f32,
    /// Debris depth is clamped to stay behind this plane
    pub near_z: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            y: 0.0,
            half_height: 10.0,
            near_z: 8.0,
        }
    }
}

impl Camera {
    /// Scroll the view by `rows`
    pub fn scroll(&mut self, rows: f32) {
        self.y += rows;
    }

    /// Lowest field row on screen
    pub fn lowest_visible_row(&self) -> i32 {
        (self.y - self.half_height).floor().max(0.0) as i32
    }
}
