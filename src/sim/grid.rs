//! Playfield cells as seen by the simulation
//!
//! The playfield itself belongs to the game logic. The settle system only
//! writes `exact_position` and `settle` on occupied sub-cells, through the
//! `Field` trait. `Grid` is a plain in-memory field used by the demo and tests.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::rotate_quarter;

/// Block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    Normal,
    /// Fixed by the level layout, drawn gray
    Gray,
    AsteroidFragment,
    Bomb,
    RowBomb,
}

/// Square block or diagonal half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockShape {
    #[default]
    Full,
    /// Right triangle; its right angle sits in the lower-left corner before rotation
    Half,
}

/// What occupies a sub-cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub shape: BlockShape,
    /// Palette index
    pub color: u8,
    /// Quarter turns counter-clockwise
    pub rotation: u8,
    /// 0 = dim, 1 = lit
    pub brightness: f32,
}

impl Block {
    pub fn new(kind: BlockKind, color: u8) -> Self {
        Self {
            kind,
            shape: BlockShape::Full,
            color,
            rotation: 0,
            brightness: 1.0,
        }
    }

    pub fn half(kind: BlockKind, color: u8, rotation: u8) -> Self {
        Self {
            shape: BlockShape::Half,
            rotation: rotation % 4,
            ..Self::new(kind, color)
        }
    }

    /// Offset of the visual center from the cell's lower-left corner
    pub fn center_offset(&self) -> Vec2 {
        match self.shape {
            BlockShape::Full => Vec2::splat(0.5),
            BlockShape::Half => {
                // Triangle centroid sits a third of the way in from the right-angle corner
                let local = Vec2::splat(-1.0 / 6.0);
                Vec2::splat(0.5) + rotate_quarter(local, self.rotation)
            }
        }
    }
}

/// Settle state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettleState {
    #[default]
    Inactive,
    Falling,
    Bouncing,
}

/// Per-sub-cell animation state owned by the settle system
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SettleAnimation {
    pub state: SettleState,
    /// Rows per second, positive up
    pub vertical_velocity: f32,
}

/// One occupiable slot of a cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubCell {
    pub block: Option<Block>,
    /// Animated position of the cell's lower-left corner (x = column, y = row)
    pub exact_position: Vec2,
    /// Row this sub-cell rests on once settled
    pub resting_row: i32,
    pub settle: SettleAnimation,
}

impl SubCell {
    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Height above the resting row (negative when compressed below it)
    pub fn height_above_rest(&self) -> f32 {
        self.exact_position.y - self.resting_row as f32
    }

    /// Snap to the resting row and clear motion
    pub fn snap_to_rest(&mut self) {
        self.exact_position.y = self.resting_row as f32;
        self.settle = SettleAnimation::default();
    }
}

/// Which of the two sub-cells in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubSlot {
    First = 0,
    Second = 1,
}

impl SubSlot {
    pub const ALL: [SubSlot; 2] = [SubSlot::First, SubSlot::Second];
}

/// Grid address of a sub-cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubCellPos {
    pub column: usize,
    pub row: usize,
    pub slot: SubSlot,
}

impl SubCellPos {
    pub fn new(column: usize, row: usize, slot: SubSlot) -> Self {
        Self { column, row, slot }
    }

    /// Row-major addresses of every sub-cell in a `columns` x `rows` field
    pub fn all(columns: usize, rows: usize) -> impl Iterator<Item = SubCellPos> {
        (0..rows).flat_map(move |row| {
            (0..columns).flat_map(move |column| {
                SubSlot::ALL
                    .into_iter()
                    .map(move |slot| SubCellPos::new(column, row, slot))
            })
        })
    }
}

/// Last on-field appearance of a destroyed sub-cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestroyedSubCell {
    pub pos: SubCellPos,
    pub block: Block,
    pub exact_position: Vec2,
}

impl DestroyedSubCell {
    /// World-space center of the block in the field plane
    pub fn center(&self) -> Vec2 {
        self.exact_position + self.block.center_offset()
    }
}

/// Playfield access needed by the simulation
///
/// Out-of-range addresses are caller bugs.
pub trait Field {
    fn columns(&self) -> usize;
    fn rows(&self) -> usize;
    fn sub_cell(&self, pos: SubCellPos) -> &SubCell;
    fn sub_cell_mut(&mut self, pos: SubCellPos) -> &mut SubCell;
    /// Tell the render layer visuals must be re-derived
    fn mark_changed(&mut self);
}

/// A cell with up to two occupied sub-cells
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub sub: [SubCell; 2],
}

/// In-memory playfield
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    columns: usize,
    rows: usize,
    /// Row-major, row 0 at the bottom
    cells: Vec<Cell>,
    changed: bool,
}

impl Grid {
    pub fn new(columns: usize, rows: usize) -> Self {
        let mut grid = Self {
            columns,
            rows,
            cells: vec![Cell::default(); columns * rows],
            changed: false,
        };
        for row in 0..rows {
            for column in 0..columns {
                for slot in SubSlot::ALL {
                    let sub = grid.sub_cell_mut(SubCellPos::new(column, row, slot));
                    sub.resting_row = row as i32;
                    sub.exact_position = Vec2::new(column as f32, row as f32);
                }
            }
        }
        grid
    }

    fn index(&self, column: usize, row: usize) -> usize {
        debug_assert!(
            column < self.columns && row < self.rows,
            "cell ({}, {}) outside {}x{} field",
            column,
            row,
            self.columns,
            self.rows
        );
        row * self.columns + column
    }

    /// Place a block already at rest
    pub fn place(&mut self, pos: SubCellPos, block: Block) {
        self.drop_from(pos, block, 0.0);
    }

    /// Place a block that visually starts `height` rows above its cell
    pub fn drop_from(&mut self, pos: SubCellPos, block: Block, height: f32) {
        let sub = self.sub_cell_mut(pos);
        sub.block = Some(block);
        sub.resting_row = pos.row as i32;
        sub.exact_position = Vec2::new(pos.column as f32, pos.row as f32 + height.max(0.0));
        sub.settle = SettleAnimation::default();
        self.changed = true;
    }

    /// Remove every block in `row` and shift the rows above down by one.
    ///
    /// Shifted blocks keep their visual height, so they end up one row above
    /// their new resting row and start falling on the next settle update.
    pub fn clear_row(&mut self, row: usize) -> Vec<DestroyedSubCell> {
        let mut destroyed = Vec::new();
        for column in 0..self.columns {
            for slot in SubSlot::ALL {
                let pos = SubCellPos::new(column, row, slot);
                let sub = self.sub_cell(pos);
                if let Some(block) = sub.block {
                    destroyed.push(DestroyedSubCell {
                        pos,
                        block,
                        exact_position: sub.exact_position,
                    });
                }
            }
        }

        for r in row..self.rows {
            for column in 0..self.columns {
                let above = if r + 1 < self.rows {
                    let idx = self.index(column, r + 1);
                    std::mem::take(&mut self.cells[idx])
                } else {
                    Cell::default()
                };
                let idx = self.index(column, r);
                self.cells[idx] = above;
                for sub in self.cells[idx].sub.iter_mut() {
                    sub.resting_row = r as i32;
                    if sub.block.is_none() {
                        sub.exact_position = Vec2::new(column as f32, r as f32);
                        sub.settle = SettleAnimation::default();
                    }
                }
            }
        }

        self.changed = true;
        destroyed
    }

    /// Remove every block in the given sub-cells, returning their snapshots
    pub fn destroy(&mut self, positions: &[SubCellPos]) -> Vec<DestroyedSubCell> {
        let mut destroyed = Vec::with_capacity(positions.len());
        for &pos in positions {
            let sub = self.sub_cell_mut(pos);
            if let Some(block) = sub.block.take() {
                destroyed.push(DestroyedSubCell {
                    pos,
                    block,
                    exact_position: sub.exact_position,
                });
                sub.snap_to_rest();
            }
        }
        self.changed = true;
        destroyed
    }

    /// Read and clear the changed flag
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Occupied sub-cell addresses, row-major
    pub fn occupied(&self) -> impl Iterator<Item = SubCellPos> + '_ {
        SubCellPos::all(self.columns, self.rows)
            .filter(|&pos| !self.sub_cell(pos).is_empty())
    }
}

impl Field for Grid {
    fn columns(&self) -> usize {
        self.columns
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn sub_cell(&self, pos: SubCellPos) -> &SubCell {
        &self.cells[self.index(pos.column, pos.row)].sub[pos.slot as usize]
    }

    fn sub_cell_mut(&mut self, pos: SubCellPos) -> &mut SubCell {
        let idx = self.index(pos.column, pos.row);
        &mut self.cells[idx].sub[pos.slot as usize]
    }

    fn mark_changed(&mut self) {
        self.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(column: usize, row: usize) -> SubCellPos {
        SubCellPos::new(column, row, SubSlot::First)
    }

    #[test]
    fn test_drop_from_sets_height() {
        let mut grid = Grid::new(4, 6);
        grid.drop_from(at(1, 2), Block::new(BlockKind::Normal, 3), 2.5);
        let sub = grid.sub_cell(at(1, 2));
        assert_eq!(sub.resting_row, 2);
        assert!((sub.height_above_rest() - 2.5).abs() < 1e-6);
        assert!(grid.take_changed());
        assert!(!grid.take_changed());
    }

    #[test]
    fn test_clear_row_shifts_blocks_down() {
        let mut grid = Grid::new(3, 4);
        grid.place(at(0, 0), Block::new(BlockKind::Normal, 1));
        grid.place(at(1, 0), Block::new(BlockKind::Gray, 0));
        grid.place(at(2, 1), Block::new(BlockKind::Normal, 2));

        let destroyed = grid.clear_row(0);
        assert_eq!(destroyed.len(), 2);
        assert_eq!(destroyed[1].block.kind, BlockKind::Gray);

        // Block from row 1 now rests on row 0 but is still drawn at row 1
        let sub = grid.sub_cell(at(2, 0));
        assert_eq!(sub.block.map(|b| b.color), Some(2));
        assert_eq!(sub.resting_row, 0);
        assert!((sub.height_above_rest() - 1.0).abs() < 1e-6);
        assert!(grid.sub_cell(at(2, 1)).is_empty());
        assert_eq!(grid.sub_cell(at(2, 1)).resting_row, 1);
    }

    #[test]
    fn test_destroy_returns_snapshots() {
        let mut grid = Grid::new(3, 3);
        grid.place(at(1, 1), Block::new(BlockKind::Bomb, 0));
        let destroyed = grid.destroy(&[at(1, 1), at(0, 0)]);
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].center(), Vec2::new(1.5, 1.5));
        assert_eq!(grid.occupied().count(), 0);
    }

    #[test]
    fn test_half_block_centroid_follows_rotation() {
        let lower_left = Block::half(BlockKind::Normal, 0, 0).center_offset();
        assert!((lower_left - Vec2::splat(1.0 / 3.0)).length() < 1e-5);
        let upper_right = Block::half(BlockKind::Normal, 0, 2).center_offset();
        assert!((upper_right - Vec2::splat(2.0 / 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_all_positions_row_major() {
        let all: Vec<SubCellPos> = SubCellPos::all(3, 2).collect();
        assert_eq!(all.len(), 12);
        assert_eq!(all[0], SubCellPos::new(0, 0, SubSlot::First));
        assert_eq!(all[1], SubCellPos::new(0, 0, SubSlot::Second));
        assert_eq!(all[2], SubCellPos::new(1, 0, SubSlot::First));
        assert_eq!(all[11], SubCellPos::new(2, 1, SubSlot::Second));
        assert_eq!(SubCellPos::all(0, 5).count(), 0);
    }
}
