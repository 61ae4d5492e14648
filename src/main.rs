//! Rowfall headless demo
//!
//! Builds a small field, drops a piece, clears a line, sets off a bomb and
//! runs the simulation at 60 Hz, logging what the systems report.
//!
//! Usage: `rowfall-demo [settings.json]` (set RUST_LOG=debug for more detail)

use std::path::Path;

use glam::IVec2;

use rowfall::Settings;
use rowfall::sim::{
    AssetId, AssetTable, Block, BlockKind, BlockShape, FieldSim, Grid, SettleStatus, SubCellPos,
    SubSlot, VisualKey,
};

const COLUMNS: usize = 10;
const ROWS: usize = 20;
const FRAME_DT: f32 = 1.0 / 60.0;

fn main() {
    init_logging();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_from(Path::new(&path)),
        None => Settings::default(),
    };
    log::info!("Rowfall demo starting (quality {})", settings.quality.as_str());

    let mut grid = Grid::new(COLUMNS, ROWS);
    let mut sim = FieldSim::new(&settings, demo_assets());
    sim.init(&mut grid, 0x5eed);

    // Two full rows with a gap, a few loose blocks on top
    for row in 0..2 {
        for column in 0..COLUMNS {
            if row == 1 && column == 7 {
                continue;
            }
            let kind = if column == 4 && row == 0 { BlockKind::Bomb } else { BlockKind::Normal };
            grid.place(at(column, row), Block::new(kind, (column % 6) as u8));
        }
    }
    grid.place(at(2, 2), Block::new(BlockKind::Gray, 0));
    grid.place(at(3, 2), Block::half(BlockKind::Normal, 3, 1));

    // Piece dropped into the gap
    grid.drop_from(at(7, 1), Block::new(BlockKind::Normal, 2), 6.0);
    run_until_settled(&mut sim, &mut grid, "drop");

    let destroyed = grid.clear_row(1);
    let spawned = sim.on_line_clear(&mut grid, &destroyed);
    log::info!("Cleared row 1: {} debris", spawned);
    run_until_settled(&mut sim, &mut grid, "line clear");

    let blast: Vec<SubCellPos> = (3..=5).map(|c| at(c, 0)).collect();
    let destroyed = grid.destroy(&blast);
    let spawned = sim.on_explosion(&destroyed, IVec2::new(4, 0), 10.0, true);
    log::info!("Bomb at (4, 0): {} debris", spawned);

    let mut frames = 0;
    while sim.debris.live_count() > 0 && frames < 600 {
        sim.camera.scroll(2.0 * FRAME_DT);
        sim.tick(&mut grid, FRAME_DT);
        frames += 1;
    }
    log::info!(
        "Debris cleared after {} frames ({} still live)",
        frames,
        sim.debris.live_count()
    );
}

fn at(column: usize, row: usize) -> SubCellPos {
    SubCellPos::new(column, row, SubSlot::First)
}

fn run_until_settled(sim: &mut FieldSim, grid: &mut Grid, label: &str) {
    let mut last = None;
    for frame in 0..600 {
        let status = sim.tick(grid, FRAME_DT);
        if last != Some(status) {
            log::info!(
                "[{}] frame {}: {:?}, {} debris live",
                label,
                frame,
                status,
                sim.debris.live_count()
            );
            last = Some(status);
        }
        if status == SettleStatus::Inactive && frame > 0 {
            return;
        }
    }
    log::warn!("[{}] did not settle within 10 seconds", label);
}

/// Stand-in for the render layer's asset registration
fn demo_assets() -> AssetTable {
    let mut assets = AssetTable::new();
    let mut next = 0;
    let mut add = |key: VisualKey| {
        assets.register(key, AssetId(next));
        next += 1;
    };
    for color in 0..6u8 {
        for shape in [BlockShape::Full, BlockShape::Half] {
            add(VisualKey::Colored { color, shape, lit: false });
            add(VisualKey::Colored { color, shape, lit: true });
        }
    }
    for shape in [BlockShape::Full, BlockShape::Half] {
        add(VisualKey::Gray { shape });
    }
    add(VisualKey::AsteroidFragment);
    add(VisualKey::Bomb);
    add(VisualKey::RowBomb);
    assets
}

#[cfg(not(target_arch = "wasm32"))]
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(target_arch = "wasm32")]
fn init_logging() {}
