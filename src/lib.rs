//! Blast Arena - A grid-based bomb arena game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bombs, explosions, players, match flow)
//! - `settings`: Data-driven game balance loaded from JSON

pub mod settings;
pub mod sim;

pub use settings::{Settings, SettingsError};

use glam::{IVec2, Vec2};

/// Game configuration constants
pub mod consts {
    /// Simulation rate (ticks per second)
    pub const SIM_HZ: u32 = 60;
    /// Fixed simulation timestep
    pub const SIM_DT: f32 = 1.0 / SIM_HZ as f32;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Half the side of a cell; probes for the leading edge of a moving body
    pub const HALF_CELL: f32 = 0.5;
    /// Hard cap on blast radius regardless of settings
    pub const BLAST_RADIUS_CAP: u32 = 32;
}

/// Round a world position to the cell whose center is nearest
#[inline]
pub fn round_to_cell(pos: Vec2) -> IVec2 {
    IVec2::new(pos.x.round() as i32, pos.y.round() as i32)
}

/// World-space center of a cell
#[inline]
pub fn cell_center(cell: IVec2) -> Vec2 {
    cell.as_vec2()
}

/// Convert a duration in seconds to whole simulation ticks.
///
/// Any positive duration lasts at least one tick.
#[inline]
pub fn secs_to_ticks(secs: f32) -> u32 {
    if secs <= 0.0 {
        return 0;
    }
    ((secs * consts::SIM_HZ as f32).round() as u32).max(1)
}
