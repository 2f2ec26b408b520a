//! Bomb entities: placement state, kick/punch motion and edge wrap

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{Arena, Cell, Direction};
use super::player::PlayerId;
use super::scheduler::TaskId;
use crate::consts::HALF_CELL;
use crate::{cell_center, round_to_cell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BombId(pub u32);

/// Lifecycle of a bomb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BombState {
    /// Sitting still, fuse burning
    Armed,
    /// Sliding after a kick or punch
    Moving,
    /// Caught in a blast (or fuse expired), about to go off
    Detonating,
    /// Exploded; removed from the registry
    Consumed,
}

/// A placed bomb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub id: BombId,
    pub owner: PlayerId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: u32,
    /// Kick guard (cleared when the bomb stops)
    pub kicked: bool,
    /// Punch guard (cleared when the bomb stops)
    pub punched: bool,
    pub state: BombState,
    /// Pending fuse task, if the fuse is still burning
    pub fuse_task: Option<TaskId>,
}

impl Bomb {
    pub fn new(id: BombId, owner: PlayerId, cell: Cell, radius: u32) -> Self {
        Self {
            id,
            owner,
            pos: cell_center(cell),
            vel: Vec2::ZERO,
            radius,
            kicked: false,
            punched: false,
            state: BombState::Armed,
            fuse_task: None,
        }
    }

    /// Cell nearest to the bomb's position (may be one step off the grid
    /// right at a wrap seam)
    pub fn cell(&self) -> Cell {
        round_to_cell(self.pos)
    }

    /// Cell the bomb occupies, wrapped onto the grid
    pub fn cell_in(&self, arena: &Arena) -> Cell {
        arena.wrap_cell(self.cell())
    }

    pub fn is_moving(&self) -> bool {
        self.state == BombState::Moving
    }

    /// Whether the bomb can still be pushed around
    fn is_live(&self) -> bool {
        matches!(self.state, BombState::Armed | BombState::Moving)
    }

    /// Kick the bomb along `direction`. Ignored until the bomb stops again.
    pub fn kick(&mut self, direction: Vec2, force: f32) -> bool {
        if self.kicked || !self.is_live() {
            return false;
        }
        if !self.launch(direction, force) {
            return false;
        }
        self.kicked = true;
        true
    }

    /// Punch the bomb along `direction`. Same one-shot rule as kicks, with its
    /// own guard.
    pub fn punch(&mut self, direction: Vec2, force: f32) -> bool {
        if self.punched || !self.is_live() {
            return false;
        }
        if !self.launch(direction, force) {
            return false;
        }
        self.punched = true;
        true
    }

    /// Replace velocity with an impulse along `direction`
    fn launch(&mut self, direction: Vec2, force: f32) -> bool {
        let dir = direction.normalize_or_zero();
        if dir == Vec2::ZERO || force <= 0.0 {
            return false;
        }
        self.vel = dir * force;
        self.state = BombState::Moving;
        true
    }

    /// Halt, snap to the nearest cell and re-arm both guards
    pub fn stop(&mut self, arena: &Arena) {
        self.vel = Vec2::ZERO;
        self.pos = cell_center(self.cell_in(arena));
        self.kicked = false;
        self.punched = false;
        if self.state == BombState::Moving {
            self.state = BombState::Armed;
        }
    }

    /// Cells the leading edge sweeps through when moving by `vel * dt`,
    /// nearest first, wrapped onto the grid. Empty while it stays in its cell.
    pub fn swept_cells(&self, arena: &Arena, dt: f32) -> Vec<Cell> {
        let Some(direction) = Direction::from_vec2(self.vel) else {
            return Vec::new();
        };
        let from = self.cell();
        let lead = self.pos + self.vel * dt + direction.to_vec2() * HALF_CELL;
        let steps = (round_to_cell(lead) - from).dot(direction.offset()).max(0);
        (1..=steps)
            .map(|k| arena.wrap_cell(from + direction.offset() * k))
            .collect()
    }

    /// Halt in `cell` (the last free cell before an obstacle)
    pub fn stop_in(&mut self, arena: &Arena, cell: Cell) {
        self.pos = cell_center(cell);
        self.stop(arena);
    }

    /// Move by one step and wrap around the arena edges.
    ///
    /// Returns true if the bomb crossed an edge.
    pub fn integrate(&mut self, arena: &Arena, dt: f32) -> bool {
        if !self.is_moving() {
            return false;
        }
        let moved = self.pos + self.vel * dt;
        let wrapped = arena.wrap_position(moved);
        self.pos = wrapped;
        (wrapped - moved).length_squared() > f32::EPSILON
    }
}
