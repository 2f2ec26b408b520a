//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod bomb;
pub mod explosion;
pub mod grid;
pub mod item;
pub mod player;
pub mod scheduler;
pub mod state;
pub mod tick;

pub use bomb::{Bomb, BombId, BombState};
pub use explosion::{Blast, ExplosionSegment, SegmentKind, detonate};
pub use grid::{
    Arena, ArenaLayout, Cell, Direction, LayerMask, LayoutError, Occupant, SpatialQuery,
    TerrainService, Tile,
};
pub use item::{Item, ItemId, ItemKind};
pub use player::{Ability, Player, PlayerId};
pub use scheduler::{Scheduler, Signal, TaskAction, TaskId, Wait};
pub use state::{GameEvent, GameOverReason, GameState, MatchEvent, MatchPhase, RngState};
pub use tick::{PlayerInput, TickInput, tick};
