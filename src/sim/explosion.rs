//! Blast propagation
//!
//! A detonation marks its origin, then walks each cardinal ray one cell at a
//! time up to the blast radius. Walls stop a ray before the cell, destructible
//! terrain absorbs it (and is removed), items burn without slowing it, and
//! bombs in the way are reported for a delayed chain detonation instead of
//! being recursed into.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::bomb::BombId;
use super::grid::{Cell, Direction, LayerMask, Occupant, SpatialQuery, TerrainService, Tile};
use super::item::ItemId;
use crate::consts::BLAST_RADIUS_CAP;

/// Sprite role of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    /// The bomb's own cell
    Start,
    Middle,
    /// Tip of a ray
    End,
}

/// One lethal cell of fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionSegment {
    pub cell: Cell,
    /// Ray direction (None for the origin)
    pub direction: Option<Direction>,
    pub kind: SegmentKind,
    pub remaining_ticks: u32,
}

impl ExplosionSegment {
    pub fn is_live(&self) -> bool {
        self.remaining_ticks > 0
    }
}

/// Everything one detonation touched
#[derive(Debug, Clone, Default)]
pub struct Blast {
    pub segments: Vec<ExplosionSegment>,
    /// Bombs newly caught by this blast, in discovery order
    pub chained: Vec<BombId>,
    /// Items burned by the blast
    pub destroyed_items: Vec<(ItemId, Cell)>,
    /// Destructible tiles removed (each also ended its ray)
    pub cleared_tiles: Vec<Cell>,
}

impl Blast {
    /// Cells reached by fire or that lost a tile
    pub fn affected_cells(&self) -> HashSet<Cell> {
        self.segments
            .iter()
            .map(|s| s.cell)
            .chain(self.cleared_tiles.iter().copied())
            .collect()
    }
}

/// Propagate a blast of `radius` from `origin`.
///
/// Bombs already in `triggered` are skipped; newly reached bombs are added to
/// it so two blasts never chain the same bomb twice. Segments live for
/// `lifetime` ticks.
pub fn detonate<W>(
    world: &mut W,
    origin: Cell,
    radius: u32,
    lifetime: u32,
    triggered: &mut HashSet<BombId>,
) -> Blast
where
    W: SpatialQuery + TerrainService,
{
    let radius = radius.min(BLAST_RADIUS_CAP);
    let mut blast = Blast::default();

    blast.segments.push(ExplosionSegment {
        cell: origin,
        direction: None,
        kind: SegmentKind::Start,
        remaining_ticks: lifetime,
    });

    for direction in Direction::ALL {
        let mut cell = origin;
        for step in 1..=radius {
            cell += direction.offset();

            if world.is_blocking(cell, LayerMask::WALL) {
                break;
            }

            for occupant in world.occupants_at(cell, LayerMask::BOMB | LayerMask::ITEM) {
                match occupant {
                    Occupant::Bomb(id) => {
                        if triggered.insert(id) {
                            log::debug!("Blast from {:?} caught bomb {:?}", origin, id);
                            blast.chained.push(id);
                        }
                    }
                    Occupant::Item(id) => blast.destroyed_items.push((id, cell)),
                    _ => {}
                }
            }

            if world.tile_at(cell) == Tile::Destructible {
                if world.remove_tile(cell) {
                    blast.cleared_tiles.push(cell);
                }
                break;
            }

            blast.segments.push(ExplosionSegment {
                cell,
                direction: Some(direction),
                kind: if step < radius {
                    SegmentKind::Middle
                } else {
                    SegmentKind::End
                },
                remaining_ticks: lifetime,
            });
        }
    }

    blast
}
