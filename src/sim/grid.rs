//! Discrete arena grid and the spatial services the simulation queries
//!
//! Cells are integer coordinates with `y` growing downward (row order of the
//! layout strings). `Direction::Up` is therefore `-y`.

use std::fmt;
use std::ops::BitOr;

use glam::{IVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bomb::BombId;
use super::item::{ItemId, ItemKind};
use super::player::PlayerId;

/// A unit square of the world grid
pub type Cell = IVec2;

/// The four cardinal directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Propagation order for blasts
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit cell offset
    pub fn offset(self) -> IVec2 {
        match self {
            Direction::Up => IVec2::new(0, -1),
            Direction::Down => IVec2::new(0, 1),
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
        }
    }

    /// Unit vector in world space
    pub fn to_vec2(self) -> Vec2 {
        self.offset().as_vec2()
    }

    /// Dominant cardinal direction of a vector (None for zero)
    pub fn from_vec2(v: Vec2) -> Option<Self> {
        if v == Vec2::ZERO {
            return None;
        }
        if v.x.abs() >= v.y.abs() {
            Some(if v.x > 0.0 { Direction::Right } else { Direction::Left })
        } else {
            Some(if v.y > 0.0 { Direction::Down } else { Direction::Up })
        }
    }
}

/// Bit set of collision layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerMask(u8);

impl LayerMask {
    /// Solid walls (hard stop for blasts)
    pub const WALL: LayerMask = LayerMask(1 << 0);
    /// Destructible terrain
    pub const TERRAIN: LayerMask = LayerMask(1 << 1);
    pub const BOMB: LayerMask = LayerMask(1 << 2);
    pub const ITEM: LayerMask = LayerMask(1 << 3);
    pub const PLAYER: LayerMask = LayerMask(1 << 4);
    /// Live explosion segments (lethal to players)
    pub const EXPLOSION: LayerMask = LayerMask(1 << 5);

    /// Layers that stop a moving bomb
    pub const BOMB_STOP: LayerMask =
        LayerMask(Self::WALL.0 | Self::TERRAIN.0 | Self::BOMB.0 | Self::PLAYER.0);
    /// Layers a walking player cannot enter
    pub const PLAYER_BLOCK: LayerMask = LayerMask(Self::WALL.0 | Self::TERRAIN.0);

    pub fn contains(self, other: LayerMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// Something that occupies a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Wall,
    Terrain,
    Bomb(BombId),
    Item(ItemId),
    Player(PlayerId),
    Explosion,
}

/// Occupant lookup by layer
pub trait SpatialQuery {
    /// All occupants of `cell` on any layer in `mask`
    fn occupants_at(&self, cell: Cell, mask: LayerMask) -> Vec<Occupant>;

    /// Whether anything on `mask` occupies `cell`
    fn is_blocking(&self, cell: Cell, mask: LayerMask) -> bool {
        !self.occupants_at(cell, mask).is_empty()
    }
}

/// Terrain as seen by the blast: destructible or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
    Destructible,
}

/// Tile lookup and removal
pub trait TerrainService {
    fn tile_at(&self, cell: Cell) -> Tile;

    /// Remove a destructible tile. Returns false if there was none.
    fn remove_tile(&mut self, cell: Cell) -> bool;
}

/// Errors from parsing an ASCII layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    Empty,
    /// Row `row` has a different width than the first row
    Ragged { row: usize, expected: usize, found: usize },
    UnknownGlyph { glyph: char, cell: Cell },
    DuplicateSpawn { slot: u32 },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Empty => write!(f, "layout has no rows"),
            LayoutError::Ragged {
                row,
                expected,
                found,
            } => write!(f, "row {} is {} wide, expected {}", row, found, expected),
            LayoutError::UnknownGlyph { glyph, cell } => {
                write!(f, "unknown glyph '{}' at ({}, {})", glyph, cell.x, cell.y)
            }
            LayoutError::DuplicateSpawn { slot } => write!(f, "spawn {} defined twice", slot),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Result of parsing a layout: terrain plus pre-placed items
#[derive(Debug, Clone)]
pub struct ArenaLayout {
    pub arena: Arena,
    pub items: Vec<(Cell, ItemKind)>,
}

/// Tile grid with spawn points and an optional win cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    /// Reaching this cell alive wins the match
    pub win_cell: Option<Cell>,
    /// Spawn/respawn points, one per player slot
    pub spawns: Vec<Cell>,
}

impl Arena {
    /// Open arena with no terrain
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; (width * height) as usize],
            win_cell: None,
            spawns: Vec::new(),
        }
    }

    /// Parse an ASCII layout.
    ///
    /// `#` wall, `+` destructible, `.` empty, `W` win cell, `1`-`9` spawn
    /// points (ordered by digit), `r R b P s l k g p` items.
    pub fn parse(rows: &[&str]) -> Result<ArenaLayout, LayoutError> {
        let first = rows.first().ok_or(LayoutError::Empty)?;
        let width = first.chars().count();
        if width == 0 {
            return Err(LayoutError::Empty);
        }

        let mut arena = Arena::new(width as i32, rows.len() as i32);
        let mut items = Vec::new();
        let mut spawn_slots: Vec<(u32, Cell)> = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(LayoutError::Ragged {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let cell = IVec2::new(x as i32, y as i32);
                match glyph {
                    '.' | ' ' => {}
                    '#' => arena.set_tile(cell, Tile::Wall),
                    '+' => arena.set_tile(cell, Tile::Destructible),
                    'W' => arena.win_cell = Some(cell),
                    '1'..='9' => {
                        let slot = glyph.to_digit(10).unwrap_or(0);
                        if spawn_slots.iter().any(|(s, _)| *s == slot) {
                            return Err(LayoutError::DuplicateSpawn { slot });
                        }
                        spawn_slots.push((slot, cell));
                    }
                    other => match ItemKind::from_glyph(other) {
                        Some(kind) => items.push((cell, kind)),
                        None => return Err(LayoutError::UnknownGlyph { glyph: other, cell }),
                    },
                }
            }
        }

        spawn_slots.sort_by_key(|(slot, _)| *slot);
        arena.spawns = spawn_slots.into_iter().map(|(_, cell)| cell).collect();

        Ok(ArenaLayout { arena, items })
    }

    /// Classic arena: border walls, pillars on even interior coordinates,
    /// destructible fill, and clear corner pockets for four spawns.
    pub fn generate(width: i32, height: i32, seed: u64, fill_percent: u32) -> Self {
        let width = width.max(5);
        let height = height.max(5);
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut arena = Arena::new(width, height);

        let corners = [
            IVec2::new(1, 1),
            IVec2::new(width - 2, 1),
            IVec2::new(1, height - 2),
            IVec2::new(width - 2, height - 2),
        ];

        for y in 0..height {
            for x in 0..width {
                let cell = IVec2::new(x, y);
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                let pillar = x % 2 == 0 && y % 2 == 0;
                // Spawn pocket: the corner itself and its two neighbours
                let pocket = corners
                    .iter()
                    .any(|c| (*c - cell).abs().element_sum() <= 1);

                let tile = if border || pillar {
                    Tile::Wall
                } else if !pocket && rng.random_range(0..100) < fill_percent {
                    Tile::Destructible
                } else {
                    Tile::Empty
                };
                arena.set_tile(cell, tile);
            }
        }

        arena.spawns = corners.to_vec();
        log::debug!(
            "Generated {}x{} arena (seed {}, {} destructible)",
            width,
            height,
            seed,
            arena.count(Tile::Destructible)
        );
        arena
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell)
            .then(|| (cell.y * self.width + cell.x) as usize)
    }

    pub fn set_tile(&mut self, cell: Cell, tile: Tile) {
        if let Some(i) = self.index(cell) {
            self.tiles[i] = tile;
        }
    }

    /// Raw tile including walls; cells off the grid read as walls
    pub fn raw_tile(&self, cell: Cell) -> Tile {
        self.index(cell).map_or(Tile::Wall, |i| self.tiles[i])
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    /// Toroidal wrap of a world position into `[-0.5, size - 0.5)` on both axes
    pub fn wrap_position(&self, pos: Vec2) -> Vec2 {
        let w = self.width as f32;
        let h = self.height as f32;
        Vec2::new(
            (pos.x + 0.5).rem_euclid(w) - 0.5,
            (pos.y + 0.5).rem_euclid(h) - 0.5,
        )
    }

    /// Toroidal wrap of a cell
    pub fn wrap_cell(&self, cell: Cell) -> Cell {
        IVec2::new(cell.x.rem_euclid(self.width), cell.y.rem_euclid(self.height))
    }

    /// Clamp a world position to the grid rectangle
    pub fn clamp_position(&self, pos: Vec2) -> Vec2 {
        pos.clamp(
            Vec2::ZERO,
            Vec2::new((self.width - 1) as f32, (self.height - 1) as f32),
        )
    }
}

impl TerrainService for Arena {
    fn tile_at(&self, cell: Cell) -> Tile {
        self.raw_tile(cell)
    }

    fn remove_tile(&mut self, cell: Cell) -> bool {
        match self.index(cell) {
            Some(i) if self.tiles[i] == Tile::Destructible => {
                self.tiles[i] = Tile::Empty;
                true
            }
            _ => false,
        }
    }
}

impl SpatialQuery for Arena {
    fn occupants_at(&self, cell: Cell, mask: LayerMask) -> Vec<Occupant> {
        match self.raw_tile(cell) {
            Tile::Wall if mask.contains(LayerMask::WALL) => vec![Occupant::Wall],
            Tile::Destructible if mask.contains(LayerMask::TERRAIN) => vec![Occupant::Terrain],
            _ => Vec::new(),
        }
    }
}
