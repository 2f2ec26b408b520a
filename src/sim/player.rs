//! Player records: mobility, abilities and bomb inventory

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{Cell, Direction};
use crate::settings::Settings;
use crate::{cell_center, round_to_cell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

/// Capabilities granted by items. Never revoked during a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    /// Walk into a bomb to send it sliding
    Kick,
    /// Punch the bomb in front of you
    BoxingGlove,
    /// Carry/throw bombs (gate only)
    PowerGlove,
}

/// A player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub pos: Vec2,
    /// Current move input (level-valued)
    pub move_dir: Vec2,
    /// Last non-zero move direction, normalized
    pub facing: Vec2,
    pub speed: f32,
    pub alive: bool,
    pub movable: bool,
    pub lives: u32,
    pub abilities: BTreeSet<Ability>,
    pub bomb_capacity: u32,
    pub bombs_outstanding: u32,
    pub blast_radius: u32,
    /// Where the player starts and respawns
    pub spawn: Cell,
    /// Out of lives and off the roster
    pub eliminated: bool,
}

impl Player {
    /// New player at `spawn`; starts frozen until the countdown ends
    pub fn new(id: PlayerId, spawn: Cell, settings: &Settings) -> Self {
        Self {
            id,
            pos: cell_center(spawn),
            move_dir: Vec2::ZERO,
            facing: Vec2::new(0.0, 1.0),
            speed: settings.player_speed,
            alive: true,
            movable: false,
            lives: settings.lives,
            abilities: BTreeSet::new(),
            bomb_capacity: settings.bomb_capacity,
            bombs_outstanding: 0,
            blast_radius: settings.blast_radius,
            spawn,
            eliminated: false,
        }
    }

    pub fn cell(&self) -> Cell {
        round_to_cell(self.pos)
    }

    /// Alive and allowed to act
    pub fn can_act(&self) -> bool {
        self.alive && self.movable && !self.eliminated
    }

    pub fn has_ability(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    /// Grant an ability. Returns false if it was already held.
    pub fn grant(&mut self, ability: Ability) -> bool {
        let added = self.abilities.insert(ability);
        if added {
            log::debug!("Player {} gained {:?}", self.id.0, ability);
        }
        added
    }

    /// Update move input, remembering the last non-zero direction
    pub fn set_move_input(&mut self, dir: Vec2) {
        self.move_dir = dir;
        let norm = dir.normalize_or_zero();
        if norm != Vec2::ZERO {
            self.facing = norm;
        }
    }

    /// Walking velocity along the dominant axis of the move input (zero when
    /// frozen or idle)
    pub fn velocity(&self) -> Vec2 {
        if !self.can_act() {
            return Vec2::ZERO;
        }
        Direction::from_vec2(self.move_dir).map_or(Vec2::ZERO, |d| d.to_vec2() * self.speed)
    }

    pub fn disable_movement(&mut self) {
        self.movable = false;
        self.move_dir = Vec2::ZERO;
    }

    pub fn enable_movement(&mut self) {
        self.movable = true;
    }

    // --- Bomb inventory ---

    pub fn has_bomb_available(&self) -> bool {
        self.bombs_outstanding < self.bomb_capacity
    }

    /// Take a bomb from the inventory. False at capacity.
    pub fn take_bomb(&mut self) -> bool {
        if !self.has_bomb_available() {
            return false;
        }
        self.bombs_outstanding += 1;
        true
    }

    /// A placed bomb went off or was removed
    pub fn return_bomb(&mut self) {
        self.bombs_outstanding = self.bombs_outstanding.saturating_sub(1);
    }

    pub fn add_bomb_capacity(&mut self) {
        self.bomb_capacity += 1;
    }

    /// +1 radius up to `max`. Returns false if already at max.
    pub fn increase_blast_radius(&mut self, max: u32) -> bool {
        if self.blast_radius >= max {
            log::debug!("Player {} blast radius already at max {}", self.id.0, max);
            return false;
        }
        self.blast_radius += 1;
        true
    }

    pub fn maximize_blast_radius(&mut self, max: u32) {
        self.blast_radius = max;
    }

    pub fn increase_speed(&mut self, step: f32) {
        self.speed += step;
    }

    pub fn gain_life(&mut self) {
        self.lives += 1;
    }

    /// Lose a life. Returns the lives left.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    /// Put the player back on its spawn, alive and able to move
    pub fn respawn(&mut self) {
        self.pos = cell_center(self.spawn);
        self.alive = true;
        self.move_dir = Vec2::ZERO;
        self.enable_movement();
    }
}
