//! Single-use power-up items

use serde::{Deserialize, Serialize};

use super::grid::Cell;
use super::player::{Ability, Player};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// +1 blast radius (up to the max)
    BlastRadius,
    /// Blast radius straight to the max
    FullBlastRadius,
    /// +1 bomb capacity
    ExtraBomb,
    /// Placeholder pickup: consumed, no effect yet
    PowerBomb,
    SpeedUp,
    ExtraLife,
    Kick,
    BoxingGlove,
    PowerGlove,
}

impl ItemKind {
    pub const ALL: [ItemKind; 9] = [
        ItemKind::BlastRadius,
        ItemKind::FullBlastRadius,
        ItemKind::ExtraBomb,
        ItemKind::PowerBomb,
        ItemKind::SpeedUp,
        ItemKind::ExtraLife,
        ItemKind::Kick,
        ItemKind::BoxingGlove,
        ItemKind::PowerGlove,
    ];

    /// Layout glyph
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            'r' => Some(ItemKind::BlastRadius),
            'R' => Some(ItemKind::FullBlastRadius),
            'b' => Some(ItemKind::ExtraBomb),
            'P' => Some(ItemKind::PowerBomb),
            's' => Some(ItemKind::SpeedUp),
            'l' => Some(ItemKind::ExtraLife),
            'k' => Some(ItemKind::Kick),
            'g' => Some(ItemKind::BoxingGlove),
            'p' => Some(ItemKind::PowerGlove),
            _ => None,
        }
    }

    /// Apply the effect to `player`.
    ///
    /// Returns false when the effect changed nothing (already maxed or ability
    /// already held). The item is consumed either way.
    pub fn apply(self, player: &mut Player, settings: &Settings) -> bool {
        match self {
            ItemKind::BlastRadius => player.increase_blast_radius(settings.max_blast_radius),
            ItemKind::FullBlastRadius => {
                let changed = player.blast_radius != settings.max_blast_radius;
                player.maximize_blast_radius(settings.max_blast_radius);
                changed
            }
            ItemKind::ExtraBomb => {
                player.add_bomb_capacity();
                true
            }
            ItemKind::PowerBomb => false,
            ItemKind::SpeedUp => {
                player.increase_speed(settings.speed_step);
                true
            }
            ItemKind::ExtraLife => {
                player.gain_life();
                true
            }
            ItemKind::Kick => player.grant(Ability::Kick),
            ItemKind::BoxingGlove => player.grant(Ability::BoxingGlove),
            ItemKind::PowerGlove => player.grant(Ability::PowerGlove),
        }
    }
}

/// An item lying on the grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub cell: Cell,
}
