//! Game settings and balance
//!
//! Authored in seconds and loaded from JSON. The simulation reads durations
//! through the `*_ticks` accessors.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::BLAST_RADIUS_CAP;
use crate::secs_to_ticks;

/// Errors raised while loading settings
#[derive(Debug)]
pub enum SettingsError {
    /// The settings file could not be read
    Io(std::io::Error),
    /// The settings file is not valid JSON for `Settings`
    Parse(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "failed to read settings: {}", err),
            SettingsError::Parse(err) => write!(f, "invalid settings: {}", err),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse(err)
    }
}

/// Match rules and tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Bombs ===
    /// Time from placement to detonation
    pub fuse_secs: f32,
    /// Delay before a bomb caught in another blast detonates
    pub chain_delay_secs: f32,
    /// How long explosion segments stay on the grid (and stay lethal)
    pub explosion_secs: f32,
    /// Starting blast radius for every player
    pub blast_radius: u32,
    /// Upper bound for blast radius power-ups
    pub max_blast_radius: u32,
    /// Starting number of bombs a player may have on the field
    pub bomb_capacity: u32,
    /// Impulse applied when a player kicks a bomb (cells/sec)
    pub kick_force: f32,
    /// Impulse applied when a player punches a bomb (cells/sec)
    pub punch_force: f32,

    // === Players ===
    /// Lives each player starts with
    pub lives: u32,
    /// Movement speed (cells/sec)
    pub player_speed: f32,
    /// Speed gained per speed power-up
    pub speed_step: f32,
    /// Delay between losing a life and reappearing at the spawn point
    pub respawn_delay_secs: f32,

    // === Match ===
    /// Number of "3, 2, 1" steps before Go
    pub countdown_steps: u32,
    /// How long "Go" is shown before play starts
    pub go_secs: f32,
    /// Round length
    pub match_secs: f32,

    // === Terrain ===
    /// Chance (0-100) that destroyed terrain drops an item
    pub item_drop_percent: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fuse_secs: 4.0,
            chain_delay_secs: 0.1,
            explosion_secs: 1.0,
            blast_radius: 1,
            max_blast_radius: 8,
            bomb_capacity: 1,
            kick_force: 10.0,
            punch_force: 10.0,

            lives: 3,
            player_speed: 5.0,
            speed_step: 1.0,
            respawn_delay_secs: 5.0,

            countdown_steps: 3,
            go_secs: 1.0,
            match_secs: 60.0,

            item_drop_percent: 0,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document (missing fields use defaults)
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults if the file is missing or broken
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("{} ({}), using default settings", err, path.as_ref().display());
                Self::default()
            }
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp values into ranges the simulation can honor
    pub fn sanitized(mut self) -> Self {
        self.max_blast_radius = self.max_blast_radius.clamp(1, BLAST_RADIUS_CAP);
        self.blast_radius = self.blast_radius.clamp(1, self.max_blast_radius);
        self.bomb_capacity = self.bomb_capacity.max(1);
        self.item_drop_percent = self.item_drop_percent.min(100);
        self.player_speed = self.player_speed.max(0.0);
        self.speed_step = self.speed_step.max(0.0);
        self.kick_force = self.kick_force.max(0.0);
        self.punch_force = self.punch_force.max(0.0);
        self
    }

    pub fn fuse_ticks(&self) -> u32 {
        secs_to_ticks(self.fuse_secs)
    }

    pub fn chain_delay_ticks(&self) -> u32 {
        secs_to_ticks(self.chain_delay_secs)
    }

    pub fn explosion_ticks(&self) -> u32 {
        secs_to_ticks(self.explosion_secs)
    }

    pub fn respawn_delay_ticks(&self) -> u32 {
        secs_to_ticks(self.respawn_delay_secs)
    }

    pub fn go_ticks(&self) -> u32 {
        secs_to_ticks(self.go_secs)
    }

    pub fn match_ticks(&self) -> u32 {
        secs_to_ticks(self.match_secs)
    }
}
