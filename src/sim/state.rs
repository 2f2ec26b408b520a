//! Match state and the entity registry
//!
//! `GameState` is the single owned match context: terrain, players, bombs,
//! items, live fire, the task scheduler and the match phase. It is passed by
//! reference to `tick`; there is no global instance.

use std::collections::{BTreeSet, HashSet};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bomb::{Bomb, BombId, BombState};
use super::explosion::{self, Blast, ExplosionSegment};
use super::grid::{
    Arena, ArenaLayout, Cell, Direction, LayerMask, Occupant, SpatialQuery, TerrainService, Tile,
};
use super::item::{Item, ItemId, ItemKind};
use super::player::{Ability, Player, PlayerId};
use super::scheduler::{Scheduler, Signal, TaskAction};
use crate::consts::SIM_HZ;
use crate::settings::Settings;

/// Current phase of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// "3, 2, 1, Go" - nobody can act
    Countdown,
    Playing,
    /// Every timer frozen
    Paused,
    /// Clock ran out or everyone was eliminated
    GameOver,
    /// Someone reached the win cell
    Win,
}

/// Inputs to the phase machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEvent {
    CountdownFinished,
    PauseToggled,
    ClockExpired,
    RosterEmpty,
    WinReached,
}

impl MatchPhase {
    /// Transition table. Events a phase does not accept leave it unchanged.
    pub fn next(self, event: MatchEvent) -> MatchPhase {
        use MatchEvent::*;
        use MatchPhase::*;

        match (self, event) {
            (Countdown, CountdownFinished) => Playing,
            (Playing, PauseToggled) => Paused,
            (Paused, PauseToggled) => Playing,
            (Playing, ClockExpired) | (Playing, RosterEmpty) => GameOver,
            (Playing, WinReached) => Win,
            (phase, _) => phase,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::GameOver | MatchPhase::Win)
    }
}

/// Why a match ended without a winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    TimeUp,
    AllEliminated,
}

/// Cues for the host's renderer/animator. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    CountdownTick(u32),
    CountdownGo,
    PhaseChanged { from: MatchPhase, to: MatchPhase },
    BombPlaced { bomb: BombId, owner: PlayerId, cell: Cell },
    BombKicked { bomb: BombId, direction: Direction },
    BombPunched { bomb: BombId, direction: Direction },
    BombStopped { bomb: BombId, cell: Cell },
    BombWrapped { bomb: BombId },
    BombExploded { bomb: BombId, cell: Cell },
    SegmentSpawned(ExplosionSegment),
    SegmentExpired { cell: Cell },
    /// Debris effect where a destructible tile was
    TerrainDestroyed { cell: Cell },
    /// Vanish effect for a burned item
    ItemDestroyed { item: ItemId, cell: Cell },
    ItemDropped { item: ItemId, kind: ItemKind, cell: Cell },
    ItemCollected { player: PlayerId, kind: ItemKind },
    /// Start the death animation; reply with `TickInput::animations_finished`
    PlayerDied { player: PlayerId },
    LifeLost { player: PlayerId, lives: u32 },
    PlayerRespawned { player: PlayerId, cell: Cell },
    PlayerEliminated { player: PlayerId },
    PlayerWon { player: PlayerId },
    MatchOver(GameOverReason),
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Uniform roll in `0..upper` (0 when `upper` is 0); advances the stream
    pub fn roll(&mut self, upper: u32) -> u32 {
        if upper == 0 {
            return 0;
        }
        let mut rng = Pcg32::seed_from_u64(self.seed ^ self.stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.stream += 1;
        rng.random_range(0..upper)
    }
}

/// Complete match state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub settings: Settings,
    /// Match seed for reproducibility
    pub seed: u64,
    pub rng_state: RngState,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: MatchPhase,
    /// Match clock (ticks), counted down while Playing
    pub remaining_ticks: u32,
    pub arena: Arena,
    /// Every player that joined, eliminated or not (sorted by id)
    pub players: Vec<Player>,
    /// Players still in the match
    pub active_players: BTreeSet<PlayerId>,
    pub winner: Option<PlayerId>,
    /// Bombs on the field (sorted by id)
    pub bombs: Vec<Bomb>,
    /// Items on the field (sorted by id)
    pub items: Vec<Item>,
    /// Live fire
    pub explosions: Vec<ExplosionSegment>,
    pub scheduler: Scheduler,
    /// Pending cues for the host
    #[serde(skip)]
    events: Vec<GameEvent>,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// Set up a match on `layout` with one player per spawn point (up to
    /// `player_count`) and start the countdown.
    pub fn new(settings: Settings, layout: ArenaLayout, player_count: usize, seed: u64) -> Self {
        let settings = settings.sanitized();
        let ArenaLayout { arena, items } = layout;

        if player_count > arena.spawns.len() {
            log::warn!(
                "Arena has {} spawn points, {} players requested",
                arena.spawns.len(),
                player_count
            );
        }

        let players: Vec<Player> = arena
            .spawns
            .iter()
            .take(player_count)
            .enumerate()
            .map(|(i, spawn)| Player::new(PlayerId(i as u8), *spawn, &settings))
            .collect();
        let active_players = players.iter().map(|p| p.id).collect();

        let mut state = Self {
            remaining_ticks: settings.match_ticks(),
            settings,
            seed,
            rng_state: RngState::new(seed),
            time_ticks: 0,
            phase: MatchPhase::Countdown,
            arena,
            players,
            active_players,
            winner: None,
            bombs: Vec::new(),
            items: Vec::new(),
            explosions: Vec::new(),
            scheduler: Scheduler::new(),
            events: Vec::new(),
            next_id: 1,
        };

        for (cell, kind) in items {
            state.spawn_item(cell, kind);
        }

        log::info!(
            "New match: {} players, {}x{} arena, seed {}",
            state.players.len(),
            state.arena.width(),
            state.arena.height(),
            seed
        );
        state.run_countdown(state.settings.countdown_steps);
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Pending cues, oldest first
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Hand all pending cues to the host
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    // --- Lookups ---

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn bomb(&self, id: BombId) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.id == id)
    }

    pub fn bomb_mut(&mut self, id: BombId) -> Option<&mut Bomb> {
        self.bombs.iter_mut().find(|b| b.id == id)
    }

    pub fn bomb_at(&self, cell: Cell) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.cell_in(&self.arena) == cell)
    }

    /// Ticks left on a bomb's own fuse (None once it is chained or gone)
    pub fn fuse_remaining(&self, id: BombId) -> Option<u32> {
        self.bomb(id)
            .and_then(|b| b.fuse_task)
            .and_then(|task| self.scheduler.remaining(task))
    }

    // --- Phase machine ---

    /// Feed an event to the phase machine. Returns true if the phase changed.
    pub fn apply(&mut self, event: MatchEvent) -> bool {
        let from = self.phase;
        let to = from.next(event);
        if from == to {
            log::debug!("{:?} ignored in {:?}", event, from);
            return false;
        }
        log::info!("Match phase {:?} -> {:?} ({:?})", from, to, event);
        self.phase = to;
        self.emit(GameEvent::PhaseChanged { from, to });
        true
    }

    /// Pause input. Only honored while Playing or Paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.apply(MatchEvent::PauseToggled)
    }

    fn run_countdown(&mut self, step: u32) {
        if step > 0 {
            self.emit(GameEvent::CountdownTick(step));
            self.scheduler.after(SIM_HZ, TaskAction::Countdown(step - 1));
        } else {
            self.emit(GameEvent::CountdownGo);
            let go = self.settings.go_ticks();
            self.scheduler.after(go, TaskAction::StartMatch);
        }
    }

    fn start_match(&mut self) {
        if !self.apply(MatchEvent::CountdownFinished) {
            return;
        }
        self.remaining_ticks = self.settings.match_ticks();
        for player in self.players.iter_mut().filter(|p| p.alive && !p.eliminated) {
            player.enable_movement();
        }

        if self.active_players.is_empty() && self.apply(MatchEvent::RosterEmpty) {
            log::warn!("Match started with nobody on the roster");
            self.emit(GameEvent::MatchOver(GameOverReason::AllEliminated));
        }
    }

    /// Count the match clock down one tick
    pub(crate) fn advance_clock(&mut self) {
        if self.phase != MatchPhase::Playing {
            return;
        }
        self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
        if self.remaining_ticks == 0 && self.apply(MatchEvent::ClockExpired) {
            log::info!("Time's up");
            self.emit(GameEvent::MatchOver(GameOverReason::TimeUp));
        }
    }

    /// Run a task continuation from the scheduler
    pub(crate) fn run_task(&mut self, action: TaskAction) {
        match action {
            TaskAction::Countdown(step) => self.run_countdown(step),
            TaskAction::StartMatch => self.start_match(),
            TaskAction::Fuse(bomb) => {
                // A fuse that came due on the tick its bomb was chained
                if self
                    .bomb(bomb)
                    .is_some_and(|b| b.state == BombState::Detonating)
                {
                    log::trace!("Bomb {:?} is chained, fuse ignored", bomb);
                    return;
                }
                self.detonate_bomb(bomb);
            }
            TaskAction::ChainDetonate(bomb) => self.detonate_bomb(bomb),
            TaskAction::ResolveDeath(player) => self.resolve_death(player),
            TaskAction::Respawn(player) => self.respawn_player(player),
        }
    }

    // --- Bombs ---

    /// Drop a bomb at the owner's cell.
    ///
    /// Returns None (and changes nothing) when the owner can't act, is at
    /// capacity, or the cell is taken.
    pub fn place_bomb(&mut self, owner: PlayerId) -> Option<BombId> {
        if self.phase != MatchPhase::Playing {
            return None;
        }
        let player = self.player(owner)?;
        if !player.can_act() {
            return None;
        }
        if !player.has_bomb_available() {
            log::debug!(
                "Player {} at bomb capacity ({}/{})",
                owner.0,
                player.bombs_outstanding,
                player.bomb_capacity
            );
            return None;
        }
        let cell = player.cell();
        let radius = player.blast_radius;
        if self.bomb_at(cell).is_some() || self.arena.tile_at(cell) != Tile::Empty {
            log::debug!("Cell {:?} can't take a bomb", cell);
            return None;
        }

        let player = self.player_mut(owner)?;
        if !player.take_bomb() {
            return None;
        }

        let id = BombId(self.next_entity_id());
        let mut bomb = Bomb::new(id, owner, cell, radius);
        bomb.fuse_task = Some(
            self.scheduler
                .after(self.settings.fuse_ticks(), TaskAction::Fuse(id)),
        );
        self.bombs.push(bomb);
        log::debug!("Player {} placed bomb {:?} at {:?}", owner.0, id, cell);
        self.emit(GameEvent::BombPlaced {
            bomb: id,
            owner,
            cell,
        });
        Some(id)
    }

    /// Kick a bomb along a cardinal direction
    pub fn kick_bomb(&mut self, id: BombId, direction: Direction) -> bool {
        let force = self.settings.kick_force;
        let kicked = self
            .bomb_mut(id)
            .is_some_and(|b| b.kick(direction.to_vec2(), force));
        if kicked {
            self.emit(GameEvent::BombKicked {
                bomb: id,
                direction,
            });
        }
        kicked
    }

    /// Punch the bomb directly in front of a glove-wearing player
    pub fn punch_bomb(&mut self, puncher: PlayerId) -> bool {
        let Some(player) = self.player(puncher) else {
            return false;
        };
        if !player.can_act() || !player.has_ability(Ability::BoxingGlove) {
            return false;
        }
        let Some(direction) = Direction::from_vec2(player.facing) else {
            return false;
        };
        let target = self.arena.wrap_cell(player.cell() + direction.offset());
        let Some(id) = self.bomb_at(target).map(|b| b.id) else {
            return false;
        };

        let force = self.settings.punch_force;
        let punched = self
            .bomb_mut(id)
            .is_some_and(|b| b.punch(direction.to_vec2(), force));
        if punched {
            self.emit(GameEvent::BombPunched {
                bomb: id,
                direction,
            });
        }
        punched
    }

    /// Whether a moving bomb may enter `cell`
    fn bomb_blocked_at(&self, cell: Cell, mover: BombId) -> bool {
        self.occupants_at(cell, LayerMask::BOMB_STOP)
            .iter()
            .any(|o| *o != Occupant::Bomb(mover))
    }

    /// Slide moving bombs one step; stop them in the last free cell before an
    /// obstacle, however far the step reaches
    pub(crate) fn update_bombs(&mut self, dt: f32) {
        for i in 0..self.bombs.len() {
            if !self.bombs[i].is_moving() {
                continue;
            }
            let id = self.bombs[i].id;
            let mut free = self.bombs[i].cell_in(&self.arena);
            let mut blocked = false;
            for cell in self.bombs[i].swept_cells(&self.arena, dt) {
                if self.bomb_blocked_at(cell, id) {
                    blocked = true;
                    break;
                }
                free = cell;
            }

            if blocked {
                self.bombs[i].stop_in(&self.arena, free);
                let cell = self.bombs[i].cell_in(&self.arena);
                log::debug!("Bomb {:?} stopped at {:?}", id, cell);
                self.emit(GameEvent::BombStopped { bomb: id, cell });
                continue;
            }

            if self.bombs[i].integrate(&self.arena, dt) {
                self.emit(GameEvent::BombWrapped { bomb: id });
            }
        }
    }

    /// Explode a bomb at its current cell. Stale ids are ignored.
    pub fn detonate_bomb(&mut self, id: BombId) {
        let Some(index) = self.bombs.iter().position(|b| b.id == id) else {
            log::trace!("Bomb {:?} already gone", id);
            return;
        };
        let mut bomb = self.bombs.remove(index);
        if let Some(task) = bomb.fuse_task.take() {
            self.scheduler.cancel(task);
        }
        bomb.state = BombState::Detonating;
        let origin = bomb.cell_in(&self.arena);

        // Bombs already waiting on a chain delay must not be chained again
        let mut triggered: HashSet<BombId> = self
            .bombs
            .iter()
            .filter(|b| b.state == BombState::Detonating)
            .map(|b| b.id)
            .collect();
        triggered.insert(id);

        let lifetime = self.settings.explosion_ticks();
        let blast = explosion::detonate(self, origin, bomb.radius, lifetime, &mut triggered);
        bomb.state = BombState::Consumed;

        if let Some(owner) = self.player_mut(bomb.owner) {
            owner.return_bomb();
        }
        log::debug!(
            "Bomb {:?} exploded at {:?} (radius {}, {} cells)",
            id,
            origin,
            bomb.radius,
            blast.segments.len()
        );
        self.emit(GameEvent::BombExploded { bomb: id, cell: origin });
        self.apply_blast(blast);
    }

    fn apply_blast(&mut self, blast: Blast) {
        for segment in blast.segments {
            self.emit(GameEvent::SegmentSpawned(segment));
            self.explosions.push(segment);
        }

        for (item, cell) in blast.destroyed_items {
            if let Some(index) = self.items.iter().position(|i| i.id == item) {
                self.items.remove(index);
                self.emit(GameEvent::ItemDestroyed { item, cell });
            }
        }

        for cell in blast.cleared_tiles {
            self.emit(GameEvent::TerrainDestroyed { cell });
            self.maybe_drop_item(cell);
        }

        let chain_delay = self.settings.chain_delay_ticks();
        for id in blast.chained {
            let Some(bomb) = self.bomb_mut(id) else {
                continue;
            };
            let fuse = bomb.fuse_task.take();
            bomb.state = BombState::Detonating;
            bomb.vel = Vec2::ZERO;
            if let Some(task) = fuse {
                self.scheduler.cancel(task);
            }
            self.scheduler.after(chain_delay, TaskAction::ChainDetonate(id));
        }
    }

    /// Age live fire by one tick and clear what burned out
    pub(crate) fn age_explosions(&mut self) {
        let mut expired = Vec::new();
        self.explosions.retain_mut(|segment| {
            segment.remaining_ticks = segment.remaining_ticks.saturating_sub(1);
            if segment.is_live() {
                true
            } else {
                expired.push(segment.cell);
                false
            }
        });
        for cell in expired {
            self.emit(GameEvent::SegmentExpired { cell });
        }
    }

    // --- Items ---

    pub fn spawn_item(&mut self, cell: Cell, kind: ItemKind) -> ItemId {
        let id = ItemId(self.next_entity_id());
        self.items.push(Item { id, kind, cell });
        id
    }

    fn maybe_drop_item(&mut self, cell: Cell) {
        let percent = self.settings.item_drop_percent;
        if percent == 0 || self.rng_state.roll(100) >= percent {
            return;
        }
        let kind = ItemKind::ALL[self.rng_state.roll(ItemKind::ALL.len() as u32) as usize];
        let item = self.spawn_item(cell, kind);
        log::debug!("Terrain at {:?} dropped {:?}", cell, kind);
        self.emit(GameEvent::ItemDropped { item, kind, cell });
    }

    /// Alive players pick up whatever lies in their cell
    pub(crate) fn collect_items(&mut self) {
        let mut index = 0;
        while index < self.items.len() {
            let cell = self.items[index].cell;
            let collector = self
                .players
                .iter()
                .position(|p| p.alive && !p.eliminated && p.cell() == cell);

            let Some(p) = collector else {
                index += 1;
                continue;
            };
            let item = self.items.remove(index);
            let changed = item.kind.apply(&mut self.players[p], &self.settings);
            let player = self.players[p].id;
            if !changed {
                log::debug!("{:?} had no effect on player {}", item.kind, player.0);
            }
            self.emit(GameEvent::ItemCollected {
                player,
                kind: item.kind,
            });
        }
    }

    // --- Death, respawn, win ---

    /// Start the death sub-flow. Returns false for players already dead or out.
    pub fn kill_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        if !player.alive || player.eliminated {
            return false;
        }
        player.alive = false;
        player.disable_movement();
        log::debug!("Player {} died", id.0);
        self.emit(GameEvent::PlayerDied { player: id });
        self.scheduler.wait_until(
            Signal::DeathAnimationDone(id),
            TaskAction::ResolveDeath(id),
        );
        true
    }

    /// Alive players standing in live fire die
    pub(crate) fn check_hazards(&mut self) {
        let burned: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.alive && !p.eliminated)
            .filter(|p| self.is_blocking(p.cell(), LayerMask::EXPLOSION))
            .map(|p| p.id)
            .collect();
        for id in burned {
            self.kill_player(id);
        }
    }

    fn resolve_death(&mut self, id: PlayerId) {
        let respawn_delay = self.settings.respawn_delay_ticks();
        let Some(player) = self.player_mut(id) else {
            return;
        };
        if player.alive || player.eliminated {
            return;
        }
        let lives = player.lose_life();
        if lives > 0 {
            log::debug!("Player {} has {} lives left", id.0, lives);
            self.emit(GameEvent::LifeLost { player: id, lives });
            self.scheduler.after(respawn_delay, TaskAction::Respawn(id));
        } else {
            self.eliminate(id);
        }
    }

    fn eliminate(&mut self, id: PlayerId) {
        if let Some(player) = self.player_mut(id) {
            player.eliminated = true;
            player.disable_movement();
        }
        self.active_players.remove(&id);
        log::info!("Player {} is out of lives", id.0);
        self.emit(GameEvent::PlayerEliminated { player: id });

        if self.active_players.is_empty() && self.apply(MatchEvent::RosterEmpty) {
            log::info!("All players are out");
            self.emit(GameEvent::MatchOver(GameOverReason::AllEliminated));
        }
    }

    fn respawn_player(&mut self, id: PlayerId) {
        let Some(player) = self.player_mut(id) else {
            return;
        };
        if player.alive || player.eliminated {
            return;
        }
        player.respawn();
        let cell = player.spawn;
        log::debug!("Player {} respawned at {:?}", id.0, cell);
        self.emit(GameEvent::PlayerRespawned { player: id, cell });
    }

    /// First alive player on the win cell wins the match
    pub(crate) fn check_win(&mut self) {
        let Some(win_cell) = self.arena.win_cell else {
            return;
        };
        let Some(index) = self
            .players
            .iter()
            .position(|p| p.alive && !p.eliminated && p.cell() == win_cell)
        else {
            return;
        };
        if !self.apply(MatchEvent::WinReached) {
            return;
        }
        let player = &mut self.players[index];
        player.pos = crate::cell_center(win_cell);
        player.disable_movement();
        let id = player.id;
        self.winner = Some(id);
        log::info!("Player {} wins!", id.0);
        self.emit(GameEvent::PlayerWon { player: id });
    }
}

impl SpatialQuery for GameState {
    fn occupants_at(&self, cell: Cell, mask: LayerMask) -> Vec<Occupant> {
        let mut out = self.arena.occupants_at(cell, mask);

        if mask.contains(LayerMask::BOMB) {
            out.extend(
                self.bombs
                    .iter()
                    .filter(|b| b.state != BombState::Consumed && b.cell_in(&self.arena) == cell)
                    .map(|b| Occupant::Bomb(b.id)),
            );
        }
        if mask.contains(LayerMask::ITEM) {
            out.extend(
                self.items
                    .iter()
                    .filter(|i| i.cell == cell)
                    .map(|i| Occupant::Item(i.id)),
            );
        }
        if mask.contains(LayerMask::PLAYER) {
            out.extend(
                self.players
                    .iter()
                    .filter(|p| p.alive && !p.eliminated && p.cell() == cell)
                    .map(|p| Occupant::Player(p.id)),
            );
        }
        if mask.contains(LayerMask::EXPLOSION)
            && self.explosions.iter().any(|s| s.is_live() && s.cell == cell)
        {
            out.push(Occupant::Explosion);
        }
        out
    }
}

impl TerrainService for GameState {
    fn tile_at(&self, cell: Cell) -> Tile {
        self.arena.tile_at(cell)
    }

    fn remove_tile(&mut self, cell: Cell) -> bool {
        self.arena.remove_tile(cell)
    }
}
