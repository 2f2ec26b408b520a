//! Fixed timestep simulation tick
//!
//! Core game loop that advances the match deterministically.

use glam::Vec2;

use super::grid::{Direction, LayerMask, SpatialQuery};
use super::player::{Ability, PlayerId};
use super::scheduler::Signal;
use super::state::{GameState, MatchPhase};
use crate::consts::HALF_CELL;
use crate::{cell_center, round_to_cell};

/// Commands for one player during a single tick
#[derive(Debug, Clone, Default)]
pub struct PlayerInput {
    /// Held movement direction (zero when idle)
    pub move_dir: Vec2,
    /// Drop a bomb (edge-triggered)
    pub place_bomb: bool,
    /// Punch the bomb in front (edge-triggered, needs the boxing glove)
    pub punch: bool,
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pause toggle
    pub pause: bool,
    /// Per-player commands, indexed by player slot
    pub players: Vec<PlayerInput>,
    /// Players whose death animation finished since the last tick
    pub animations_finished: Vec<PlayerId>,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    for player in &input.animations_finished {
        state.scheduler.raise(Signal::DeathAnimationDone(*player));
    }

    // Neither the pausing nor the resuming tick advances time
    if input.pause && state.toggle_pause() {
        return;
    }

    match state.phase {
        MatchPhase::Paused | MatchPhase::GameOver | MatchPhase::Win => return,
        _ => {}
    }

    state.time_ticks += 1;

    if state.phase == MatchPhase::Countdown {
        run_scheduler(state);
        return;
    }

    apply_inputs(state, &input.players);
    move_players(state, dt);
    state.update_bombs(dt);
    state.age_explosions();

    run_scheduler(state);
    if state.phase != MatchPhase::Playing {
        return;
    }

    state.collect_items();
    state.check_hazards();
    state.check_win();
    if state.phase != MatchPhase::Playing {
        return;
    }

    state.advance_clock();
}

/// Resume due tasks until the match ends
fn run_scheduler(state: &mut GameState) {
    for action in state.scheduler.advance() {
        if state.phase.is_terminal() {
            log::trace!("Dropping {:?}, match is over", action);
            break;
        }
        state.run_task(action);
    }
}

fn apply_inputs(state: &mut GameState, inputs: &[PlayerInput]) {
    for (slot, input) in inputs.iter().enumerate() {
        let Some(player) = state.players.get_mut(slot) else {
            log::debug!("Input for unknown player slot {}", slot);
            break;
        };
        if !player.can_act() {
            continue;
        }
        player.set_move_input(input.move_dir);
        let id = player.id;

        if input.place_bomb {
            state.place_bomb(id);
        }
        if input.punch {
            state.punch_bomb(id);
        }
    }
}

/// Walk players along the grid. Walls and terrain block; a bomb blocks too,
/// and gets kicked if the player can kick. Every cell the step crosses is
/// checked, so fast players stop at the last free one.
fn move_players(state: &mut GameState, dt: f32) {
    for i in 0..state.players.len() {
        let player = &state.players[i];
        let step = player.velocity() * dt;
        let Some(direction) = Direction::from_vec2(step) else {
            continue;
        };
        let id = player.id;
        let kicker = player.has_ability(Ability::Kick);
        let current = player.cell();
        let lead = round_to_cell(player.pos + step + direction.to_vec2() * HALF_CELL);
        let reach = (lead - current).dot(direction.offset()).max(0);

        let mut free = current;
        let mut blocked = false;
        for k in 1..=reach {
            let cell = current + direction.offset() * k;
            if state.arena.is_blocking(cell, LayerMask::PLAYER_BLOCK) {
                blocked = true;
                break;
            }
            if let Some(bomb) = state.bomb_at(cell).map(|b| b.id) {
                if kicker && state.kick_bomb(bomb, direction) {
                    log::debug!("Player {} kicked bomb {:?}", id.0, bomb);
                }
                blocked = true;
                break;
            }
            free = cell;
        }

        if blocked {
            if free != current {
                state.players[i].pos = cell_center(free);
            }
            continue;
        }

        // Stay on the centre line of the row or column being walked
        let center = cell_center(current);
        let mut pos = state.players[i].pos + step;
        match direction {
            Direction::Up | Direction::Down => pos.x = center.x,
            Direction::Left | Direction::Right => pos.y = center.y,
        }
        state.players[i].pos = state.arena.clamp_position(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{SIM_DT, SIM_HZ};
    use crate::settings::Settings;
    use crate::sim::bomb::{BombId, BombState};
    use crate::sim::grid::{Arena, Tile};
    use crate::sim::state::{GameEvent, GameOverReason};
    use glam::IVec2;

    const OPEN: [&str; 9] = [
        "1........",
        ".........",
        ".........",
        ".........",
        ".........",
        ".........",
        ".........",
        ".........",
        "........2",
    ];

    fn new_match(rows: &[&str], settings: Settings) -> GameState {
        let layout = Arena::parse(rows).unwrap();
        GameState::new(settings, layout, 2, 12345)
    }

    /// Tick through the countdown
    fn start_match(rows: &[&str], settings: Settings) -> GameState {
        let mut state = new_match(rows, settings);
        let input = TickInput::default();
        while state.phase == MatchPhase::Countdown {
            tick(&mut state, &input, SIM_DT);
        }
        state.drain_events();
        state
    }

    fn place_for(slot: usize) -> TickInput {
        let mut players = vec![PlayerInput::default(); slot + 1];
        players[slot].place_bomb = true;
        TickInput {
            players,
            ..Default::default()
        }
    }

    fn walk(slot: usize, dir: Vec2) -> TickInput {
        let mut players = vec![PlayerInput::default(); slot + 1];
        players[slot].move_dir = dir;
        TickInput {
            players,
            ..Default::default()
        }
    }

    #[test]
    fn test_countdown_to_playing() {
        let mut state = new_match(&OPEN, Settings::default());
        let input = TickInput::default();

        for _ in 0..4 * SIM_HZ - 1 {
            tick(&mut state, &input, SIM_DT);
        }
        assert_eq!(state.phase, MatchPhase::Countdown);
        // Input is ignored during the countdown
        tick(&mut state, &place_for(0), SIM_DT);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert!(state.bombs.is_empty());

        let events = state.drain_events();
        let ticks: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::CountdownTick(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![3, 2, 1]);
        assert!(events.contains(&GameEvent::CountdownGo));
    }

    #[test]
    fn test_pause_ignored_during_countdown() {
        let mut state = new_match(&OPEN, Settings::default());
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, MatchPhase::Countdown);
        assert_eq!(state.time_ticks, 1);
    }

    #[test]
    fn test_pause_preserves_fuse_and_clock() {
        let mut state = start_match(&OPEN, Settings::default());
        tick(&mut state, &place_for(0), SIM_DT);
        let bomb = state.bombs[0].id;
        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }

        let fuse = state.fuse_remaining(bomb).unwrap();
        let clock = state.remaining_ticks;
        let time = state.time_ticks;

        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, MatchPhase::Paused);
        for _ in 0..500 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert_eq!(state.fuse_remaining(bomb), Some(fuse));
        assert_eq!(state.remaining_ticks, clock);

        tick(&mut state, &pause, SIM_DT);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.fuse_remaining(bomb), Some(fuse));
        assert_eq!(state.remaining_ticks, clock);
        assert_eq!(state.time_ticks, time);

        tick(&mut state, &TickInput::default(), SIM_DT);
        assert_eq!(state.fuse_remaining(bomb), Some(fuse - 1));
        assert_eq!(state.remaining_ticks, clock - 1);
    }

    #[test]
    fn test_standing_on_own_bomb_is_lethal() {
        let mut state = start_match(&OPEN, Settings::default());
        tick(&mut state, &place_for(0), SIM_DT);
        let fuse = state.settings.fuse_ticks();
        for _ in 0..fuse {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }

        assert!(state.bombs.is_empty());
        assert!(!state.players[0].alive);
        assert_eq!(state.players[0].bombs_outstanding, 0);
        assert!(
            state
                .drain_events()
                .contains(&GameEvent::PlayerDied { player: PlayerId(0) })
        );
    }

    #[test]
    fn test_explosion_expires() {
        let settings = Settings {
            explosion_secs: 0.5,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);
        state.players[0].pos = Vec2::new(4.0, 4.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);
        state.detonate_bomb(bomb);
        assert_eq!(state.explosions.len(), 5);

        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(state.explosions.is_empty());
        assert!(state.players[0].alive);
    }

    #[test]
    fn test_elimination_after_last_life() {
        let settings = Settings {
            respawn_delay_secs: 0.5,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);

        let die = |state: &mut GameState, player: PlayerId| {
            assert!(state.kill_player(player));
            let done = TickInput {
                animations_finished: vec![player],
                ..Default::default()
            };
            tick(state, &done, SIM_DT);
            for _ in 0..SIM_HZ {
                tick(state, &TickInput::default(), SIM_DT);
            }
        };

        die(&mut state, PlayerId(0));
        die(&mut state, PlayerId(0));
        assert!(state.players[0].alive);
        assert_eq!(state.players[0].lives, 1);

        die(&mut state, PlayerId(0));
        assert_eq!(state.players[0].lives, 0);
        assert!(state.players[0].eliminated);
        assert!(!state.players[0].alive);
        assert!(!state.active_players.contains(&PlayerId(0)));
        assert_eq!(state.phase, MatchPhase::Playing);

        for _ in 0..3 {
            die(&mut state, PlayerId(1));
        }
        assert!(state.active_players.is_empty());
        assert_eq!(state.phase, MatchPhase::GameOver);
        assert!(
            state
                .drain_events()
                .contains(&GameEvent::MatchOver(GameOverReason::AllEliminated))
        );
    }

    #[test]
    fn test_respawn_returns_to_spawn() {
        let settings = Settings {
            respawn_delay_secs: 0.5,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);
        state.players[1].pos = Vec2::new(5.0, 5.0);
        state.kill_player(PlayerId(1));

        let done = TickInput {
            animations_finished: vec![PlayerId(1)],
            ..Default::default()
        };
        tick(&mut state, &done, SIM_DT);
        assert!(!state.players[1].alive);
        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert!(state.players[1].alive);
        assert!(state.players[1].movable);
        assert_eq!(state.players[1].cell(), IVec2::new(8, 8));
    }

    #[test]
    fn test_walk_into_bomb_kicks_once() {
        let mut state = start_match(&OPEN, Settings::default());
        state.players[0].pos = Vec2::new(3.0, 4.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(1.0, 4.0);
        state.players[0].grant(Ability::Kick);

        let right = walk(0, Vec2::X);
        for _ in 0..20 {
            tick(&mut state, &right, SIM_DT);
        }

        let b = state.bomb(bomb).unwrap();
        assert!(b.kicked);
        assert_eq!(b.vel, Vec2::new(state.settings.kick_force, 0.0));
        let kicks = state
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::BombKicked { .. }))
            .count();
        assert_eq!(kicks, 1);
        assert!(!state.kick_bomb(bomb, Direction::Left));
    }

    #[test]
    fn test_bomb_blocks_non_kicker() {
        let mut state = start_match(&OPEN, Settings::default());
        state.players[0].pos = Vec2::new(3.0, 4.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(1.0, 4.0);

        let right = walk(0, Vec2::X);
        for _ in 0..40 {
            tick(&mut state, &right, SIM_DT);
        }
        assert_eq!(state.players[0].cell(), IVec2::new(2, 4));
        assert_eq!(state.bomb(bomb).unwrap().state, BombState::Armed);
    }

    #[test]
    fn test_walls_block_movement() {
        let mut state = start_match(&["1.#", "..2"], Settings::default());
        let right = walk(0, Vec2::X);
        for _ in 0..60 {
            tick(&mut state, &right, SIM_DT);
        }
        assert_eq!(state.players[0].cell(), IVec2::new(1, 0));
    }

    #[test]
    fn test_kicked_bomb_wraps_to_left_edge() {
        let mut state = start_match(&OPEN, Settings::default());
        state.players[0].pos = Vec2::new(6.0, 4.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);
        assert!(state.kick_bomb(bomb, Direction::Right));

        let mut wrapped = false;
        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), SIM_DT);
            if state
                .drain_events()
                .contains(&GameEvent::BombWrapped { bomb })
            {
                wrapped = true;
                break;
            }
        }
        assert!(wrapped);
        let b = state.bomb(bomb).unwrap();
        assert!(b.pos.x < 0.0);
        assert_eq!(b.pos.y, 4.0);
        assert_eq!(b.cell_in(&state.arena).y, 4);
        assert!(b.is_moving());
    }

    #[test]
    fn test_kicked_bomb_stops_before_wall() {
        let mut state = start_match(&["1........", "......#..", "........2"], Settings::default());
        state.players[0].pos = Vec2::new(1.0, 1.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);
        state.kick_bomb(bomb, Direction::Right);

        for _ in 0..60 {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        let b = state.bomb(bomb).unwrap();
        assert_eq!(b.pos, Vec2::new(5.0, 1.0));
        assert_eq!(b.state, BombState::Armed);
        assert!(!b.kicked);
    }

    #[test]
    fn test_fast_kick_stops_before_wall() {
        let settings = Settings {
            kick_force: 120.0,
            ..Default::default()
        };
        let mut state = start_match(&["1........", "...#.....", "........2"], settings);
        state.players[0].pos = Vec2::new(1.0, 1.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);
        assert!(state.kick_bomb(bomb, Direction::Right));

        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), SIM_DT);
            let b = state.bomb(bomb).unwrap();
            assert_ne!(state.arena.raw_tile(b.cell_in(&state.arena)), Tile::Wall);
        }
        let b = state.bomb(bomb).unwrap();
        assert_eq!(b.pos, Vec2::new(2.0, 1.0));
        assert_eq!(b.state, BombState::Armed);
        assert!(state.drain_events().contains(&GameEvent::BombStopped {
            bomb,
            cell: IVec2::new(2, 1)
        }));
    }

    #[test]
    fn test_fast_player_stops_before_wall() {
        let settings = Settings {
            player_speed: 120.0,
            ..Default::default()
        };
        let mut state = start_match(&["1..#.....", "........2"], settings);
        let right = walk(0, Vec2::X);
        for _ in 0..10 {
            tick(&mut state, &right, SIM_DT);
            assert_ne!(state.arena.raw_tile(state.players[0].cell()), Tile::Wall);
        }
        assert_eq!(state.players[0].cell(), IVec2::new(2, 0));
    }

    /// Tick until quiet, recording when each bomb exploded
    fn explosion_times(state: &mut GameState, ticks: u32) -> Vec<(BombId, u64)> {
        let mut times = Vec::new();
        for _ in 0..ticks {
            tick(state, &TickInput::default(), SIM_DT);
            for event in state.drain_events() {
                if let GameEvent::BombExploded { bomb, .. } = event {
                    times.push((bomb, state.time_ticks));
                }
            }
        }
        times
    }

    #[test]
    fn test_chain_detonates_after_delay() {
        let settings = Settings {
            blast_radius: 2,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);
        state.players[0].pos = Vec2::new(2.0, 4.0);
        let a = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);
        tick(&mut state, &TickInput::default(), SIM_DT);

        state.players[1].pos = Vec2::new(4.0, 4.0);
        let b = state.place_bomb(PlayerId(1)).unwrap();
        state.players[1].pos = Vec2::new(8.0, 8.0);

        let ticks = state.settings.fuse_ticks() + 30;
        let times = explosion_times(&mut state, ticks);
        let a_at: Vec<_> = times.iter().filter(|(id, _)| *id == a).collect();
        let b_at: Vec<_> = times.iter().filter(|(id, _)| *id == b).collect();
        assert_eq!(a_at.len(), 1);
        assert_eq!(b_at.len(), 1);
        assert_eq!(
            b_at[0].1 - a_at[0].1,
            u64::from(state.settings.chain_delay_ticks())
        );
        assert_eq!(state.players[0].bombs_outstanding, 0);
        assert_eq!(state.players[1].bombs_outstanding, 0);
        assert!(state.players[0].alive && state.players[1].alive);
    }

    #[test]
    fn test_two_blasts_chain_bomb_once() {
        let settings = Settings {
            blast_radius: 2,
            bomb_capacity: 3,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);
        // All three fuses come due on the same tick
        state.players[0].pos = Vec2::new(2.0, 4.0);
        let a = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(6.0, 4.0);
        let c = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(4.0, 4.0);
        let b = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(0.0, 0.0);

        let ticks = state.settings.fuse_ticks() + 30;
        let times = explosion_times(&mut state, ticks);
        let at = |id: BombId| -> Vec<u64> {
            times.iter().filter(|(b, _)| *b == id).map(|(_, t)| *t).collect()
        };
        assert_eq!(at(a).len(), 1);
        assert_eq!(at(c), at(a));
        assert_eq!(
            at(b),
            vec![at(a)[0] + u64::from(state.settings.chain_delay_ticks())]
        );
        assert_eq!(state.players[0].bombs_outstanding, 0);
        assert!(state.bombs.is_empty());
    }

    #[test]
    fn test_punch_needs_glove() {
        let mut state = start_match(&OPEN, Settings::default());
        state.players[0].pos = Vec2::new(3.0, 4.0);
        let bomb = state.place_bomb(PlayerId(0)).unwrap();
        state.players[0].pos = Vec2::new(2.0, 4.0);
        state.players[0].facing = Vec2::X;

        let punch = TickInput {
            players: vec![PlayerInput {
                punch: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        tick(&mut state, &punch, SIM_DT);
        assert!(!state.bomb(bomb).unwrap().punched);

        state.players[0].grant(Ability::BoxingGlove);
        tick(&mut state, &punch, SIM_DT);
        let b = state.bomb(bomb).unwrap();
        assert!(b.punched);
        assert_eq!(b.vel, Vec2::new(state.settings.punch_force, 0.0));
    }

    #[test]
    fn test_item_pickup_while_walking() {
        let mut state = start_match(&["1k.......", "........2"], Settings::default());
        let right = walk(0, Vec2::X);
        for _ in 0..15 {
            tick(&mut state, &right, SIM_DT);
        }
        assert!(state.items.is_empty());
        assert!(state.players[0].has_ability(Ability::Kick));
        assert!(state.drain_events().contains(&GameEvent::ItemCollected {
            player: PlayerId(0),
            kind: crate::sim::item::ItemKind::Kick,
        }));
    }

    #[test]
    fn test_reaching_win_cell() {
        let mut state = start_match(&["1.W", "..2"], Settings::default());
        let right = walk(0, Vec2::X);
        for _ in 0..60 {
            tick(&mut state, &right, SIM_DT);
        }
        assert_eq!(state.phase, MatchPhase::Win);
        assert_eq!(state.winner, Some(PlayerId(0)));
        assert_eq!(state.players[0].pos, Vec2::new(2.0, 0.0));

        let time = state.time_ticks;
        tick(&mut state, &right, SIM_DT);
        assert_eq!(state.time_ticks, time);
    }

    #[test]
    fn test_clock_runs_out() {
        let settings = Settings {
            match_secs: 1.0,
            ..Default::default()
        };
        let mut state = start_match(&OPEN, settings);
        for _ in 0..SIM_HZ {
            tick(&mut state, &TickInput::default(), SIM_DT);
        }
        assert_eq!(state.phase, MatchPhase::GameOver);
        assert_eq!(state.remaining_ticks, 0);
        assert!(
            state
                .drain_events()
                .contains(&GameEvent::MatchOver(GameOverReason::TimeUp))
        );
    }

    #[test]
    fn test_determinism() {
        let settings = Settings {
            item_drop_percent: 50,
            ..Default::default()
        };
        let rows = ["1.+.+.+..", "+.+.+.+.+", "........2"];
        let mut state1 = start_match(&rows, settings.clone());
        let mut state2 = start_match(&rows, settings);

        let inputs = [
            walk(0, Vec2::X),
            place_for(0),
            walk(0, Vec2::NEG_X),
            TickInput::default(),
        ];

        for _ in 0..100 {
            for input in &inputs {
                tick(&mut state1, input, SIM_DT);
                tick(&mut state2, input, SIM_DT);
            }
        }

        assert_eq!(state1.time_ticks, state2.time_ticks);
        assert_eq!(state1.to_json().unwrap(), state2.to_json().unwrap());
    }
}
