//! Blast Arena entry point
//!
//! Runs a headless match with scripted players and logs the cues a renderer
//! would consume.
//!
//! Usage: `blast-arena [settings.json] [seed]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use blast_arena::Settings;
    use blast_arena::consts::*;
    use blast_arena::sim::{
        Arena, ArenaLayout, Direction, GameEvent, GameState, MatchPhase, PlayerInput, TickInput,
        tick,
    };

    env_logger::init();
    log::info!("Blast Arena (headless) starting...");

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);

    let arena = Arena::generate(13, 11, seed, 60);
    let layout = ArenaLayout {
        arena,
        items: Vec::new(),
    };
    let mut state = GameState::new(settings, layout, 4, seed);
    log::info!("Game initialized with seed: {}", seed);

    // Host frames at 30 fps; the simulation catches up in fixed steps
    let frame_dt: f32 = 1.0 / 30.0;
    let mut accumulator: f32 = 0.0;
    let mut finished_animations = Vec::new();
    let max_frames = 30 * 300;

    for _ in 0..max_frames {
        accumulator += frame_dt;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let t = state.time_ticks as usize;
            let players = (0..state.players.len())
                .map(|slot| PlayerInput {
                    move_dir: Direction::ALL[(t / 45 + slot) % 4].to_vec2(),
                    place_bomb: (t + slot * 17) % 120 == 0,
                    punch: false,
                })
                .collect();
            let input = TickInput {
                pause: false,
                players,
                animations_finished: std::mem::take(&mut finished_animations),
            };
            tick(&mut state, &input, SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;

            for event in state.drain_events() {
                match event {
                    // No animation to wait for headless
                    GameEvent::PlayerDied { player } => {
                        log::info!("Player {} died", player.0);
                        finished_animations.push(player);
                    }
                    GameEvent::SegmentSpawned(_) | GameEvent::SegmentExpired { .. } => {}
                    other => log::info!("{:?}", other),
                }
            }
        }

        if matches!(state.phase, MatchPhase::GameOver | MatchPhase::Win) {
            break;
        }
    }

    match state.winner {
        Some(winner) => println!("Player {} wins", winner.0),
        None => println!(
            "Match ended in {:?} after {} ticks, {} players left",
            state.phase,
            state.time_ticks,
            state.active_players.len()
        ),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // No headless driver on the web
}
