//! Ball Frenzy headless driver
//!
//! Runs the core with a scripted player for a few seconds, printing effect
//! events and the final score. Usage:
//!
//! ```text
//! ball-frenzy [easy|normal|hard|profile.json] [seconds]
//! ```

use std::thread;
use std::time::{Duration, Instant};

use ball_frenzy::effects::ChannelEffectSink;
use ball_frenzy::platform::{InputAction, InputEvent, MovementIntent, input_channel};
use ball_frenzy::renderer::SharedFrame;
use ball_frenzy::{
    CoreResult, Difficulty, DifficultyProfile, GameLoop, HighScores, LifecycleManager,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn load_profile(arg: Option<&str>) -> CoreResult<DifficultyProfile> {
    match arg {
        Some(path) if path.ends_with(".json") => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| ball_frenzy::CoreError::InvalidConfig(format!("{path}: {e}")))?;
            DifficultyProfile::from_json(&json)
        }
        Some(name) => Difficulty::from_str(name)
            .map(|d| d.profile())
            .ok_or_else(|| ball_frenzy::CoreError::InvalidConfig(format!("unknown difficulty `{name}`"))),
        None => Ok(DifficultyProfile::default()),
    }
}

/// Circle the arena, switching keys every half second, dashing now and then
fn script(step: u64) -> (MovementIntent, bool) {
    let intent = match step % 4 {
        0 => MovementIntent { right: true, ..MovementIntent::IDLE },
        1 => MovementIntent { down: true, ..MovementIntent::IDLE },
        2 => MovementIntent { left: true, ..MovementIntent::IDLE },
        _ => MovementIntent { up: true, ..MovementIntent::IDLE },
    };
    (intent, step % 3 == 0)
}

fn run() -> CoreResult<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let profile = load_profile(args.first().map(String::as_str))?;
    let seconds: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
    let seed = ball_frenzy::unix_millis();
    log::info!(
        "Ball Frenzy ({}) starting for {}s, seed {}",
        profile.difficulty.as_str(),
        seconds,
        seed
    );

    let (tx, input) = input_channel(256);
    let (effects, effect_rx) = ChannelEffectSink::new(512);
    let frame = SharedFrame::new();
    let scores = Arc::new(Mutex::new(HighScores::new()));

    let lifecycle = LifecycleManager::new(profile, seed);
    let game = GameLoop::new(lifecycle, input, frame.clone(), seed)?
        .with_effect_sink(Box::new(effects))
        .with_score_sink(Box::new(Arc::clone(&scores)));
    let handle = game.spawn()?;

    let printer = thread::spawn(move || {
        for event in effect_rx {
            log::debug!("effect {}", event.name());
        }
    });

    let _ = tx.send(InputEvent::Action(InputAction::Start));
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut step = 0;
    while Instant::now() < deadline {
        let (intent, dash) = script(step);
        let _ = tx.send(InputEvent::Movement(intent));
        if dash {
            let _ = tx.send(InputEvent::Action(InputAction::Dash));
        }
        step += 1;
        thread::sleep(Duration::from_millis(500));

        let latest = frame.latest();
        log::info!(
            "{} score {} level {} lives {} ({} entities)",
            latest.phase.as_str(),
            latest.score,
            latest.level,
            latest.lives,
            latest.population.total()
        );
    }
    let _ = tx.send(InputEvent::Quit);

    match handle.join() {
        Ok(summary) => log::info!(
            "Finished: score {} level {} after {} updates / {} frames",
            summary.score,
            summary.level,
            summary.updates,
            summary.frames
        ),
        Err(_) => log::error!("Game loop thread panicked"),
    }
    let _ = printer.join();

    if let Some(best) = scores.lock().top_score() {
        log::info!("Best score this run: {}", best);
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
