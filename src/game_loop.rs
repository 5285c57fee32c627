//! Fixed timestep game loop
//!
//! Each iteration drains input, runs zero or more fixed logic updates out of
//! an accumulator, posts effect events and renders exactly once. Updates run
//! only while the game is RUNNING; MENU, PAUSED and GAME_OVER still render.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::consts::*;
use crate::effects::{EffectSink, NullEffectSink};
use crate::error::{CoreError, CoreResult};
use crate::highscores::{HighScores, ScoreSink};
use crate::platform::{InputAction, InputCollector, TickControl};
use crate::renderer::{FrameSnapshot, Renderer};
use crate::runtime::LifecycleManager;
use crate::sim::{GamePhase, Simulation, TickInput};

/// Final numbers of a loop that has exited
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    pub score: u64,
    pub level: u32,
    pub phase: GamePhase,
    pub updates: u64,
    pub frames: u64,
    pub generation: u64,
}

pub struct GameLoop<R: Renderer> {
    lifecycle: LifecycleManager,
    sim: Simulation,
    input: InputCollector,
    effects: Box<dyn EffectSink>,
    scores: Box<dyn ScoreSink>,
    renderer: R,
    accumulator: f32,
    last: Option<Instant>,
    pending_dash: bool,
    seed: u64,
}

impl<R: Renderer> GameLoop<R> {
    /// Wrap a lifecycle, starting its first session if needed
    pub fn new(
        mut lifecycle: LifecycleManager,
        input: InputCollector,
        renderer: R,
        seed: u64,
    ) -> CoreResult<Self> {
        if !lifecycle.is_running() {
            lifecycle.start()?;
        }
        let sim = Simulation::new(lifecycle.profile(), seed);
        Ok(Self {
            lifecycle,
            sim,
            input,
            effects: Box::new(NullEffectSink),
            scores: Box::new(HighScores::new()),
            renderer,
            accumulator: 0.0,
            last: None,
            pending_dash: false,
            seed,
        })
    }

    pub fn with_effect_sink(mut self, sink: Box<dyn EffectSink>) -> Self {
        self.effects = sink;
        self
    }

    pub fn with_score_sink(mut self, sink: Box<dyn ScoreSink>) -> Self {
        self.scores = sink;
        self
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            score: self.sim.state.score,
            level: self.sim.state.level,
            phase: self.sim.phase(),
            updates: self.sim.state.updates,
            frames: self.sim.state.frames,
            generation: self.lifecycle.generation(),
        }
    }

    /// One loop iteration at wall-clock `now`
    pub fn frame(&mut self, now: Instant) -> TickControl {
        if self.input.collect_frame() == TickControl::Exit {
            return TickControl::Exit;
        }
        for action in self.input.take_actions() {
            self.handle_action(action);
        }

        let gap = self
            .last
            .map(|last| now.saturating_duration_since(last).as_secs_f32())
            .unwrap_or(0.0)
            .min(MAX_FRAME_GAP);
        self.last = Some(now);

        self.update(gap, now);
        self.sync_run_state();
        self.render(now);
        TickControl::Continue
    }

    fn handle_action(&mut self, action: InputAction) {
        match (action, self.sim.phase()) {
            (InputAction::Start, GamePhase::Menu) => self.set_phase(GamePhase::Running),
            (InputAction::Pause, GamePhase::Running) => self.set_phase(GamePhase::Paused),
            (InputAction::Pause, GamePhase::Paused) => self.set_phase(GamePhase::Running),
            (InputAction::Dash, GamePhase::Running) => self.pending_dash = true,
            (InputAction::Restart, _) => self.restart(),
            (action, phase) => log::trace!("Ignoring {:?} in {}", action, phase.as_str()),
        }
    }

    fn set_phase(&mut self, phase: GamePhase) {
        log::debug!("{} -> {}", self.sim.phase().as_str(), phase.as_str());
        self.sim.state.phase = phase;
        self.accumulator = 0.0;
    }

    fn restart(&mut self) {
        if let Err(e) = self.lifecycle.restart() {
            log::error!("Restart failed: {}", e);
            return;
        }
        let seed = self.seed ^ self.lifecycle.generation().wrapping_mul(0xA24B_AED4_963E_E407);
        self.sim.reset(seed);
        self.pending_dash = false;
        self.set_phase(GamePhase::Running);
        log::info!("New game (generation {})", self.lifecycle.generation());
    }

    fn update(&mut self, gap: f32, now: Instant) {
        self.advance(gap, now);
        if self.sim.state.take_game_over_report() {
            let score = self.sim.state.score;
            log::info!("Game over: score {} at level {}", score, self.sim.state.level);
            self.scores.report(score, crate::unix_millis());
        }
    }

    /// Run the fixed updates owed for `gap` seconds of wall clock
    fn advance(&mut self, gap: f32, now: Instant) {
        let Some(session) = self.lifecycle.session() else {
            return;
        };
        if self.sim.phase() != GamePhase::Running {
            return;
        }

        self.accumulator += gap;
        let mut substeps = 0;
        while self.accumulator >= TICK_DT && substeps < MAX_SUBSTEPS {
            let input = TickInput {
                direction: self.input.intent().direction(),
                dash: std::mem::take(&mut self.pending_dash),
            };
            // Substeps sit one TICK_DT apart, the last one closest to `now`
            let behind = (self.accumulator - TICK_DT).max(0.0);
            let tick_now = now.checked_sub(Duration::from_secs_f32(behind)).unwrap_or(now);
            let outcome = self.sim.tick(&session.world, session, &input, tick_now);
            session.counters.record_update();
            self.accumulator -= TICK_DT;
            substeps += 1;

            for event in outcome.events {
                self.effects.post(event);
            }
            if outcome.game_over {
                self.accumulator = 0.0;
                return;
            }
        }
        if self.accumulator >= TICK_DT {
            // Fell behind: drop the backlog instead of spiraling
            log::debug!("Dropping {:.3}s of simulation backlog", self.accumulator);
            self.accumulator %= TICK_DT;
        }
    }

    /// Mirror phase and level for the spawners
    fn sync_run_state(&self) {
        if let Some(session) = self.lifecycle.session() {
            session.run_state.set_phase(self.sim.phase());
            session.run_state.set_level(self.sim.state.level);
        }
    }

    fn render(&mut self, now: Instant) {
        self.sim.state.frames += 1;
        let frame = match self.lifecycle.session() {
            Some(session) => {
                session.counters.record_frame();
                FrameSnapshot::capture(&self.sim, &session.world, now)
            }
            None => FrameSnapshot::empty(),
        };
        self.renderer.render(&Arc::new(frame));
    }

    /// Loop until a Quit (or a closed input channel), then shut down.
    /// Sleeps away whatever is left of each frame's budget.
    pub fn run(mut self) -> LoopSummary {
        let budget = Duration::from_secs_f32(TICK_DT);
        loop {
            let started = Instant::now();
            if self.frame(started) == TickControl::Exit {
                break;
            }
            let spent = started.elapsed();
            if spent < budget {
                thread::sleep(budget - spent);
            }
        }

        let summary = self.summary();
        log::info!(
            "Loop exiting after {} updates and {} frames",
            summary.updates,
            summary.frames
        );
        if let Err(e) = self.lifecycle.shutdown() {
            log::warn!("Shutdown incomplete: {}", e);
        }
        summary
    }
}

impl<R: Renderer + 'static> GameLoop<R> {
    /// Run the loop on its own thread
    pub fn spawn(self) -> CoreResult<thread::JoinHandle<LoopSummary>> {
        thread::Builder::new()
            .name("game-loop".into())
            .spawn(move || self.run())
            .map_err(|e| CoreError::ThreadSpawn {
                name: "game-loop".into(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InputEvent, MovementIntent, input_channel};
    use crate::renderer::NullRenderer;
    use crate::settings::DifficultyProfile;
    use crate::sim::PowerUpKind;
    use crossbeam_channel::Sender;
    use parking_lot::Mutex;

    struct Recorder(Arc<Mutex<Vec<u64>>>);

    impl ScoreSink for Recorder {
        fn report(&mut self, score: u64, _timestamp_ms: u64) {
            self.0.lock().push(score);
        }
    }

    fn game() -> (GameLoop<NullRenderer>, Sender<InputEvent>) {
        let (tx, input) = input_channel(64);
        let lifecycle = LifecycleManager::new(DifficultyProfile::default(), 9);
        let game = GameLoop::new(lifecycle, input, NullRenderer::default(), 9).unwrap();
        (game, tx)
    }

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn test_menu_renders_without_updating() {
        let (mut game, _tx) = game();
        let t0 = Instant::now();
        game.frame(t0);
        game.frame(ms(t0, 100));
        assert_eq!(game.sim().state.updates, 0);
        assert_eq!(game.renderer().frames, 2);
        assert_eq!(game.sim().phase(), GamePhase::Menu);
    }

    #[test]
    fn test_running_uses_fixed_steps() {
        let (mut game, tx) = game();
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        game.frame(t0);
        assert_eq!(game.sim().phase(), GamePhase::Running);
        let session = game.lifecycle().session().unwrap();
        assert_eq!(session.run_state.phase(), GamePhase::Running);

        game.frame(ms(t0, 100));
        let after_first = game.sim().state.updates;
        assert!((5..=6).contains(&after_first));

        // A long stall is clamped and capped at MAX_SUBSTEPS updates
        game.frame(ms(t0, 5_000));
        assert_eq!(game.sim().state.updates, after_first + MAX_SUBSTEPS as u64);
        assert_eq!(game.renderer().frames, 3);
    }

    #[test]
    fn test_substeps_see_their_own_time() {
        let (mut game, tx) = game();
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        let right = MovementIntent {
            right: true,
            ..MovementIntent::IDLE
        };
        tx.send(InputEvent::Movement(right)).unwrap();
        game.frame(t0);
        game.sim
            .effects
            .activate(PowerUpKind::SpeedBoost, t0, Duration::from_millis(50));
        let start_x = game.sim().player.pos.x;

        // The boost runs out mid-frame: early substeps move boosted
        game.frame(ms(t0, 100));
        let updates = game.sim().state.updates as f32;
        let moved = game.sim().player.pos.x - start_x;
        let base = game.sim().player.base_speed * TICK_DT;
        assert!(moved > updates * base + 1.0);
        assert!(!game.sim().effects.is_active(PowerUpKind::SpeedBoost));
    }

    #[test]
    fn test_pause_stops_updates() {
        let (mut game, tx) = game();
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        game.frame(t0);
        tx.send(InputEvent::Action(InputAction::Pause)).unwrap();
        game.frame(ms(t0, 100));
        assert_eq!(game.sim().phase(), GamePhase::Paused);
        let paused_at = game.sim().state.updates;

        game.frame(ms(t0, 200));
        assert_eq!(game.sim().state.updates, paused_at);

        tx.send(InputEvent::Action(InputAction::Pause)).unwrap();
        game.frame(ms(t0, 300));
        game.frame(ms(t0, 400));
        assert_eq!(game.sim().phase(), GamePhase::Running);
        assert!(game.sim().state.updates > paused_at);
    }

    #[test]
    fn test_game_over_reported_once() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let (game, tx) = game();
        let mut game = game.with_score_sink(Box::new(Recorder(Arc::clone(&reported))));
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        game.frame(t0);

        game.sim.state.score = 420;
        game.sim.state.lives = 1;
        assert!(game.sim.state.lose_life());
        game.frame(ms(t0, 100));
        let updates = game.sim().state.updates;
        game.frame(ms(t0, 200));
        game.frame(ms(t0, 300));

        assert_eq!(*reported.lock(), vec![420]);
        assert_eq!(game.sim().state.updates, updates);
        let session = game.lifecycle().session().unwrap();
        assert_eq!(session.run_state.phase(), GamePhase::GameOver);
    }

    #[test]
    fn test_game_over_reported_from_running() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let (game, tx) = game();
        let mut game = game.with_score_sink(Box::new(Recorder(Arc::clone(&reported))));
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        game.frame(t0);

        // The last life goes between frames; the next frame reports it
        game.sim.state.lives = 1;
        game.sim.state.lose_life();
        game.frame(ms(t0, 50));
        game.frame(ms(t0, 100));
        assert_eq!(reported.lock().len(), 1);
    }

    #[test]
    fn test_restart_begins_new_generation() {
        let (mut game, tx) = game();
        let t0 = Instant::now();
        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        game.frame(t0);
        game.frame(ms(t0, 100));
        game.sim.state.score = 99;
        let old_world = Arc::clone(&game.lifecycle().session().unwrap().world);

        tx.send(InputEvent::Action(InputAction::Restart)).unwrap();
        game.frame(ms(t0, 200));
        assert_eq!(game.lifecycle().generation(), 2);
        assert_eq!(game.sim().state.score, 0);
        assert_eq!(game.sim().phase(), GamePhase::Running);
        assert_eq!(old_world.population().unwrap().total(), 0);
    }

    #[test]
    fn test_quit_and_disconnect_exit() {
        let (mut game, tx) = game();
        tx.send(InputEvent::Quit).unwrap();
        assert_eq!(game.frame(Instant::now()), TickControl::Exit);

        drop(tx);
        assert_eq!(game.frame(Instant::now()), TickControl::Exit);
    }

    #[test]
    fn test_spawned_loop_shuts_down() {
        let (tx, input) = input_channel(16);
        let lifecycle = LifecycleManager::new(DifficultyProfile::default(), 5);
        let game = GameLoop::new(lifecycle, input, NullRenderer::default(), 5).unwrap();
        let handle = game.spawn().unwrap();

        tx.send(InputEvent::Action(InputAction::Start)).unwrap();
        thread::sleep(Duration::from_millis(100));
        tx.send(InputEvent::Quit).unwrap();

        let started = Instant::now();
        let summary = handle.join().unwrap();
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT + Duration::from_secs(1));
        assert!(summary.frames > 0);
        assert_eq!(summary.generation, 1);
    }
}
