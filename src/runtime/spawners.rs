//! Bodies of the periodic tasks
//!
//! Every run looks the level parameters up again through the run state, so a
//! level change reaches the spawners on their next run. Each step returns the
//! delay until the next run, or `None` once the generation has been stopped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::consts::*;
use crate::settings::{DifficultyProfile, LevelParams};
use crate::sim::enemy::entry_point;
use crate::sim::{Ball, BallKind, Caps, Enemy, LoopCounters, PowerUp, RunState, World};

/// One spawner's view of a generation
pub struct Spawner {
    world: Arc<World>,
    run_state: Arc<RunState>,
    profile: Arc<DifficultyProfile>,
    rng: Pcg32,
}

impl Spawner {
    pub fn new(
        world: Arc<World>,
        run_state: Arc<RunState>,
        profile: Arc<DifficultyProfile>,
        seed: u64,
    ) -> Self {
        Self {
            world,
            run_state,
            profile,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    fn params(&self) -> LevelParams {
        self.profile.at_level(self.run_state.level())
    }

    /// Gate shared by every spawner: stopped generations end, paused ones idle
    fn gate(&self) -> Option<bool> {
        if self.run_state.is_stopped() {
            None
        } else {
            Some(self.run_state.is_running())
        }
    }

    pub fn spawn_ball(&mut self) -> Option<Duration> {
        let active = self.gate()?;
        let params = self.params();
        if active {
            let kind = BallKind::random(&mut self.rng);
            let size = self.rng.random_range(MIN_BALL_SIZE..MAX_BALL_SIZE);
            let speed = params.ball_speed * self.rng.random_range(0.8..1.2);
            let ball = Ball::spawn(kind, size, speed, crate::arena_size(), self.rng.random());
            self.report("ball", self.world.spawn_ball(ball, Caps::balls(&params)));
        }
        Some(params.ball_spawn_interval)
    }

    pub fn spawn_tracker(&mut self) -> Option<Duration> {
        let active = self.gate()?;
        let params = self.params();
        if active {
            let pos = entry_point(&mut self.rng, crate::arena_size(), TRACKER_SIZE);
            let enemy = Enemy::tracker(
                pos,
                params.tracker_health,
                params.tracker_speed,
                self.rng.random(),
            );
            self.report("tracker", self.world.spawn_tracker(enemy, Caps::trackers(&params)));
        }
        Some(params.tracker_spawn_interval)
    }

    pub fn spawn_bomber(&mut self, now: Instant) -> Option<Duration> {
        let active = self.gate()?;
        let params = self.params();
        if active {
            let pos = entry_point(&mut self.rng, crate::arena_size(), BOMBER_SIZE);
            let enemy = Enemy::bomber(
                pos,
                params.bomber_health,
                params.bomber_speed,
                params.bomb_drop_interval_secs,
                now,
                self.rng.random(),
            );
            self.report("bomber", self.world.spawn_bomber(enemy, Caps::bombers(&params)));
        }
        Some(params.bomber_spawn_interval)
    }

    /// Also waits out the respawn delay that follows a pickup
    pub fn spawn_powerup(&mut self, now: Instant) -> Option<Duration> {
        let active = self.gate()?;
        let params = self.params();
        if active && self.world.powerup_ready(now) {
            let powerup = PowerUp::random(&mut self.rng, crate::arena_size(), now);
            self.report("powerup", self.world.spawn_powerup(powerup, Caps::powerups(&params)));
        }
        Some(params.powerup_spawn_interval)
    }

    /// Sweep inactive entities; runs while paused too
    pub fn cleanup(&mut self) -> Option<Duration> {
        self.gate()?;
        let removed = self.world.sweep_inactive();
        if removed > 0 {
            log::trace!("Cleanup evicted {} inactive entities", removed);
        }
        Some(self.params().cleanup_interval)
    }

    fn report(&self, kind: &str, result: crate::error::CoreResult<u64>) {
        if let Err(e) = result {
            log::trace!("{} spawn declined: {}", kind, e);
        }
    }
}

/// Logs loop rates and population once per interval
pub struct StatsReporter {
    world: Arc<World>,
    run_state: Arc<RunState>,
    counters: Arc<LoopCounters>,
    last: Instant,
}

/// One stats sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRates {
    pub ups: f32,
    pub fps: f32,
    pub population: usize,
}

impl StatsReporter {
    pub fn new(world: Arc<World>, run_state: Arc<RunState>, counters: Arc<LoopCounters>) -> Self {
        Self {
            world,
            run_state,
            counters,
            last: Instant::now(),
        }
    }

    pub fn sample(&mut self, now: Instant) -> LoopRates {
        let secs = now.saturating_duration_since(self.last).as_secs_f32().max(1e-3);
        self.last = now;
        let (updates, frames) = self.counters.take();
        LoopRates {
            ups: updates as f32 / secs,
            fps: frames as f32 / secs,
            population: self.world.population().map(|p| p.total()).unwrap_or_default(),
        }
    }

    pub fn report(&mut self, now: Instant) -> Option<Duration> {
        if self.run_state.is_stopped() {
            return None;
        }
        let rates = self.sample(now);
        log::info!(
            "gen {} [{}] level {}: {:.0} ups, {:.0} fps, {} entities",
            self.run_state.generation(),
            self.run_state.phase().as_str(),
            self.run_state.level(),
            rates.ups,
            rates.fps,
            rates.population
        );
        Some(STATS_INTERVAL)
    }
}
