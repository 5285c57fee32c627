//! Start, bounded shutdown and restart of a game generation
//!
//! A [`Session`] is one generation: its own world, run flags, worker pool and
//! periodic tasks. Shutdown stops the generation, deactivates every entity,
//! then joins tasks and workers against one shared deadline. Threads that
//! miss it are abandoned; they can only ever see their own stopped run state
//! and their own world, never the next generation's.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::pool::{Job, WorkerPool};
use super::scheduler::Scheduler;
use super::spawners::{Spawner, StatsReporter};
use crate::consts::*;
use crate::error::{CoreError, CoreResult};
use crate::settings::DifficultyProfile;
use crate::sim::entity::{AdvanceContext, Body, Slot};
use crate::sim::{Advancer, LoopCounters, RunState, World};

/// Smallest number of bodies handed to one advance job
const MIN_JOB_CHUNK: usize = 8;

pub struct Session {
    pub world: Arc<World>,
    pub run_state: Arc<RunState>,
    pub counters: Arc<LoopCounters>,
    pool: WorkerPool,
    scheduler: Scheduler,
    generation: u64,
}

impl Session {
    fn start(profile: &Arc<DifficultyProfile>, generation: u64, seed: u64) -> CoreResult<Self> {
        let world = Arc::new(World::new(generation));
        let run_state = Arc::new(RunState::new(generation));
        let counters = Arc::new(LoopCounters::default());
        let pool = WorkerPool::new(&format!("worker-g{generation}"), profile.worker_threads)?;
        let mut scheduler = Scheduler::new();

        let spawner = |salt: u64| {
            Spawner::new(
                Arc::clone(&world),
                Arc::clone(&run_state),
                Arc::clone(profile),
                seed ^ generation.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ salt,
            )
        };
        let params = profile.at_level(1);

        let mut balls = spawner(1);
        scheduler.spawn_periodic("ball-spawner", params.ball_spawn_interval, move || {
            balls.spawn_ball()
        })?;
        let mut trackers = spawner(2);
        scheduler.spawn_periodic("tracker-spawner", params.tracker_spawn_interval, move || {
            trackers.spawn_tracker()
        })?;
        let mut bombers = spawner(3);
        scheduler.spawn_periodic("bomber-spawner", params.bomber_spawn_interval, move || {
            bombers.spawn_bomber(Instant::now())
        })?;
        let mut powerups = spawner(4);
        scheduler.spawn_periodic("powerup-spawner", params.powerup_spawn_interval, move || {
            powerups.spawn_powerup(Instant::now())
        })?;
        let mut cleaner = spawner(5);
        scheduler.spawn_periodic("cleanup", params.cleanup_interval, move || cleaner.cleanup())?;
        let mut stats = StatsReporter::new(
            Arc::clone(&world),
            Arc::clone(&run_state),
            Arc::clone(&counters),
        );
        scheduler.spawn_periodic("stats", STATS_INTERVAL, move || stats.report(Instant::now()))?;

        log::info!(
            "Session {} started: {} workers, {} periodic tasks",
            generation,
            pool.size(),
            scheduler.task_names().len()
        );
        Ok(Self {
            world,
            run_state,
            counters,
            pool,
            scheduler,
            generation,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Periodic tasks still alive
    pub fn running_tasks(&self) -> usize {
        self.scheduler.running_count()
    }

    /// Stop everything, waiting at most `timeout` in total
    fn shutdown(mut self, timeout: Duration) -> CoreResult<()> {
        let deadline = Instant::now() + timeout;
        self.run_state.stop();
        let deactivated = self.world.close();

        let remaining = || deadline.saturating_duration_since(Instant::now());
        let tasks = self.scheduler.shutdown(remaining());
        let workers = self.pool.shutdown(remaining());

        let abandoned = [&tasks, &workers]
            .iter()
            .map(|result| match result {
                Err(CoreError::ShutdownTimedOut { abandoned, .. }) => *abandoned,
                _ => 0,
            })
            .sum::<usize>();
        log::info!(
            "Session {} stopped: {} entities deactivated, {} threads abandoned",
            self.generation,
            deactivated,
            abandoned
        );
        if abandoned > 0 {
            return Err(CoreError::ShutdownTimedOut { abandoned, timeout });
        }
        tasks.and(workers)
    }
}

fn push_chunks<T: Body>(jobs: &mut Vec<Job>, slots: Vec<Arc<Slot<T>>>, ctx: AdvanceContext, chunk: usize) {
    let mut slots = slots.into_iter().peekable();
    while slots.peek().is_some() {
        let batch: Vec<Arc<Slot<T>>> = slots.by_ref().take(chunk).collect();
        jobs.push(Box::new(move || {
            for slot in &batch {
                slot.advance(&ctx);
            }
        }));
    }
}

impl Advancer for Session {
    /// Chunk every registry into jobs and run them on the pool. A contended
    /// registry sits this step out; the rest still advance.
    fn advance_world(
        &self,
        world: &World,
        bodies: &AdvanceContext,
        enemies: &AdvanceContext,
    ) -> CoreResult<()> {
        let mut skipped = None;
        let balls = world.balls.snapshot_or_skip(&mut skipped);
        let powerups = world.powerups.snapshot_or_skip(&mut skipped);
        let trackers = world.trackers.snapshot_or_skip(&mut skipped);
        let bombers = world.bombers.snapshot_or_skip(&mut skipped);

        let total = balls.len() + powerups.len() + trackers.len() + bombers.len();
        if total > 0 {
            let chunk = total.div_ceil(self.pool.size()).max(MIN_JOB_CHUNK);
            let mut jobs: Vec<Job> = Vec::new();
            push_chunks(&mut jobs, balls, *bodies, chunk);
            push_chunks(&mut jobs, powerups, *bodies, chunk);
            push_chunks(&mut jobs, trackers, *enemies, chunk);
            push_chunks(&mut jobs, bombers, *enemies, chunk);
            self.pool.run_batch(jobs, TICK_JOB_TIMEOUT)?;
        }
        skipped.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("workers", &self.pool.size())
            .field("tasks", &self.scheduler.running_count())
            .finish_non_exhaustive()
    }
}

/// Owns the current session and builds fresh ones
pub struct LifecycleManager {
    profile: Arc<DifficultyProfile>,
    session: Option<Session>,
    generation: u64,
    seed: u64,
    shutdown_timeout: Duration,
}

impl LifecycleManager {
    pub fn new(profile: DifficultyProfile, seed: u64) -> Self {
        Self {
            profile: Arc::new(profile.sanitized()),
            session: None,
            generation: 0,
            seed,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn profile(&self) -> Arc<DifficultyProfile> {
        Arc::clone(&self.profile)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Build the worker pool and periodic tasks of a new generation
    pub fn start(&mut self) -> CoreResult<&Session> {
        if self.session.is_some() {
            return Err(CoreError::AlreadyRunning);
        }
        self.generation += 1;
        let session = Session::start(&self.profile, self.generation, self.seed)?;
        Ok(&*self.session.insert(session))
    }

    /// Stop the current generation within the shutdown bound
    pub fn shutdown(&mut self) -> CoreResult<()> {
        let session = self.session.take().ok_or(CoreError::NotRunning)?;
        session.shutdown(self.shutdown_timeout)
    }

    /// Shut down (if running) then start a fresh generation. Stragglers that
    /// missed the deadline are logged and left fenced off.
    pub fn restart(&mut self) -> CoreResult<&Session> {
        if self.session.is_some() {
            if let Err(e) = self.shutdown() {
                log::warn!("Restarting anyway: {}", e);
            }
        }
        self.start()
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.shutdown() {
                log::warn!("Lifecycle dropped: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Ball, BallKind, Caps, Enemy, GamePhase};
    use glam::Vec2;

    fn fast_profile() -> DifficultyProfile {
        DifficultyProfile {
            ball_spawn_interval_ms: 50,
            tracker_spawn_interval_ms: 50,
            bomber_spawn_interval_ms: 50,
            powerup_spawn_interval_ms: 50,
            cleanup_interval_ms: 50,
            worker_threads: 2,
            ..DifficultyProfile::default()
        }
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut manager = LifecycleManager::new(fast_profile(), 1);
        manager.start().unwrap();
        assert_eq!(manager.start().unwrap_err(), CoreError::AlreadyRunning);
        manager.shutdown().unwrap();
        assert_eq!(manager.shutdown().unwrap_err(), CoreError::NotRunning);
    }

    #[test]
    fn test_restart_leaves_nothing_behind() {
        let mut manager = LifecycleManager::new(fast_profile(), 2);
        let session = manager.start().unwrap();
        session.run_state.set_phase(GamePhase::Running);
        let old_world = Arc::clone(&session.world);
        let old_run = Arc::clone(&session.run_state);
        assert_eq!(session.running_tasks(), 6);

        // Let the spawners populate the world
        let deadline = Instant::now() + Duration::from_secs(2);
        while old_world.population().unwrap().total() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(old_world.population().unwrap().total() > 0);

        // Handles a worker might still hold across the restart
        let balls = old_world.balls.snapshot();
        let powerups = old_world.powerups.snapshot();
        let trackers = old_world.trackers.snapshot();
        let bombers = old_world.bombers.snapshot();
        assert!(balls.len() + powerups.len() + trackers.len() + bombers.len() > 0);

        let started = Instant::now();
        let session = manager.restart().unwrap();
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT + Duration::from_millis(500));

        assert_eq!(old_world.population().unwrap().total(), 0);
        assert!(balls.iter().all(|s| !s.is_active()));
        assert!(powerups.iter().all(|s| !s.is_active()));
        assert!(trackers.iter().all(|s| !s.is_active()));
        assert!(bombers.iter().all(|s| !s.is_active()));
        assert!(old_run.is_stopped());
        assert_eq!(session.generation(), 2);
        assert_eq!(session.world.generation(), 2);
        assert!(!Arc::ptr_eq(&old_world, &session.world));
        assert_eq!(session.running_tasks(), 6);

        // The old world stays empty: no spawner of the old generation survived
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(old_world.population().unwrap().total(), 0);
        manager.shutdown().unwrap();
    }

    #[test]
    fn test_session_advances_on_pool() {
        let mut manager = LifecycleManager::new(fast_profile(), 3);
        let session = manager.start().unwrap();
        let caps = Caps {
            kind: 100,
            total: 100,
        };
        for i in 0..40u64 {
            let ball = Ball::at(
                BallKind::Normal,
                Vec2::new(100.0 + i as f32, 100.0),
                Vec2::new(60.0, 0.0),
                10.0,
                i,
            );
            session.world.spawn_ball(ball, caps).unwrap();
        }

        let ctx = AdvanceContext {
            dt: 0.5,
            now: Instant::now(),
            target: Vec2::ZERO,
            arena: crate::arena_size(),
        };
        session.advance_world(&session.world, &ctx, &ctx).unwrap();
        for (i, slot) in session.world.balls.snapshot().iter().enumerate() {
            let x = slot.with(|b| b.pos.x);
            assert!((x - (130.0 + i as f32)).abs() < 0.001);
        }
        manager.shutdown().unwrap();
    }

    #[test]
    fn test_contended_registry_does_not_stall_the_rest() {
        let mut manager = LifecycleManager::new(fast_profile(), 4);
        let session = manager.start().unwrap();
        let world = World::new(99);
        let caps = Caps {
            kind: 10,
            total: 10,
        };
        let ball = Ball::at(
            BallKind::Normal,
            Vec2::new(100.0, 100.0),
            Vec2::new(60.0, 0.0),
            10.0,
            1,
        );
        world.spawn_ball(ball, caps).unwrap();
        let start = Vec2::new(50.0, 50.0);
        world.spawn_tracker(Enemy::tracker(start, 2, 40.0, 2), caps).unwrap();

        let ctx = AdvanceContext {
            dt: 0.5,
            now: Instant::now(),
            target: Vec2::new(500.0, 50.0),
            arena: crate::arena_size(),
        };
        let result = {
            let _held = world.balls.lock_exclusive();
            session.advance_world(&world, &ctx, &ctx)
        };

        assert!(matches!(
            result,
            Err(CoreError::LockTimeout { registry: "balls", .. })
        ));
        let tracker = world.trackers.snapshot()[0].with(|e| e.pos);
        assert!(tracker.x > start.x);
        let ball = world.balls.snapshot()[0].with(|b| b.pos.x);
        assert_eq!(ball, 100.0);
        manager.shutdown().unwrap();
    }
}
