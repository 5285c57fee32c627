//! All registries of one game generation
//!
//! Every spawn passes through a single gate so the global population cap holds
//! even when several spawners and the collision pass insert at once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::ball::Ball;
use super::enemy::Enemy;
use super::entity::{Body, EntityId};
use super::powerup::PowerUp;
use super::registry::Registry;
use crate::consts::LOCK_TIMEOUT;
use crate::error::{CoreError, CoreResult};
use crate::settings::LevelParams;

/// Lock attempts per registry when deactivating everything
const DEACTIVATE_ATTEMPTS: usize = 10;

/// Per-kind and global caps for one spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub kind: usize,
    pub total: usize,
}

impl Caps {
    pub fn balls(params: &LevelParams) -> Self {
        Self {
            kind: params.max_balls,
            total: params.max_total_entities,
        }
    }

    pub fn trackers(params: &LevelParams) -> Self {
        Self {
            kind: params.max_tracker_enemies,
            total: params.max_total_entities,
        }
    }

    pub fn bombers(params: &LevelParams) -> Self {
        Self {
            kind: params.max_bomber_enemies,
            total: params.max_total_entities,
        }
    }

    pub fn powerups(params: &LevelParams) -> Self {
        Self {
            kind: params.max_powerups,
            total: params.max_total_entities,
        }
    }
}

/// Active entity counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Population {
    pub balls: usize,
    pub trackers: usize,
    pub bombers: usize,
    pub powerups: usize,
}

impl Population {
    pub fn total(&self) -> usize {
        self.balls + self.trackers + self.bombers + self.powerups
    }
}

pub struct World {
    pub balls: Registry<Ball>,
    pub trackers: Registry<Enemy>,
    pub bombers: Registry<Enemy>,
    pub powerups: Registry<PowerUp>,
    next_id: AtomicU64,
    spawn_gate: Mutex<()>,
    closed: AtomicBool,
    powerup_respawn_at: Mutex<Option<Instant>>,
    generation: u64,
}

impl World {
    pub fn new(generation: u64) -> Self {
        Self {
            balls: Registry::new("balls"),
            trackers: Registry::new("trackers"),
            bombers: Registry::new("bombers"),
            powerups: Registry::new("powerups"),
            next_id: AtomicU64::new(1),
            spawn_gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            powerup_respawn_at: Mutex::new(None),
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn next_id(&self) -> EntityId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spawn_into<T: Body>(&self, registry: &Registry<T>, body: T, caps: Caps) -> CoreResult<EntityId> {
        let _gate = self
            .spawn_gate
            .try_lock_for(LOCK_TIMEOUT)
            .ok_or(CoreError::LockTimeout {
                registry: "spawn_gate",
                timeout_ms: LOCK_TIMEOUT.as_millis() as u64,
            })?;
        if self.is_closed() {
            return Err(CoreError::NotRunning);
        }
        if self.population()?.total() >= caps.total {
            return Err(CoreError::GlobalCap { cap: caps.total });
        }
        let id = self.next_id();
        registry.insert_within(id, body, caps.kind)?;
        log::trace!("Spawned {} #{} (gen {})", registry.name(), id, self.generation);
        Ok(id)
    }

    pub fn spawn_ball(&self, ball: Ball, caps: Caps) -> CoreResult<EntityId> {
        self.spawn_into(&self.balls, ball, caps)
    }

    pub fn spawn_tracker(&self, enemy: Enemy, caps: Caps) -> CoreResult<EntityId> {
        self.spawn_into(&self.trackers, enemy, caps)
    }

    pub fn spawn_bomber(&self, enemy: Enemy, caps: Caps) -> CoreResult<EntityId> {
        self.spawn_into(&self.bombers, enemy, caps)
    }

    pub fn spawn_powerup(&self, powerup: PowerUp, caps: Caps) -> CoreResult<EntityId> {
        self.spawn_into(&self.powerups, powerup, caps)
    }

    pub fn population(&self) -> CoreResult<Population> {
        Ok(Population {
            balls: self.balls.active_count()?,
            trackers: self.trackers.active_count()?,
            bombers: self.bombers.active_count()?,
            powerups: self.powerups.active_count()?,
        })
    }

    /// Empty both enemy registries; returns how many enemies were active
    pub fn clear_enemies(&self) -> usize {
        self.trackers.clear() + self.bombers.clear()
    }

    /// Evict inactive entities from every registry. A contended registry is
    /// left for the next sweep.
    pub fn sweep_inactive(&self) -> usize {
        let mut removed = 0;
        for result in [
            self.balls.sweep_inactive(),
            self.trackers.sweep_inactive(),
            self.bombers.sweep_inactive(),
            self.powerups.sweep_inactive(),
        ] {
            match result {
                Ok(n) => removed += n,
                Err(e) => log::debug!("Sweep skipped: {}", e),
            }
        }
        removed
    }

    /// Refuse all further spawns, then deactivate everything.
    /// Returns how many entities were active.
    pub fn close(&self) -> usize {
        let _gate = self.spawn_gate.lock();
        self.closed.store(true, Ordering::Release);
        self.deactivate_all()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Deactivate every entity without closing the world. A registry whose
    /// lock stays contended is retried a few times before it is left to
    /// cleanup.
    pub fn deactivate_all(&self) -> usize {
        fn settle(name: &str, mut attempt: impl FnMut() -> CoreResult<usize>) -> usize {
            for _ in 0..DEACTIVATE_ATTEMPTS {
                if let Ok(n) = attempt() {
                    return n;
                }
            }
            log::warn!("Could not deactivate {}: lock contended", name);
            0
        }
        settle("balls", || self.balls.deactivate_all())
            + settle("trackers", || self.trackers.deactivate_all())
            + settle("bombers", || self.bombers.deactivate_all())
            + settle("powerups", || self.powerups.deactivate_all())
    }

    /// No pickup delay pending
    pub fn powerup_ready(&self, now: Instant) -> bool {
        self.powerup_respawn_at
            .lock()
            .is_none_or(|at| now >= at)
    }

    /// Hold back the power-up spawner after a pickup
    pub fn schedule_powerup_respawn(&self, now: Instant, delay: Duration) {
        *self.powerup_respawn_at.lock() = Some(now + delay);
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("generation", &self.generation)
            .field("population", &self.population().ok())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DifficultyProfile;
    use crate::sim::ball::BallKind;
    use glam::Vec2;
    use std::sync::Arc;
    use std::thread;

    fn ball(seed: u64) -> Ball {
        Ball::spawn(BallKind::Normal, 12.0, 100.0, crate::arena_size(), seed)
    }

    fn tracker(seed: u64) -> Enemy {
        Enemy::tracker(Vec2::new(10.0, 10.0), 1, 50.0, seed)
    }

    #[test]
    fn test_global_cap() {
        let world = World::new(1);
        let caps = Caps { kind: 10, total: 3 };
        world.spawn_ball(ball(1), caps).unwrap();
        world.spawn_ball(ball(2), caps).unwrap();
        world.spawn_tracker(tracker(3), caps).unwrap();
        assert_eq!(
            world.spawn_tracker(tracker(4), caps),
            Err(CoreError::GlobalCap { cap: 3 })
        );
        assert_eq!(world.population().unwrap().total(), 3);
    }

    #[test]
    fn test_concurrent_spawners_respect_caps() {
        let world = Arc::new(World::new(1));
        let params = DifficultyProfile::default().at_level(1);
        let tracker_caps = Caps::trackers(&params);
        let bomber_caps = Caps::bombers(&params);

        let trackers = {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                for i in 0..200 {
                    let _ = world.spawn_tracker(tracker(i), tracker_caps);
                }
            })
        };
        let bombers = {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                let now = Instant::now();
                for i in 0..200 {
                    let enemy = Enemy::bomber(Vec2::new(20.0, 20.0), 1, 40.0, 2.0, now, i);
                    let _ = world.spawn_bomber(enemy, bomber_caps);
                }
            })
        };
        trackers.join().unwrap();
        bombers.join().unwrap();

        let population = world.population().unwrap();
        assert_eq!(population.trackers, params.max_tracker_enemies);
        assert_eq!(population.bombers, params.max_bomber_enemies);
        assert!(population.total() <= params.max_total_entities);
    }

    #[test]
    fn test_clear_enemies_leaves_balls() {
        let world = World::new(1);
        let caps = Caps { kind: 10, total: 20 };
        world.spawn_ball(ball(1), caps).unwrap();
        world.spawn_tracker(tracker(2), caps).unwrap();
        world.spawn_tracker(tracker(3), caps).unwrap();

        assert_eq!(world.clear_enemies(), 2);
        assert!(world.trackers.is_empty().unwrap());
        assert_eq!(world.balls.active_count().unwrap(), 1);
    }

    #[test]
    fn test_closed_world_refuses_spawns() {
        let world = World::new(1);
        let caps = Caps { kind: 10, total: 20 };
        world.spawn_ball(ball(1), caps).unwrap();
        assert_eq!(world.close(), 1);
        assert!(world.is_closed());
        assert_eq!(world.spawn_ball(ball(2), caps), Err(CoreError::NotRunning));
        assert_eq!(world.population().unwrap().total(), 0);
    }

    #[test]
    fn test_powerup_respawn_delay() {
        let world = World::new(1);
        let now = Instant::now();
        assert!(world.powerup_ready(now));
        world.schedule_powerup_respawn(now, Duration::from_secs(3));
        assert!(!world.powerup_ready(now + Duration::from_secs(1)));
        assert!(world.powerup_ready(now + Duration::from_secs(3)));
    }
}
