//! Enemies: trackers chase the player, bombers wander and drop bombs
//!
//! Both share one body type with a closed [`Behavior`] enum.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{AdvanceContext, Body};
use super::geometry::Bounds;
use crate::clamp_to_arena;
use crate::consts::*;

/// Enemy variants (one registry each)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyClass {
    Tracker,
    Bomber,
}

impl EnemyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyClass::Tracker => "tracker",
            EnemyClass::Bomber => "bomber",
        }
    }

    pub fn size(&self) -> f32 {
        match self {
            EnemyClass::Tracker => TRACKER_SIZE,
            EnemyClass::Bomber => BOMBER_SIZE,
        }
    }

    /// Points for destroying one
    pub fn kill_score(&self) -> u64 {
        match self {
            EnemyClass::Tracker => TRACKER_KILL_SCORE,
            EnemyClass::Bomber => BOMBER_KILL_SCORE,
        }
    }
}

/// A dropped bomb: harmless during its fuse, dangerous while the blast lasts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bomb {
    pub pos: Vec2,
    pub blast_at: Instant,
    pub expires_at: Instant,
    /// Already hit the player once
    pub spent: bool,
}

impl Bomb {
    pub fn new(pos: Vec2, now: Instant) -> Self {
        let blast_at = now + Duration::from_secs_f32(BOMB_FUSE_SECS);
        Self {
            pos,
            blast_at,
            expires_at: blast_at + Duration::from_secs_f32(BOMB_BLAST_SECS),
            spent: false,
        }
    }

    pub fn is_exploding(&self, now: Instant) -> bool {
        now >= self.blast_at && now < self.expires_at
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn bounds(&self, now: Instant) -> Bounds {
        let size = if self.is_exploding(now) {
            BOMB_BLAST_SIZE
        } else {
            BOMB_SIZE
        };
        Bounds::from_center(self.pos, size)
    }
}

/// Per-class behavior state
#[derive(Debug, Clone)]
pub enum Behavior {
    Tracker,
    Bomber {
        bombs: Vec<Bomb>,
        next_drop: Instant,
        drop_interval: Duration,
        waypoint: Vec2,
    },
}

/// Result of one hit on an enemy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Still within the cooldown of the previous hit
    Ignored,
    Damaged { remaining: u32 },
    Destroyed,
}

/// An enemy entity
#[derive(Debug, Clone)]
pub struct Enemy {
    pub pos: Vec2,
    pub size: f32,
    pub speed: f32,
    pub health: u32,
    pub max_health: u32,
    pub behavior: Behavior,
    cooldown_until: Option<Instant>,
    rng: Pcg32,
}

impl Enemy {
    pub fn tracker(pos: Vec2, health: u32, speed: f32, seed: u64) -> Self {
        Self {
            pos,
            size: TRACKER_SIZE,
            speed,
            health: health.max(1),
            max_health: health.max(1),
            behavior: Behavior::Tracker,
            cooldown_until: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn bomber(
        pos: Vec2,
        health: u32,
        speed: f32,
        drop_interval_secs: f32,
        now: Instant,
        seed: u64,
    ) -> Self {
        let drop_interval = Duration::from_secs_f32(drop_interval_secs.max(0.1));
        Self {
            pos,
            size: BOMBER_SIZE,
            speed,
            health: health.max(1),
            max_health: health.max(1),
            behavior: Behavior::Bomber {
                bombs: Vec::with_capacity(MAX_BOMBS_PER_BOMBER),
                next_drop: now + drop_interval,
                drop_interval,
                waypoint: pos,
            },
            cooldown_until: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn class(&self) -> EnemyClass {
        match self.behavior {
            Behavior::Tracker => EnemyClass::Tracker,
            Behavior::Bomber { .. } => EnemyClass::Bomber,
        }
    }

    /// Take one hit unless still recovering from the last one
    pub fn hit(&mut self, now: Instant) -> HitOutcome {
        if self.health == 0 {
            return HitOutcome::Destroyed;
        }
        if self.cooldown_until.is_some_and(|until| now < until) {
            return HitOutcome::Ignored;
        }
        self.health -= 1;
        self.cooldown_until = Some(now + Duration::from_secs_f32(ENEMY_HIT_COOLDOWN_SECS));
        if self.health == 0 {
            HitOutcome::Destroyed
        } else {
            HitOutcome::Damaged {
                remaining: self.health,
            }
        }
    }

    pub fn bombs(&self) -> &[Bomb] {
        match &self.behavior {
            Behavior::Bomber { bombs, .. } => bombs,
            Behavior::Tracker => &[],
        }
    }

    pub fn bombs_mut(&mut self) -> &mut [Bomb] {
        match &mut self.behavior {
            Behavior::Bomber { bombs, .. } => bombs,
            Behavior::Tracker => &mut [],
        }
    }
}

impl Body for Enemy {
    fn advance(&mut self, ctx: &AdvanceContext) -> bool {
        if self.health == 0 {
            return false;
        }

        let Self {
            pos,
            speed,
            size,
            behavior,
            rng,
            ..
        } = self;
        let step = *speed * ctx.dt;

        match behavior {
            Behavior::Tracker => {
                let to_target = ctx.target - *pos;
                if to_target.length() > step {
                    *pos += to_target.normalize_or_zero() * step;
                } else {
                    *pos = ctx.target;
                }
            }
            Behavior::Bomber {
                bombs,
                next_drop,
                drop_interval,
                waypoint,
            } => {
                let to_waypoint = *waypoint - *pos;
                if to_waypoint.length() <= step.max(4.0) {
                    *pos = *waypoint;
                    *waypoint = Vec2::new(
                        rng.random_range(0.0..ctx.arena.x.max(1.0)),
                        rng.random_range(0.0..ctx.arena.y.max(1.0)),
                    );
                } else {
                    *pos += to_waypoint.normalize_or_zero() * step;
                }

                bombs.retain(|b| !b.spent && !b.is_expired(ctx.now));
                if ctx.now >= *next_drop {
                    if bombs.len() < MAX_BOMBS_PER_BOMBER {
                        bombs.push(Bomb::new(*pos, ctx.now));
                    }
                    *next_drop = ctx.now + *drop_interval;
                }
            }
        }

        *pos = clamp_to_arena(*pos, *size, ctx.arena);
        true
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_center(self.pos, self.size)
    }
}

/// A point just inside a random arena edge
pub fn entry_point(rng: &mut impl Rng, arena: Vec2, size: f32) -> Vec2 {
    let inset = size / 2.0;
    let along_x = rng.random_range(inset..(arena.x - inset).max(inset + 1.0));
    let along_y = rng.random_range(inset..(arena.y - inset).max(inset + 1.0));
    match rng.random_range(0..4) {
        0 => Vec2::new(inset, along_y),
        1 => Vec2::new(arena.x - inset, along_y),
        2 => Vec2::new(along_x, inset),
        _ => Vec2::new(along_x, arena.y - inset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dt: f32, now: Instant, target: Vec2) -> AdvanceContext {
        AdvanceContext {
            dt,
            now,
            target,
            arena: crate::arena_size(),
        }
    }

    #[test]
    fn test_tracker_chases_target() {
        let now = Instant::now();
        let mut enemy = Enemy::tracker(Vec2::new(100.0, 100.0), 2, 60.0, 1);
        assert!(enemy.advance(&ctx(0.5, now, Vec2::new(200.0, 100.0))));
        assert!((enemy.pos - Vec2::new(130.0, 100.0)).length() < 0.001);

        // Never overshoots
        assert!(enemy.advance(&ctx(10.0, now, Vec2::new(200.0, 100.0))));
        assert_eq!(enemy.pos, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn test_hit_cooldown() {
        let now = Instant::now();
        let mut enemy = Enemy::tracker(Vec2::ZERO, 2, 50.0, 2);
        assert_eq!(enemy.hit(now), HitOutcome::Damaged { remaining: 1 });
        assert_eq!(enemy.hit(now + Duration::from_millis(100)), HitOutcome::Ignored);
        assert_eq!(enemy.hit(now + Duration::from_millis(600)), HitOutcome::Destroyed);
        assert!(!enemy.advance(&ctx(TICK_DT, now, Vec2::ZERO)));
    }

    #[test]
    fn test_bomber_drops_capped_bombs() {
        let start = Instant::now();
        let mut bomber = Enemy::bomber(Vec2::new(400.0, 300.0), 3, 40.0, 0.5, start, 3);
        assert_eq!(bomber.class(), EnemyClass::Bomber);
        assert!(bomber.bombs().is_empty());

        // One drop per interval, bombs live fuse + blast (2.5 s), cap is 3
        for i in 1..=4u64 {
            let now = start + Duration::from_millis(500 * i);
            bomber.advance(&ctx(TICK_DT, now, Vec2::ZERO));
        }
        assert_eq!(bomber.bombs().len(), MAX_BOMBS_PER_BOMBER);

        // Long after: everything expired; a new one may be dropped
        let later = start + Duration::from_secs(10);
        bomber.advance(&ctx(TICK_DT, later, Vec2::ZERO));
        assert!(bomber.bombs().len() <= 1);
        assert!(bomber.bombs().iter().all(|b| !b.is_expired(later)));
    }

    #[test]
    fn test_bomb_phases() {
        let now = Instant::now();
        let bomb = Bomb::new(Vec2::new(50.0, 50.0), now);
        assert!(!bomb.is_exploding(now));
        assert_eq!(bomb.bounds(now).size().x, BOMB_SIZE);

        let blast = now + Duration::from_secs_f32(BOMB_FUSE_SECS + 0.1);
        assert!(bomb.is_exploding(blast));
        assert_eq!(bomb.bounds(blast).size().x, BOMB_BLAST_SIZE);

        let gone = now + Duration::from_secs_f32(BOMB_FUSE_SECS + BOMB_BLAST_SECS + 0.01);
        assert!(bomb.is_expired(gone));
        assert!(!bomb.is_exploding(gone));
    }

    #[test]
    fn test_tracker_has_no_bombs() {
        let mut tracker = Enemy::tracker(Vec2::ZERO, 1, 10.0, 4);
        assert!(tracker.bombs().is_empty());
        assert!(tracker.bombs_mut().is_empty());
        assert_eq!(tracker.class().kill_score(), TRACKER_KILL_SCORE);
    }

    #[test]
    fn test_entry_point_is_on_an_edge() {
        let mut rng = Pcg32::seed_from_u64(5);
        let arena = crate::arena_size();
        for _ in 0..50 {
            let p = entry_point(&mut rng, arena, 20.0);
            let on_edge = p.x == 10.0 || p.y == 10.0 || p.x == arena.x - 10.0 || p.y == arena.y - 10.0;
            assert!(on_edge, "{:?}", p);
        }
    }
}
