//! Collectible balls
//!
//! Normal, ghost, splitter and homing balls drift across the arena and are
//! reset once they leave it. Bouncy balls stay inside, reflecting off the
//! walls until their bounce budget runs out.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{AdvanceContext, Body};
use super::geometry::{Bounds, beyond_arena};
use crate::consts::*;

/// Ball variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallKind {
    Normal,
    Bouncy,
    Splitter,
    Ghost,
    Homing,
}

impl BallKind {
    pub const ALL: [BallKind; 5] = [
        BallKind::Normal,
        BallKind::Bouncy,
        BallKind::Splitter,
        BallKind::Ghost,
        BallKind::Homing,
    ];

    /// Points awarded for eating a ball of this kind
    pub fn score_value(self) -> u64 {
        match self {
            BallKind::Normal => 10,
            BallKind::Bouncy => 15,
            BallKind::Splitter => 20,
            BallKind::Ghost => 25,
            BallKind::Homing => 20,
        }
    }

    /// Weighted pick: normal balls are the most common
    pub fn random(rng: &mut impl Rng) -> Self {
        match rng.random_range(0..100) {
            0..40 => BallKind::Normal,
            40..55 => BallKind::Bouncy,
            55..70 => BallKind::Splitter,
            70..85 => BallKind::Ghost,
            _ => BallKind::Homing,
        }
    }
}

/// A ball entity
#[derive(Debug, Clone)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Diameter
    pub size: f32,
    /// Cruise speed (pixels/s)
    pub speed: f32,
    pub kind: BallKind,
    pub bounce_count: u32,
    pub max_bounces: u32,
    pub score_value: u64,
    rng: Pcg32,
}

impl Ball {
    /// New ball placed by [`Ball::reset`]
    pub fn spawn(kind: BallKind, size: f32, speed: f32, arena: Vec2, seed: u64) -> Self {
        let mut ball = Self::at(kind, Vec2::ZERO, Vec2::ZERO, size, seed);
        ball.speed = speed;
        ball.reset(arena);
        ball
    }

    /// New ball at an explicit position and velocity
    pub fn at(kind: BallKind, pos: Vec2, vel: Vec2, size: f32, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let max_bounces = rng.random_range(MIN_BOUNCES..=MAX_BOUNCES);
        Self {
            pos,
            vel,
            size: size.max(1.0),
            speed: vel.length(),
            kind,
            bounce_count: 0,
            max_bounces,
            score_value: kind.score_value(),
            rng,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.size / 2.0
    }

    /// Re-enter the arena from a fresh spot with a fresh bounce budget
    pub fn reset(&mut self, arena: Vec2) {
        let size = self.size;
        let (pos, heading_to) = if self.kind == BallKind::Bouncy {
            // Bouncy balls start inside so they have walls to hit
            let lo = Vec2::splat(size.min(arena.min_element() / 2.0));
            let hi = (arena - lo).max(lo + Vec2::ONE);
            let pos = Vec2::new(
                self.rng.random_range(lo.x..hi.x),
                self.rng.random_range(lo.y..hi.y),
            );
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            (pos, pos + Vec2::new(angle.cos(), angle.sin()))
        } else {
            // Just outside one edge, heading for the middle third
            let along_x = self.rng.random_range(0.0..arena.x.max(1.0));
            let along_y = self.rng.random_range(0.0..arena.y.max(1.0));
            let pos = match self.rng.random_range(0..4) {
                0 => Vec2::new(-size, along_y),
                1 => Vec2::new(arena.x + size, along_y),
                2 => Vec2::new(along_x, -size),
                _ => Vec2::new(along_x, arena.y + size),
            };
            let aim = Vec2::new(
                self.rng.random_range(arena.x / 3.0..(2.0 * arena.x / 3.0).max(arena.x / 3.0 + 1.0)),
                self.rng.random_range(arena.y / 3.0..(2.0 * arena.y / 3.0).max(arena.y / 3.0 + 1.0)),
            );
            (pos, aim)
        };

        self.pos = pos;
        self.vel = (heading_to - pos).normalize_or(Vec2::X) * self.speed;
        self.bounce_count = 0;
        self.max_bounces = self.rng.random_range(MIN_BOUNCES..=MAX_BOUNCES);
    }

    /// Overlap test against the player. Ghost balls sometimes slip through.
    pub fn overlaps(&mut self, other: &Bounds) -> bool {
        if !self.bounds().intersects(other) {
            return false;
        }
        !(self.kind == BallKind::Ghost && self.rng.random_bool(GHOST_MISS_CHANCE))
    }

    pub fn can_split(&self) -> bool {
        self.kind == BallKind::Splitter && self.size >= 2.0 * MIN_BALL_SIZE
    }

    /// Break a splitter into 2-4 half-size normal balls fanning out from it
    pub fn split(&mut self) -> Vec<Ball> {
        if !self.can_split() {
            return Vec::new();
        }
        let pieces = self.rng.random_range(2..=4usize);
        let child_size = self.size / 2.0;
        let child_speed = self.speed.max(1.0) * SPLIT_SPEED_FACTOR;
        let base = self.rng.random_range(0.0..std::f32::consts::TAU);

        (0..pieces)
            .map(|i| {
                let angle = base + std::f32::consts::TAU * i as f32 / pieces as f32;
                let vel = Vec2::new(angle.cos(), angle.sin()) * child_speed;
                let seed = self.rng.random::<u64>();
                Ball::at(BallKind::Normal, self.pos, vel, child_size, seed)
            })
            .collect()
    }

    /// Reflect off any wall the ball has reached while moving toward it.
    /// Returns false once the bounce budget is spent.
    fn bounce_off_walls(&mut self, arena: Vec2) -> bool {
        let r = self.radius();

        if self.pos.x - r <= 0.0 && self.vel.x < 0.0 {
            self.vel.x = -self.vel.x;
            self.pos.x = r;
            if self.count_bounce() {
                return false;
            }
        } else if self.pos.x + r >= arena.x && self.vel.x > 0.0 {
            self.vel.x = -self.vel.x;
            self.pos.x = arena.x - r;
            if self.count_bounce() {
                return false;
            }
        }

        if self.pos.y - r <= 0.0 && self.vel.y < 0.0 {
            self.vel.y = -self.vel.y;
            self.pos.y = r;
            if self.count_bounce() {
                return false;
            }
        } else if self.pos.y + r >= arena.y && self.vel.y > 0.0 {
            self.vel.y = -self.vel.y;
            self.pos.y = arena.y - r;
            if self.count_bounce() {
                return false;
            }
        }

        true
    }

    fn count_bounce(&mut self) -> bool {
        self.bounce_count += 1;
        self.bounce_count >= self.max_bounces
    }

    fn steer_toward(&mut self, target: Vec2) {
        if !self.rng.random_bool(HOMING_STEER_CHANCE) {
            return;
        }
        let desired = (target - self.pos).normalize_or_zero();
        let current = self.vel.normalize_or(desired);
        let heading = current.lerp(desired, HOMING_STEER_STRENGTH).normalize_or(current);
        self.vel = heading * self.speed;
    }
}

impl Body for Ball {
    fn advance(&mut self, ctx: &AdvanceContext) -> bool {
        if self.kind == BallKind::Homing {
            self.steer_toward(ctx.target);
        }

        self.pos += self.vel * ctx.dt;

        match self.kind {
            BallKind::Bouncy => self.bounce_off_walls(ctx.arena),
            _ => {
                if beyond_arena(self.pos, self.size, ctx.arena) {
                    self.reset(ctx.arena);
                }
                true
            }
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_center(self.pos, self.size)
    }
}
