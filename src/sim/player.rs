//! The player-controlled blob
//!
//! Only the game-loop thread touches the player: its own `advance` and the
//! collision pass (damage, shield use, growth).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use glam::Vec2;
use serde::Serialize;

use super::geometry::Bounds;
use crate::clamp_to_arena;
use crate::consts::*;

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub pos: Vec2,
    pub size: f32,
    pub base_speed: f32,
    /// Speed after timed effects (dash is applied on top)
    pub speed: f32,
    pub shield_charges: u32,
    /// Recent positions, newest first
    pub trail: VecDeque<Vec2>,
    /// Set while an invincibility effect is active
    pub effect_invincible: bool,
    #[serde(skip)]
    grace_until: Option<Instant>,
    #[serde(skip)]
    dash_until: Option<Instant>,
    #[serde(skip)]
    dash_ready_at: Option<Instant>,
}

impl Player {
    pub fn new(arena: Vec2) -> Self {
        Self {
            pos: arena / 2.0,
            size: PLAYER_START_SIZE,
            base_speed: PLAYER_BASE_SPEED,
            speed: PLAYER_BASE_SPEED,
            shield_charges: 0,
            trail: VecDeque::with_capacity(PLAYER_TRAIL_LENGTH),
            effect_invincible: false,
            grace_until: None,
            dash_until: None,
            dash_ready_at: None,
        }
    }

    /// Move along `direction` (unit or zero) for one step
    pub fn advance(&mut self, direction: Vec2, dt: f32, now: Instant, arena: Vec2) {
        let speed = if self.is_dashing(now) {
            self.speed * DASH_SPEED_FACTOR
        } else {
            self.speed
        };
        let next = clamp_to_arena(self.pos + direction * speed * dt, self.size, arena);

        if next != self.pos {
            self.trail.push_front(self.pos);
            self.trail.truncate(PLAYER_TRAIL_LENGTH);
        } else if !self.trail.is_empty() {
            // Standing still: let the trail catch up
            self.trail.pop_back();
        }
        self.pos = next;
    }

    /// Start a dash if off cooldown
    pub fn try_dash(&mut self, now: Instant) -> bool {
        if self.dash_ready_at.is_some_and(|ready| now < ready) {
            return false;
        }
        self.dash_until = Some(now + Duration::from_secs_f32(DASH_SECS));
        self.dash_ready_at = Some(now + Duration::from_secs_f32(DASH_COOLDOWN_SECS));
        true
    }

    pub fn is_dashing(&self, now: Instant) -> bool {
        self.dash_until.is_some_and(|until| now < until)
    }

    /// Within the post-damage grace window
    pub fn in_grace(&self, now: Instant) -> bool {
        self.grace_until.is_some_and(|until| now < until)
    }

    /// Effect invincibility or the post-damage grace window
    pub fn is_invincible(&self, now: Instant) -> bool {
        self.effect_invincible || self.in_grace(now)
    }

    pub fn grant_grace(&mut self, now: Instant) {
        self.grace_until = Some(now + Duration::from_secs_f32(DAMAGE_GRACE_SECS));
    }

    /// Spend one shield charge if there is one
    pub fn consume_shield(&mut self) -> bool {
        if self.shield_charges == 0 {
            return false;
        }
        self.shield_charges -= 1;
        true
    }

    /// Add a charge; false when already full
    pub fn add_shield(&mut self) -> bool {
        if self.shield_charges >= MAX_SHIELD_CHARGES {
            return false;
        }
        self.shield_charges += 1;
        true
    }

    pub fn grow(&mut self) {
        self.size = (self.size + PLAYER_GROWTH_PER_BALL).min(PLAYER_MAX_SIZE);
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_center(self.pos, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_moves_and_stays_inside() {
        let arena = crate::arena_size();
        let now = Instant::now();
        let mut player = Player::new(arena);
        player.advance(Vec2::X, 0.5, now, arena);
        assert!((player.pos.x - (arena.x / 2.0 + PLAYER_BASE_SPEED * 0.5)).abs() < 0.001);
        assert_eq!(player.trail.len(), 1);

        for _ in 0..20 {
            player.advance(Vec2::Y, 0.01, now, arena);
        }
        assert_eq!(player.trail.len(), PLAYER_TRAIL_LENGTH);

        // Pinned against the wall the trail drains away
        for _ in 0..100 {
            player.advance(Vec2::X, 1.0, now, arena);
        }
        assert_eq!(player.pos.x, arena.x - player.size / 2.0);
        assert!(player.trail.is_empty());
    }

    #[test]
    fn test_dash_cooldown() {
        let arena = crate::arena_size();
        let now = Instant::now();
        let mut player = Player::new(arena);
        assert!(player.try_dash(now));
        assert!(player.is_dashing(now));
        assert!(!player.try_dash(now + Duration::from_millis(500)));
        assert!(!player.is_dashing(now + Duration::from_millis(300)));
        assert!(player.try_dash(now + Duration::from_secs(2)));

        let start = player.pos;
        player.advance(Vec2::Y, 0.1, now + Duration::from_secs(2), arena);
        let moved = player.pos.y - start.y;
        assert!((moved - PLAYER_BASE_SPEED * DASH_SPEED_FACTOR * 0.1).abs() < 0.01);
    }

    #[test]
    fn test_grace_window() {
        let now = Instant::now();
        let mut player = Player::new(crate::arena_size());
        assert!(!player.is_invincible(now));
        player.grant_grace(now);
        assert!(player.is_invincible(now + Duration::from_secs(2)));
        assert!(!player.is_invincible(now + Duration::from_secs(4)));
    }

    #[test]
    fn test_shield_charges_capped() {
        let mut player = Player::new(crate::arena_size());
        assert!(!player.consume_shield());
        for _ in 0..MAX_SHIELD_CHARGES {
            assert!(player.add_shield());
        }
        assert!(!player.add_shield());
        assert!(player.consume_shield());
        assert_eq!(player.shield_charges, MAX_SHIELD_CHARGES - 1);
    }

    #[test]
    fn test_growth_is_capped() {
        let mut player = Player::new(crate::arena_size());
        for _ in 0..1000 {
            player.grow();
        }
        assert_eq!(player.size, PLAYER_MAX_SIZE);
    }
}
