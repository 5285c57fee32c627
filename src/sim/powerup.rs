//! Power-up pickups

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::entity::{AdvanceContext, Body};
use super::geometry::Bounds;
use crate::consts::*;

/// Power-up variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PowerUpKind {
    SpeedBoost,
    Invincibility,
    ScoreMultiplier,
    Shield,
    TimeSlow,
    ClearScreen,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 6] = [
        PowerUpKind::SpeedBoost,
        PowerUpKind::Invincibility,
        PowerUpKind::ScoreMultiplier,
        PowerUpKind::Shield,
        PowerUpKind::TimeSlow,
        PowerUpKind::ClearScreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUpKind::SpeedBoost => "speed_boost",
            PowerUpKind::Invincibility => "invincibility",
            PowerUpKind::ScoreMultiplier => "score_multiplier",
            PowerUpKind::Shield => "shield",
            PowerUpKind::TimeSlow => "time_slow",
            PowerUpKind::ClearScreen => "clear_screen",
        }
    }

    /// Timed kinds become an active effect; the others act once on pickup
    pub fn is_timed(&self) -> bool {
        !matches!(self, PowerUpKind::Shield | PowerUpKind::ClearScreen)
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// A power-up waiting to be collected
#[derive(Debug, Clone)]
pub struct PowerUp {
    pub kind: PowerUpKind,
    pub pos: Vec2,
    pub size: f32,
    /// Pulse animation phase in radians
    pub pulse: f32,
    pub expires_at: Instant,
}

impl PowerUp {
    pub fn new(kind: PowerUpKind, pos: Vec2, now: Instant) -> Self {
        Self {
            kind,
            pos,
            size: POWERUP_SIZE,
            pulse: 0.0,
            expires_at: now + Duration::from_secs_f32(POWERUP_LIFETIME_SECS),
        }
    }

    /// Random kind somewhere inside the arena, away from the walls
    pub fn random(rng: &mut impl Rng, arena: Vec2, now: Instant) -> Self {
        let margin = POWERUP_SIZE * 2.0;
        let pos = Vec2::new(
            rng.random_range(margin..(arena.x - margin).max(margin + 1.0)),
            rng.random_range(margin..(arena.y - margin).max(margin + 1.0)),
        );
        Self::new(PowerUpKind::random(rng), pos, now)
    }

    /// Render scale from the pulse phase (0.85..=1.15)
    pub fn pulse_scale(&self) -> f32 {
        1.0 + 0.15 * self.pulse.sin()
    }
}

impl Body for PowerUp {
    fn advance(&mut self, ctx: &AdvanceContext) -> bool {
        self.pulse = (self.pulse + ctx.dt * 4.0) % std::f32::consts::TAU;
        ctx.now < self.expires_at
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_center(self.pos, self.size)
    }
}
